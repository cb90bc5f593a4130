//! Prometheus metrics exposition
//!
//! The flow metrics themselves are emitted by `auth_flow::metrics`:
//!
//! - `auth_guard_outcomes_total` (counter): label `outcome`
//! - `auth_redirects_total` (counter): label `result`
//! - `auth_callbacks_total` (counter): label `outcome`
//! - `auth_token_probes_total` (counter): label `result`
//! - `auth_token_exchange_duration_seconds` (histogram)
//!
//! This module installs the recorder they land in.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

/// Token endpoint round trips, 10ms to 30s.
const EXCHANGE_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("auth_token_exchange_duration_seconds".to_string()),
            EXCHANGE_BUCKETS,
        )
        .expect("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The exchange duration is configured with explicit buckets so it renders
/// as a histogram (`_bucket` lines) rather than a summary.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

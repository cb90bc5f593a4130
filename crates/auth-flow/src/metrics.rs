//! Flow metrics
//!
//! - `auth_guard_outcomes_total` (counter): label `outcome`
//! - `auth_redirects_total` (counter): label `result`
//! - `auth_callbacks_total` (counter): label `outcome`
//! - `auth_token_probes_total` (counter): label `result`
//! - `auth_token_exchange_duration_seconds` (histogram)
//!
//! Without an installed recorder these are no-ops.

pub fn record_guard_outcome(outcome: &'static str) {
    metrics::counter!("auth_guard_outcomes_total", "outcome" => outcome).increment(1);
}

pub fn record_redirect(result: &'static str) {
    metrics::counter!("auth_redirects_total", "result" => result).increment(1);
}

pub fn record_callback(outcome: &'static str) {
    metrics::counter!("auth_callbacks_total", "outcome" => outcome).increment(1);
}

pub fn record_probe(result: &'static str) {
    metrics::counter!("auth_token_probes_total", "result" => result).increment(1);
}

pub fn record_exchange_duration(duration_secs: f64) {
    metrics::histogram!("auth_token_exchange_duration_seconds").record(duration_secs);
}

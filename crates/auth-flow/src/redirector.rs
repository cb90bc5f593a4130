//! Outbound half of the authorization flow
//!
//! Everything needed to finish the flow is written to the pending store
//! before the navigation. Nothing held in memory is expected to survive it.

use std::sync::Arc;

use host::Navigator;
use pkce_auth::{OAuthConfig, build_authorization_url, build_pair};
use tracing::{error, info, warn};
use url::Url;

use crate::error::Result;
use crate::metrics;
use crate::pending::PendingAuthStore;

pub struct AuthorizationRedirector {
    config: OAuthConfig,
    pending: Arc<PendingAuthStore>,
    navigator: Arc<dyn Navigator>,
}

impl AuthorizationRedirector {
    pub fn new(
        config: OAuthConfig,
        pending: Arc<PendingAuthStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Self {
        Self {
            config,
            pending,
            navigator,
        }
    }

    /// Start a flow that resumes at `current` (previous: `previous`) and
    /// navigate to the provider.
    ///
    /// Without a client id nothing is stored and nothing is navigated; the
    /// caller gets [`Error::Configuration`].
    pub async fn begin(&self, current: &str, previous: Option<&str>) -> Result<Url> {
        if let Err(e) = self.config.client_id() {
            error!(error = %e, "cannot start authorization");
            metrics::record_redirect("unconfigured");
            return Err(e.into());
        }

        let pair = build_pair();
        let url = build_authorization_url(&self.config, &pair.state, &pair.challenge)?;

        if let Err(e) = self.record(&pair.state, &pair.verifier, current, previous).await {
            warn!(error = %e, "could not record pending flow");
            if let Err(e) = self.pending.clear_all().await {
                warn!(error = %e, "could not clear partial pending flow");
            }
            metrics::record_redirect("storage_failed");
            return Err(e);
        }

        info!(next = current, previous, "redirecting to provider");
        metrics::record_redirect("issued");
        self.navigator.assign(&url);
        Ok(url)
    }

    async fn record(
        &self,
        state: &str,
        verifier: &common::Secret<String>,
        current: &str,
        previous: Option<&str>,
    ) -> Result<()> {
        self.pending.put(state, verifier).await?;
        self.pending.set_pending(current, previous).await
    }
}

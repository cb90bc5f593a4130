//! Provider redirect-back handling
//!
//! Every invocation resumes exactly one navigation and leaves the pending
//! store empty, whichever branch it takes. A state without a stored
//! verifier is never trusted: it is handled exactly like a decline.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Instant;

use common::Secret;
use pkce_auth::{OAuthConfig, exchange_code};
use tracing::{info, warn};
use url::Url;

use crate::error::Error;
use crate::flight::RedirectFlight;
use crate::metrics;
use crate::pending::PendingAuthStore;
use crate::token_store::TokenStore;

/// Query parameters on the callback route. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
}

impl CallbackQuery {
    /// Parse the query of a route such as `/callback?code=abc&state=xyz`.
    pub fn from_route(route: &str) -> Self {
        let query = route
            .split_once('?')
            .map(|(_, q)| q.split('#').next().unwrap_or(q))
            .unwrap_or("");
        Self::from_query(query)
    }

    /// Parse a raw query string. Never fails: unknown keys are ignored and
    /// a repeated key keeps its last value.
    pub fn from_query(query: &str) -> Self {
        Self::from_pairs(url::form_urlencoded::parse(query.as_bytes()))
    }

    pub fn from_url(url: &Url) -> Self {
        Self::from_pairs(url.query_pairs())
    }

    fn from_pairs<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_ref() {
                "code" => query.code = Some(value.into_owned()),
                "state" => query.state = Some(value.into_owned()),
                _ => {}
            }
        }
        query
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }

    fn state(&self) -> Option<&str> {
        self.state.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug)]
pub enum CallbackResult {
    /// A token was issued and committed (not yet ensured).
    Authorized,
    /// The provider came back without `code`/`state`.
    Declined,
    /// Unmatched state, failed exchange, or unusable storage.
    Rejected(Error),
}

impl CallbackResult {
    fn label(&self) -> &'static str {
        match self {
            CallbackResult::Authorized => "authorized",
            CallbackResult::Declined => "declined",
            CallbackResult::Rejected(err) => err.kind(),
        }
    }
}

#[derive(Debug)]
pub struct CallbackOutcome {
    /// The one route navigation resumes to.
    pub resume_to: String,
    pub result: CallbackResult,
}

pub struct CallbackHandler {
    http: reqwest::Client,
    config: OAuthConfig,
    pending: Arc<PendingAuthStore>,
    tokens: Arc<TokenStore>,
    flight: Arc<RedirectFlight>,
    safe_route: String,
}

impl CallbackHandler {
    pub fn new(
        http: reqwest::Client,
        config: OAuthConfig,
        pending: Arc<PendingAuthStore>,
        tokens: Arc<TokenStore>,
        flight: Arc<RedirectFlight>,
        safe_route: impl Into<String>,
    ) -> Self {
        Self {
            http,
            config,
            pending,
            tokens,
            flight,
            safe_route: safe_route.into(),
        }
    }

    pub async fn handle(&self, query: &CallbackQuery) -> CallbackOutcome {
        let outcome = self.complete(query).await;

        if let Err(e) = self.pending.clear_all().await {
            warn!(error = %e, "failed to clear pending flow");
        }
        self.flight.finish();

        metrics::record_callback(outcome.result.label());
        info!(
            resume_to = %outcome.resume_to,
            outcome = outcome.result.label(),
            "callback handled"
        );
        outcome
    }

    async fn complete(&self, query: &CallbackQuery) -> CallbackOutcome {
        let (Some(code), Some(state)) = (query.code(), query.state()) else {
            info!("authorization declined at provider");
            return self.decline(CallbackResult::Declined).await;
        };

        let verifier = match self.pending.take(state).await {
            Ok(Some(verifier)) => verifier,
            Ok(None) => {
                warn!(state, "callback state has no pending verifier");
                return self.decline(CallbackResult::Rejected(Error::StateMismatch)).await;
            }
            Err(e) => {
                warn!(error = %e, "could not read pending verifier");
                return self.decline(CallbackResult::Rejected(e)).await;
            }
        };

        let started = Instant::now();
        let exchanged = exchange_code(&self.http, &self.config, code, verifier.expose()).await;
        metrics::record_exchange_duration(started.elapsed().as_secs_f64());

        let token = match exchanged {
            Ok(token) => token,
            Err(e) => {
                let err = Error::from(e);
                warn!(error = %err, kind = err.kind(), "code exchange failed");
                return self.decline(CallbackResult::Rejected(err)).await;
            }
        };

        if let Err(e) = self.tokens.set_token(Secret::new(token.access_token)).await {
            warn!(error = %e, "token kept for this session only");
        }

        let next = match self.pending.take_pending().await {
            Ok(nav) => nav.next,
            Err(e) => {
                warn!(error = %e, "could not read pending navigation");
                None
            }
        };
        CallbackOutcome {
            resume_to: next.unwrap_or_else(|| self.safe_route.clone()),
            result: CallbackResult::Authorized,
        }
    }

    async fn decline(&self, result: CallbackResult) -> CallbackOutcome {
        let previous = match self.pending.take_pending().await {
            Ok(nav) => nav.previous,
            Err(e) => {
                warn!(error = %e, "could not read pending navigation");
                None
            }
        };
        CallbackOutcome {
            resume_to: previous.unwrap_or_else(|| self.safe_route.clone()),
            result,
        }
    }
}

//! Collaborator seams for the hosting environment
//!
//! The auth flow never talks to a terminal, a browser or a backend
//! directly. Everything it needs from the outside world is one of these
//! traits:
//! - `IdentityCheck` resolves the first-party session identity
//! - `IdentityProbe` asserts an elevated token against the provider
//! - `Navigator` performs a full navigation to an external origin
//! - `ConsentPrompt` asks the user a blocking yes/no question
//! - `FirstPartyLogin` takes over when there is no first-party identity
//! - `Alerts` shows a generic non-fatal message
//!
//! Async methods return `Pin<Box<dyn Future>>` so the traits stay
//! dyn-compatible (`Arc<dyn IdentityProbe>`).

pub mod console;
pub mod http;

pub use console::{ConsoleAlerts, ConsoleLogin, ConsoleNavigator};
pub use http::{HttpIdentityCheck, ProviderApi, ProviderUser, TokenProbe};

use common::Secret;
use std::future::Future;
use std::pin::Pin;
use url::Url;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Message shown for transient failures the user cannot act on.
pub const NETWORK_ERROR_ALERT: &str = "Network Error";

/// First-party session identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
}

/// Errors from collaborator calls.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The request never got an answer (DNS, connect, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The remote side answered with a failure status.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Decode(String),
}

pub type Result<T> = std::result::Result<T, HostError>;

/// First-party identity endpoint.
pub trait IdentityCheck: Send + Sync {
    /// `Ok(None)` is the endpoint's explicit "nobody is logged in" answer.
    fn check(&self) -> BoxFuture<'_, Result<Option<Identity>>>;
}

/// Provider-side assertion that an access token is still good.
pub trait IdentityProbe: Send + Sync {
    fn probe<'a>(&'a self, token: &'a Secret<String>) -> BoxFuture<'a, Result<()>>;
}

/// Full-page navigation away from the application.
pub trait Navigator: Send + Sync {
    /// Hand control to `url`. The current navigation does not continue
    /// after this; resumption only happens through the callback route.
    fn assign(&self, url: &Url);
}

pub trait ConsentPrompt: Send + Sync {
    fn confirm<'a>(&'a self, message: &'a str) -> BoxFuture<'a, bool>;
}

/// Owner of the first-party login redirect.
pub trait FirstPartyLogin: Send + Sync {
    fn require_login(&self, target: &str);
}

pub trait Alerts: Send + Sync {
    fn alert(&self, message: &str);
}

//! Auth flow failure taxonomy
//!
//! None of these escape to the hosting application as failures: every
//! variant ends in "no elevated token" plus a resumed navigation. They exist
//! so the degradation is logged and counted with the right label.

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No client identifier configured; the redirect is never attempted.
    #[error("auth unavailable: {0}")]
    Configuration(String),

    /// Callback `state` absent or without a stored verifier.
    #[error("callback state has no pending verifier")]
    StateMismatch,

    #[error("code exchange failed: {0}")]
    TokenExchange(String),

    /// An existing token failed its identity probe.
    #[error("token validation failed: {0}")]
    TokenValidation(String),

    #[error("network error: {0}")]
    Network(String),

    /// Tab or durable storage could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<pkce_auth::Error> for Error {
    fn from(err: pkce_auth::Error) -> Self {
        match err {
            pkce_auth::Error::Configuration(msg) => Error::Configuration(msg),
            pkce_auth::Error::Http(msg) => Error::Network(msg),
            pkce_auth::Error::TokenExchange(msg) => Error::TokenExchange(msg),
        }
    }
}

impl Error {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::StateMismatch => "state_mismatch",
            Error::TokenExchange(_) => "token_exchange",
            Error::TokenValidation(_) => "token_validation",
            Error::Network(_) => "network",
            Error::Storage(_) => "storage",
        }
    }
}

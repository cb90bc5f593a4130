//! Error types for the OAuth client primitives

/// Errors from building the authorization request or exchanging a code.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No client identifier, or an unusable endpoint. Never retried.
    #[error("OAuth configuration error: {0}")]
    Configuration(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The provider answered, but not with a usable token.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

pub type Result<T> = std::result::Result<T, Error>;

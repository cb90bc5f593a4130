//! OAuth client configuration
//!
//! The client identifier comes from the hosting environment. Its absence is
//! not a startup failure: it surfaces as [`Error::Configuration`] the first
//! time a flow needs it, so callers can treat "auth unavailable" as an
//! ordinary outcome.

use serde::Deserialize;

use crate::constants::{DEFAULT_AUTHORIZE_ENDPOINT, DEFAULT_TOKEN_ENDPOINT};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default = "default_authorize_endpoint")]
    pub authorize_endpoint: String,
    #[serde(default = "default_token_endpoint")]
    pub token_endpoint: String,
    /// Sent with both requests when set; otherwise the provider uses the
    /// redirect registered for the client.
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

fn default_authorize_endpoint() -> String {
    DEFAULT_AUTHORIZE_ENDPOINT.to_string()
}

fn default_token_endpoint() -> String {
    DEFAULT_TOKEN_ENDPOINT.to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            authorize_endpoint: default_authorize_endpoint(),
            token_endpoint: default_token_endpoint(),
            redirect_uri: None,
        }
    }
}

impl OAuthConfig {
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The configured client identifier, or a configuration error when it is
    /// missing or blank.
    pub fn client_id(&self) -> Result<&str> {
        match self.client_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Ok(id),
            _ => Err(Error::Configuration("client ID not set".into())),
        }
    }

    pub fn has_client_id(&self) -> bool {
        self.client_id().is_ok()
    }
}

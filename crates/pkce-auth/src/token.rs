//! Authorization code exchange
//!
//! POSTs the code and the PKCE verifier to the token endpoint as a form.
//! The request carries no cookies or other ambient credentials: the
//! verifier alone proves this client started the flow.

use serde::Deserialize;
use tracing::debug;

use crate::config::OAuthConfig;
use crate::error::{Error, Result};

/// The part of the token endpoint response this client uses. Other fields
/// (`token_type`, `expires_in`, `scope`, ...) are ignored.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

/// Exchange an authorization code for an access token.
///
/// Fails with [`Error::Configuration`] before any request when no client id
/// is configured.
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &OAuthConfig,
    code: &str,
    verifier: &str,
) -> Result<TokenResponse> {
    let client_id = config.client_id()?;

    let mut form = vec![
        ("grant_type", "authorization_code"),
        ("client_id", client_id),
        ("code", code),
        ("code_verifier", verifier),
    ];
    if let Some(redirect_uri) = config.redirect_uri.as_deref() {
        form.push(("redirect_uri", redirect_uri));
    }

    debug!(endpoint = %config.token_endpoint, "exchanging authorization code");

    let response = client
        .post(&config.token_endpoint)
        .form(&form)
        .send()
        .await
        .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(Error::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))?;

    if token.access_token.is_empty() {
        return Err(Error::TokenExchange("empty access_token".into()));
    }
    Ok(token)
}

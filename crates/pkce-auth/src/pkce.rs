//! PKCE (Proof Key for Code Exchange) per RFC 7636
//!
//! The verifier stays on this side; only its S256 challenge travels in the
//! authorization URL. The challenge is recomputed on demand and never
//! stored.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use common::Secret;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::OAuthConfig;
use crate::constants::{CHALLENGE_METHOD, STATE_LENGTH, VERIFIER_LENGTH};
use crate::error::{Error, Result};
use crate::random::generate;

/// Correlator, secret and derived challenge for one flow.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub state: String,
    pub verifier: Secret<String>,
    pub challenge: String,
}

/// `challenge = BASE64URL-NOPAD(SHA256(verifier))`
///
/// A 32-byte digest always encodes to 43 characters.
pub fn build_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Draw a fresh state (10 chars) and verifier (43 chars) and derive the
/// challenge.
pub fn build_pair() -> PkcePair {
    let state = generate(STATE_LENGTH);
    let verifier = generate(VERIFIER_LENGTH);
    let challenge = build_challenge(&verifier);
    PkcePair {
        state,
        verifier: Secret::new(verifier),
        challenge,
    }
}

/// Authorization endpoint URL carrying `response_type=code`, `client_id`,
/// `state`, `code_challenge` and `code_challenge_method=S256`.
pub fn build_authorization_url(config: &OAuthConfig, state: &str, challenge: &str) -> Result<Url> {
    let client_id = config.client_id()?;

    let mut params = vec![
        ("response_type", "code"),
        ("client_id", client_id),
        ("state", state),
        ("code_challenge", challenge),
        ("code_challenge_method", CHALLENGE_METHOD),
    ];
    if let Some(redirect_uri) = config.redirect_uri.as_deref() {
        params.push(("redirect_uri", redirect_uri));
    }

    Url::parse_with_params(&config.authorize_endpoint, &params).map_err(|e| {
        Error::Configuration(format!(
            "invalid authorize endpoint {}: {e}",
            config.authorize_endpoint
        ))
    })
}

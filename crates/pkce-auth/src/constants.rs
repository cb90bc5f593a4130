//! Provider defaults and PKCE parameters
//!
//! The provider is a public OAuth client deployment: the client identifier is
//! supplied by the hosting environment, everything else defaults to these.

/// Provider API root. Identity probes hit `{base}/users/me`.
pub const DEFAULT_API_BASE: &str = "https://q.trap.jp/api/v3";

/// Authorization endpoint (browser redirect target)
pub const DEFAULT_AUTHORIZE_ENDPOINT: &str = "https://q.trap.jp/api/v3/oauth2/authorize";

/// Token endpoint for the code exchange
pub const DEFAULT_TOKEN_ENDPOINT: &str = "https://q.trap.jp/api/v3/oauth2/token";

/// Length of the anti-forgery `state` correlator
pub const STATE_LENGTH: usize = 10;

/// Length of the PKCE code verifier (RFC 7636 minimum)
pub const VERIFIER_LENGTH: usize = 43;

/// Only S256 is ever sent; `plain` is not supported.
pub const CHALLENGE_METHOD: &str = "S256";

/// Character set for generated states and verifiers.
pub const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

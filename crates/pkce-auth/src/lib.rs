//! OAuth2 authorization-code + PKCE client primitives
//!
//! Everything needed to start and finish a provider authorization without
//! holding any state of its own. Flow state (pending verifiers, the access
//! token) lives in `auth-flow`.
//!
//! Flow:
//! 1. `pkce::build_pair()` draws a state/verifier pair and derives the challenge
//! 2. `pkce::build_authorization_url()` produces the provider redirect
//! 3. The provider redirects back with `code` + `state`
//! 4. `token::exchange_code()` trades the code and verifier for an access token

pub mod config;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod random;
pub mod token;

pub use config::OAuthConfig;
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{PkcePair, build_authorization_url, build_challenge, build_pair};
pub use random::generate;
pub use token::{TokenResponse, exchange_code};

//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The OAuth client id may come from OAUTH_CLIENT_ID or client_id_file as
//! well as the file. The first-party session cookie is only ever read from
//! GATE_SESSION_COOKIE, never stored in the TOML.

use auth_flow::RouteRule;
use common::Secret;
use pkce_auth::{DEFAULT_API_BASE, OAuthConfig};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Where declined or unresolvable navigations land.
    #[serde(default = "default_safe_route")]
    pub safe_route: String,
    /// Holds `token.json` and the per-tab pending stores.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_consent_message")]
    pub consent_message: String,
    #[serde(default)]
    pub oauth: OAuthSection,
    #[serde(default)]
    pub provider: ProviderConfig,
    pub identity: IdentityConfig,
    #[serde(default)]
    pub callback: CallbackConfig,
    #[serde(default)]
    pub routes: Vec<RouteRule>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OAuthSection {
    #[serde(flatten)]
    pub client: OAuthConfig,
    /// Path to a file containing the client id (alternative to OAUTH_CLIENT_ID)
    #[serde(default)]
    pub client_id_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
        }
    }
}

/// First-party backend
#[derive(Debug, Deserialize)]
pub struct IdentityConfig {
    pub endpoint: String,
    /// Shown when there is no first-party session.
    #[serde(default)]
    pub login_url: Option<String>,
    #[serde(skip)]
    pub session_cookie: Option<Secret<String>>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackConfig {
    #[serde(default = "default_callback_path")]
    pub path: String,
    /// Loopback listener for the provider redirect; none when absent.
    #[serde(default)]
    pub listen_addr: Option<SocketAddr>,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            path: default_callback_path(),
            listen_addr: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_safe_route() -> String {
    "/".into()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".gate")
}

fn default_consent_message() -> String {
    "This page needs access to your traQ account. Continue to the authorization page?".into()
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.into()
}

fn default_callback_path() -> String {
    "/callback".into()
}

fn default_max_connections() -> usize {
    16
}

fn require_http(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with http:// or https://, got: {value}"
        )))
    }
}

fn require_route(field: &str, value: &str) -> common::Result<()> {
    if value.starts_with('/') {
        Ok(())
    } else {
        Err(common::Error::Config(format!(
            "{field} must start with '/', got: {value}"
        )))
    }
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client id resolution order:
    /// 1. OAUTH_CLIENT_ID env var
    /// 2. client_id_file path from config
    /// 3. oauth.client_id from config
    ///
    /// A missing client id is not an error here.
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.validate()?;

        if let Ok(id) = std::env::var("OAUTH_CLIENT_ID") {
            config.oauth.client.client_id = Some(id);
        } else if let Some(ref id_file) = config.oauth.client_id_file {
            let id = std::fs::read_to_string(id_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_id_file {}: {e}",
                    id_file.display()
                ))
            })?;
            let id = id.trim().to_owned();
            if !id.is_empty() {
                config.oauth.client.client_id = Some(id);
            }
        }

        if let Ok(cookie) = std::env::var("GATE_SESSION_COOKIE") {
            let cookie = cookie.trim().to_owned();
            if !cookie.is_empty() {
                config.identity.session_cookie = Some(Secret::new(cookie));
            }
        }

        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        require_route("safe_route", &self.safe_route)?;
        require_route("callback.path", &self.callback.path)?;
        if auth_flow::routes::route_path(&self.safe_route) == self.callback.path {
            return Err(common::Error::Config(
                "safe_route must not be the callback path".into(),
            ));
        }
        for rule in &self.routes {
            require_route("routes.path", &rule.path)?;
        }

        require_http("identity.endpoint", &self.identity.endpoint)?;
        require_http("provider.api_base", &self.provider.api_base)?;
        require_http("oauth.authorize_endpoint", &self.oauth.client.authorize_endpoint)?;
        require_http("oauth.token_endpoint", &self.oauth.client.token_endpoint)?;

        if self.callback.max_connections == 0 {
            return Err(common::Error::Config(
                "callback.max_connections must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn token_path(&self) -> PathBuf {
        self.state_dir.join("token.json")
    }

    pub fn pending_path(&self, tab: &str) -> PathBuf {
        self.state_dir.join("tabs").join(tab).join("pending.json")
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> PathBuf {
        if let Some(p) = cli_path {
            return p.to_path_buf();
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("gate.toml")
    }
}

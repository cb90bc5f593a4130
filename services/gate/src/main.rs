//! gate: elevated-auth navigation in a terminal tab
//!
//! Single-binary host for the auth flow:
//! 1. Loads config and the durable access token
//! 2. Opens (or resumes) one tab with its tab-scoped pending store
//! 3. Serves the provider redirect-back on a loopback listener
//! 4. Reads navigation commands from the terminal

mod callback_server;
mod config;
mod error;
mod metrics;
mod shell;
#[cfg(test)]
mod testing;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use auth_flow::{Collaborators, EphemeralStore, PendingAuthStore, RouteTable, Tab, TabSettings, TokenStore};
use clap::Parser;
use host::{ConsoleAlerts, ConsoleLogin, ConsoleNavigator, HttpIdentityCheck, TokenProbe};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::callback_server::ServerState;
use crate::config::Config;
use crate::shell::{Exit, LineInput, TerminalConsent};

/// How long the callback listener gets to finish in-flight redirects.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "gate", version, about = "Elevated-auth navigation guard for a terminal tab")]
struct Cli {
    /// Config file (default: CONFIG_PATH, then gate.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tab to open; reuse a name to resume its pending authorization
    #[arg(long)]
    tab: Option<String>,

    /// Log filter, overriding LOG_LEVEL and RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

fn env_filter(cli_level: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(level);
    }
    EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

fn validate_tab_name(name: &str) -> error::Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(error::Error::TabName(name.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // JSON logs on stderr; stdout belongs to the terminal session
    tracing_subscriber::registry()
        .with(env_filter(cli.log_level.as_deref()))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let prometheus_handle = metrics::install_recorder();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(path = %config_path.display(), "loading configuration");
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let tab_name = cli
        .tab
        .unwrap_or_else(|| format!("tab-{}", uuid::Uuid::new_v4().as_simple()));
    validate_tab_name(&tab_name)?;

    if !config.oauth.client.has_client_id() {
        error!("client ID not set; elevated routes will be unavailable");
    }
    info!(
        tab = %tab_name,
        safe_route = %config.safe_route,
        callback_path = %config.callback.path,
        routes = config.routes.len(),
        "configuration loaded"
    );

    let http = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("failed to build HTTP client")?;

    let tokens = TokenStore::load(config.token_path())
        .await
        .map_err(error::Error::from)?;
    let pending = EphemeralStore::load(config.pending_path(&tab_name))
        .await
        .map_err(error::Error::from)?;

    let input = Arc::new(LineInput::stdin());
    let host = Collaborators {
        identity: Arc::new(HttpIdentityCheck::new(
            http.clone(),
            config.identity.endpoint.clone(),
            config.identity.session_cookie.clone(),
        )),
        probe: Arc::new(TokenProbe::new(http.clone(), config.provider.api_base.clone())),
        navigator: Arc::new(ConsoleNavigator),
        consent: Arc::new(TerminalConsent::new(input.clone())),
        login: Arc::new(ConsoleLogin::new(config.identity.login_url.clone())),
        alerts: Arc::new(ConsoleAlerts),
    };
    let settings = TabSettings {
        name: tab_name.clone(),
        oauth: config.oauth.client.clone(),
        routes: RouteTable::new(config.routes.clone(), config.callback.path.clone()),
        safe_route: config.safe_route.clone(),
        consent_message: config.consent_message.clone(),
    };
    let tab = Arc::new(Tab::new(
        settings,
        PendingAuthStore::new(pending),
        Arc::new(tokens),
        http,
        host,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let (callbacks, callback_rx) = tokio::sync::mpsc::channel(config.callback.max_connections);
    let server_handle = match config.callback.listen_addr {
        Some(addr) => {
            let listener = TcpListener::bind(addr)
                .await
                .map_err(|source| error::Error::Bind { addr, source })?;
            let app = callback_server::build_router(
                ServerState {
                    tab: tab.clone(),
                    callbacks,
                    prometheus: prometheus_handle,
                    started_at: Instant::now(),
                },
                config.callback.max_connections,
            );
            info!(addr = %addr, path = %config.callback.path, "callback listener ready");
            Some(tokio::spawn(callback_server::serve(listener, app, async move {
                let _ = shutdown_rx.await;
            })))
        }
        None => {
            info!("no callback listener; deliver redirects with `callback <url>`");
            None
        }
    };

    let status = tab.status().await;
    if let Some(next) = status.pending.next.as_deref() {
        info!(next, "tab has an authorization pending from an earlier session");
    }
    println!("{}", shell::render_status(&status));

    tokio::select! {
        exit = shell::run(&tab, &input, callback_rx) => match exit? {
            Exit::Closed => info!(tab = %tab_name, "tab closed"),
            Exit::EndOfInput => info!(tab = %tab_name, "input ended, tab storage kept"),
        },
        _ = shutdown_signal() => info!(tab = %tab_name, "interrupted, tab storage kept"),
    }

    let _ = shutdown_tx.send(());
    if let Some(handle) = server_handle {
        match tokio::time::timeout(DRAIN_TIMEOUT, handle).await {
            Ok(Ok(Ok(()))) => info!("callback listener stopped"),
            Ok(Ok(Err(e))) => error!(error = %e, "callback listener error during shutdown"),
            Ok(Err(e)) => error!(error = %e, "callback listener task panicked"),
            Err(_) => warn!(
                drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
                "drain timeout exceeded, forcing shutdown"
            ),
        }
    }

    info!("shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "gate",
            "--config",
            "/etc/gate.toml",
            "--tab",
            "work",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/etc/gate.toml")));
        assert_eq!(cli.tab.as_deref(), Some("work"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn cli_flags_are_optional() {
        let cli = Cli::try_parse_from(["gate"]).unwrap();
        assert!(cli.config.is_none());
        assert!(cli.tab.is_none());
    }

    #[test]
    fn tab_names_stay_inside_state_dir() {
        assert!(validate_tab_name("tab-0f3a").is_ok());
        assert!(validate_tab_name("work_2").is_ok());
        assert!(validate_tab_name("").is_err());
        assert!(validate_tab_name("../escape").is_err());
        assert!(validate_tab_name("a/b").is_err());
    }

    #[test]
    fn generated_tab_names_are_valid() {
        let name = format!("tab-{}", uuid::Uuid::new_v4().as_simple());
        assert!(validate_tab_name(&name).is_ok());
    }
}

//! Loopback listener for the provider redirect-back
//!
//! `GET <callback path>` hands the query to the terminal loop, which runs it
//! between commands. When no loop is running the tab handles it directly.
//! The query is parsed leniently: every visit to the callback path reaches
//! the tab, so a stale pending flow is always cleared. `/health` and
//! `/metrics` live on the same listener.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use auth_flow::{CallbackQuery, Tab};
use axum::Router;
use axum::extract::{RawQuery, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::shell::{Delivery, render_landing};

#[derive(Clone)]
pub struct ServerState {
    pub tab: Arc<Tab>,
    pub callbacks: mpsc::Sender<Delivery>,
    pub prometheus: PrometheusHandle,
    pub started_at: Instant,
}

/// Build the router. The concurrency limit bounds how many redirects can
/// wait for the tab at once.
pub fn build_router(state: ServerState, max_connections: usize) -> Router {
    let callback_path = state.tab.callback_path().to_string();
    Router::new()
        .route(&callback_path, get(callback_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn callback_handler(
    State(state): State<ServerState>,
    RawQuery(raw): RawQuery,
) -> impl IntoResponse {
    info!(tab = %state.tab.name(), "provider redirect received");
    let query = CallbackQuery::from_query(raw.as_deref().unwrap_or(""));

    let (landed, landing) = oneshot::channel();
    match state.callbacks.send(Delivery { query, landed }).await {
        Ok(()) => {
            let _ = landing.await;
        }
        Err(mpsc::error::SendError(delivery)) => {
            let landing = state.tab.complete_callback(&delivery.query).await;
            println!("\n{}", render_landing(&landing));
        }
    }

    (
        StatusCode::OK,
        Html("<p>Authorization finished. You can close this window and return to the terminal.</p>"),
    )
}

async fn health_handler(State(state): State<ServerState>) -> impl IntoResponse {
    let tab = &state.tab;
    let body = serde_json::json!({
        "status": "healthy",
        "tab": tab.name(),
        "route": tab.current_route(),
        "redirect_outstanding": tab.redirect_outstanding(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
    });
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

async fn metrics_handler(State(state): State<ServerState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

//! HTTP surface.
//!
//! Endpoints are mounted at the root and again under `/api/bot`, the path
//! callers of the previous serverless deployment still use:
//!
//! | method | path | handler |
//! |---|---|---|
//! | `GET` | `/`, `/status` | status report |
//! | `GET` | `/test` | diagnostics |
//! | `POST` | `/` | role-change webhook |
//! | `OPTIONS` | any | empty 200 |
//!
//! Everything else is a 405.

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Json, Router};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::RelayResult;
use crate::relay::{Diagnostics, Relay, StatusReport};

pub mod cors;
pub mod webhook;

/// Prefix of the legacy serverless route.
pub const LEGACY_PREFIX: &str = "/api/bot";

/// Build the application router.
pub fn router(relay: Arc<Relay>) -> Router {
    let endpoints = Router::new()
        .route(
            "/",
            get(status)
                .post(webhook::handle)
                .fallback(method_not_allowed),
        )
        .route("/status", get(status).fallback(method_not_allowed))
        .route("/test", get(diagnostics).fallback(method_not_allowed));

    Router::new()
        .merge(endpoints.clone())
        .nest(LEGACY_PREFIX, endpoints)
        .fallback(method_not_allowed)
        .layer(middleware::from_fn(cors::cors))
        .layer(TraceLayer::new_for_http())
        .with_state(relay)
}

/// Bind `addr` and serve until SIGINT/SIGTERM, draining in-flight requests.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(relay: Arc<Relay>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "VIP relay listening");

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("VIP relay stopped");
    Ok(())
}

async fn status(State(relay): State<Arc<Relay>>) -> RelayResult<Json<StatusReport>> {
    relay.status().await.map(Json)
}

async fn diagnostics(State(relay): State<Arc<Relay>>) -> RelayResult<Json<Diagnostics>> {
    relay.diagnostics().await.map(Json)
}

async fn method_not_allowed() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "method not allowed" })),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    info!("received shutdown signal, draining requests");
}

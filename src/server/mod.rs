//! HTTP server for webhook intake and manual export triggers.
//!
//! This module provides:
//! - Shared application state (intake service, optional exporter)
//! - The axum router and its handlers
//! - Serving with graceful shutdown

mod handlers;

pub use handlers::*;

use std::future::Future;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::export::Exporter;
use crate::intake::IntakeService;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Classifies and persists inbound messages.
    pub intake: IntakeService,
    /// Sheet exporter; `None` when the store or Sheets is unavailable.
    pub exporter: Option<Arc<Exporter>>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, intake: IntakeService, exporter: Option<Arc<Exporter>>) -> Self {
        info!(
            persistence = intake.has_store(),
            export = exporter.is_some(),
            "Application state initialized"
        );
        Self {
            config,
            intake,
            exporter,
        }
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;

/// Build the HTTP router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/healthz", get(handlers::healthz))
        .route("/webhook", post(handlers::webhook))
        .route("/update/{branch}", post(handlers::update_branch))
        .route("/update_all", post(handlers::update_all))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: SharedState, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().map_err(|e| AppError::Internal {
        message: format!("Listener has no local address: {}", e),
    })?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::Internal {
            message: format!("HTTP server error: {}", e),
        })
}

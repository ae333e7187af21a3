//! HTTP binding for the ledger service.
//!
//! Routes map one-to-one onto [`LedgerService`] operations. Errors are
//! rendered as `{"message": "..."}` with a status derived from the
//! [`LedgerError`] variant.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::application::{LedgerError, LedgerService};

pub type SharedService = Arc<LedgerService>;

/// Build the application router over a shared service.
pub fn router(service: SharedService) -> Router {
    Router::new()
        .route("/accounts", get(handlers::list_accounts))
        .route("/create-account", post(handlers::create_account))
        .route("/deposit", post(handlers::deposit))
        .route("/withdraw", post(handlers::withdraw))
        .route("/transfer", post(handlers::transfer))
        .route("/statement/:iban", get(handlers::statement))
        .with_state(service)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Serve until Ctrl-C or SIGTERM, letting in-flight requests finish.
pub async fn serve(service: SharedService, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Server running on http://localhost:{}", addr.port());

    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}

impl LedgerError {
    pub fn status(&self) -> StatusCode {
        match self {
            LedgerError::Validation(_) | LedgerError::InsufficientFunds { .. } => {
                StatusCode::BAD_REQUEST
            }
            LedgerError::AccountNotFound(_) | LedgerError::NoAccounts => StatusCode::NOT_FOUND,
            LedgerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            LedgerError::Store(err) => {
                tracing::error!(error = ?err, "store failure");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

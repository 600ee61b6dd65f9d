//! HTTP trigger for migrations
//!
//! | Path | Method | Auth |
//! |------|--------|------|
//! | /api/migrate | POST | bearer |
//! | /api/migrate/last | GET | bearer |
//! | /health | GET | none |

mod auth;
mod error;
mod health;
mod migrate;
mod state;

use anyhow::{Context, Result};
use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use log::info;

pub use error::ApiError;
pub use state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/migrate", post(migrate::run_migration))
        .route("/api/migrate/last", get(migrate::last_result))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_token,
        ));

    Router::new()
        .route("/health", get(health::health))
        .merge(api)
        .with_state(state)
}

/// Serve until Ctrl-C
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("Failed to bind {}", bind))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("Server error")
}

//! Read-mostly HTTP reporting surface (spec §6): leaderboard, model, and
//! snapshot reads, checkpoint lifecycle and Merkle-proof endpoints, and the
//! admin actions (confirm/advance/backfill) gated by `ApiConfig`'s bearer key.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use state::AppState;

use std::net::SocketAddr;
use std::sync::Arc;

/// Binds and serves the reporting router until `shutdown` fires.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr, mut shutdown: tokio::sync::watch::Receiver<bool>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "reporting API listening");
    axum::serve(listener, build_router(state)).with_graceful_shutdown(async move {
        let _ = shutdown.changed().await;
    }).await
}

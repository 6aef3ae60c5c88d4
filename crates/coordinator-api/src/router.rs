use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::require_api_key;
use crate::handlers;
use crate::state::AppState;

/// Builds the full reporting router: a public sub-router for `/healthz` and
/// the `GET /reports/*`+`/data/*` surface, and an auth-gated sub-router for
/// the mutating endpoints (spec §6's "(auth)" column). When `read_auth` is
/// set the public sub-router is wrapped with the same auth layer.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mutating = Router::new()
        .route("/reports/checkpoints/{id}/confirm", post(handlers::confirm_checkpoint))
        .route("/reports/checkpoints/{id}/status", patch(handlers::advance_checkpoint_status))
        .route("/reports/backfill", post(handlers::start_backfill))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let mut reads = Router::new()
        .route("/reports/leaderboard", get(handlers::get_leaderboard))
        .route("/reports/models", get(handlers::list_models))
        .route("/reports/snapshots", get(handlers::list_snapshots))
        .route("/reports/checkpoints", get(handlers::list_checkpoints))
        .route("/reports/checkpoints/{id}/emission", get(handlers::get_checkpoint_emission))
        .route("/reports/merkle/cycles", get(handlers::list_merkle_cycles))
        .route("/reports/merkle/proof", get(handlers::get_merkle_proof))
        .route("/data/backfill/index", get(handlers::backfill_index))
        .route("/data/backfill/{*path}", get(handlers::serve_backfill_file));

    if state.config.read_auth {
        reads = reads.layer(middleware::from_fn_with_state(state.clone(), require_api_key));
    }

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .merge(reads)
        .merge(mutating)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

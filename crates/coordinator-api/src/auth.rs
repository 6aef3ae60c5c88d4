//! Bearer-token auth for the mutating reporting endpoints (spec §6: "(auth)"
//! routes), configured by `ApiConfig::{api_key, read_auth, public_prefixes}`.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;

use crate::error::ApiError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Requires a valid bearer token on every request whose path isn't under a
/// configured public prefix. Applied to the `(auth)` routes only; when
/// `read_auth` is also set the same layer additionally wraps the read-only
/// `/reports/*` and `/data/*` routers.
pub async fn require_api_key(State(state): State<Arc<AppState>>, headers: HeaderMap, request: Request, next: Next) -> Result<Response, ApiError> {
    let path = request.uri().path();
    if state.config.public_prefixes.iter().any(|prefix| path.starts_with(prefix.as_str())) {
        return Ok(next.run(request).await);
    }

    let Some(expected) = state.config.api_key.as_deref() else {
        return Err(ApiError::internal("API_KEY is not configured"));
    };

    match bearer_token(&headers) {
        Some(token) if token == expected => Ok(next.run(request).await),
        Some(_) => Err(ApiError::unauthorized("invalid bearer token")),
        None => Err(ApiError::unauthorized("missing authorization header")),
    }
}

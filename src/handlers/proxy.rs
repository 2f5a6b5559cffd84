//! Forwarding of authenticated `/api/*` traffic to backend services.
//!
//! By the time [`proxy`] runs, bearer authentication has already accepted
//! the request. The route table picks the backend; the forwarder relays.

use axum::extract::{Request, State};
use axum::response::Response;
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Forward the request to the backend owning its path prefix.
///
/// # Errors
///
/// - 404 `Route not found` if no route prefix matches
/// - 400 / 502 / 504 from the forwarder, see [`crate::services::ForwardError`]
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn proxy(State(state): State<AppState>, request: Request) -> AppResult<Response> {
    let path = request.uri().path().to_string();
    let route = state
        .routes
        .match_path(&path)
        .ok_or(AppError::NotFound(path))?;

    Ok(state.forwarder.forward(request, route).await?)
}

/// Router fallback for paths outside every registered route.
pub async fn not_found(request: Request) -> AppError {
    AppError::NotFound(request.uri().path().to_string())
}

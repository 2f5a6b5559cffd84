//! Per-request counting for `GET /metrics`.
//!
//! Every request that reaches the router is counted exactly once, before
//! authentication runs, so rejected and failed requests show up as well.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

/// Label used when neither the route table nor the router matched the path.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Count the request under its route label and method, then continue.
pub async fn record_request(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let label = route_label(&state, &request);
    state.metrics.observe(&label, request.method().as_str());

    next.run(request).await
}

/// Route pattern the request is counted under.
///
/// Backend routes use their table label, other endpoints their registered
/// router pattern.
fn route_label(state: &AppState, request: &Request) -> String {
    if let Some(entry) = state.routes.match_path(request.uri().path()) {
        return entry.label().to_string();
    }

    request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_string())
}

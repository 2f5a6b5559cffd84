//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │  Set Request ID  │ ← Generates X-Request-Id if absent
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Propagate Req ID │ ← Copies X-Request-Id onto the response
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Metering     │ ← api_gateway_requests_total++
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Bearer Auth     │ ← 401 if invalid (/api/* only)
//! └────────┬─────────┘
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `POST /auth` - Token issuance (public)
//! - `GET /metrics` - Prometheus scrape (public)
//! - `GET|POST /api/*` - Forwarded to backends (bearer token required)

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers;
use crate::middleware::{BearerAuth, record_request};
use crate::state::AppState;

/// Build the gateway router with all routes and middleware configured.
///
/// Methods other than GET and POST on `/api/*` get 405 from the router
/// itself; paths outside every route get the JSON 404 fallback.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let api = Router::new()
        .route("/api/{*path}", get(handlers::proxy).post(handlers::proxy))
        .route_layer(BearerAuth::new(state.tokens.clone()));

    info!(
        max_size_mb = config.max_request_body_size / (1024 * 1024),
        "Request body size limit configured"
    );

    Router::new()
        .route("/auth", post(handlers::login))
        .route("/metrics", get(handlers::render_metrics))
        .merge(api)
        .fallback(handlers::not_found)
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(from_fn_with_state(state.clone(), record_request))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;

    fn router() -> Router {
        build_router(AppState::new(Config::default()).unwrap())
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_login_issues_token() {
        let response = router()
            .oneshot(
                Request::post("/auth")
                    .body(Body::from(r#"{"username":"admin"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
        assert!(body["token"].as_str().is_some_and(|t| !t.is_empty()));
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let response = router()
            .oneshot(
                Request::get("/api/settings/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_string(response).await,
            r#"{"error":"Authorization header required"}"#
        );
    }

    #[tokio::test]
    async fn test_dot_segment_path_is_refused_before_forwarding() {
        let state = AppState::new(Config::default()).unwrap();
        let token = state.tokens.issue("admin").unwrap().token;
        let app = build_router(state);

        for path in [
            "/api/settings/../../admin",
            "/api/settings/%2e%2e/%2e%2e/admin",
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::get(path)
                        .header("authorization", format!("Bearer {token}"))
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "path: {path}");
            assert_eq!(
                body_string(response).await,
                r#"{"error":"Invalid request path"}"#
            );
        }
    }

    #[tokio::test]
    async fn test_unsupported_method_on_api() {
        let response = router()
            .oneshot(
                Request::builder()
                    .method(Method::DELETE)
                    .uri("/api/settings/profile")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_path_falls_back_to_json_404() {
        let response = router()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_string(response).await, r#"{"error":"Route not found"}"#);
    }

    #[tokio::test]
    async fn test_metrics_content_type() {
        let response = router()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(
            response.headers()["content-type"]
                .to_str()
                .unwrap()
                .starts_with("text/plain; version=0.0.4")
        );
    }
}

//! Bearer token authentication middleware for protected routes.
//!
//! # Usage
//!
//! Obtain a token from `POST /auth`, then present it on every `/api/*` call:
//!
//! ```bash
//! curl -H "Authorization: Bearer <token>" http://localhost:8080/api/settings/profile
//! ```
//!
//! On success the verified [`IdentityClaim`] is inserted into the request
//! extensions for downstream handlers. On any verification failure the
//! request ends here with a 401; routing and forwarding never run.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::AUTHORIZATION;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::error::AppError;
use crate::services::token::{IdentityClaim, TokenError, TokenService};

/// Bearer token authentication layer.
#[derive(Clone)]
pub struct BearerAuth {
    tokens: Arc<TokenService>,
}

impl BearerAuth {
    /// Create a layer verifying tokens with `tokens`.
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

impl<S> Layer<S> for BearerAuth {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            tokens: self.tokens.clone(),
        }
    }
}

/// Bearer token authentication service wrapper.
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    tokens: Arc<TokenService>,
}

impl<S> Service<Request<Body>> for BearerAuthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let verdict = authenticate(&self.tokens, &req);

        // Take the service that was driven to readiness, leave a fresh clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            match verdict {
                Ok(claim) => {
                    debug!(subject = %claim.subject, "Bearer token accepted");
                    req.extensions_mut().insert(claim);
                    inner.call(req).await
                }
                Err(err) => {
                    warn!(
                        path = %req.uri().path(),
                        reason = %err,
                        "Bearer token rejected"
                    );
                    Ok(AppError::from(err).into_response())
                }
            }
        })
    }
}

/// Verify the `Authorization` header of `req`.
fn authenticate<B>(tokens: &TokenService, req: &Request<B>) -> Result<IdentityClaim, TokenError> {
    let header = match req.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| {
            TokenError::InvalidSignature("Authorization header is not valid ASCII".to_string())
        })?),
        None => None,
    };

    tokens.verify(header)
}

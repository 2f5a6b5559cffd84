//! Token issuance endpoint.
//!
//! # Endpoint
//!
//! - `POST /auth` - Exchange a recognized username for a short-lived token
//!
//! # Request Body
//!
//! ```json
//! { "username": "admin" }
//! ```
//!
//! # Response Body
//!
//! ```json
//! {
//!   "token": "eyJhbGciOiJIUzI1NiJ9...",
//!   "expires_at_unix": 1700000300,
//!   "expires_at_utc": "2023-11-14 22:18:20 UTC"
//! }
//! ```

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::BytesRejection;
use tracing::{info, instrument};

use crate::error::AppResult;
use crate::models::LoginRequest;
use crate::services::{IssuedToken, TokenError};
use crate::state::AppState;

/// Issue a token for the recognized identity.
///
/// The body is parsed as JSON whatever its declared content type.
///
/// # Errors
///
/// - 400 `Invalid input` if the body is unreadable or not a JSON object
/// - 401 `Invalid credentials` if the username is missing or unrecognized
/// - 500 `Could not create token` if signing fails
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> AppResult<Json<IssuedToken>> {
    let body = body.map_err(|e| TokenError::MalformedInput(e.body_text()))?;
    let request: LoginRequest =
        serde_json::from_slice(&body).map_err(|e| TokenError::MalformedInput(e.to_string()))?;

    let subject = request.username.unwrap_or_default();
    let issued = state.tokens.issue(&subject)?;

    info!(
        subject = %subject,
        expires_at = %issued.expires_at_utc,
        "Token issued"
    );
    Ok(Json(issued))
}

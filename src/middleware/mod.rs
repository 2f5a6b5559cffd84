//! HTTP middleware for authentication and request accounting.
//!
//! ```text
//! Request → Request ID → Trace → Metering → [ /api/*: Bearer auth ] → Handler
//!                                   ↓                  ↓
//!                          requests_total++      401 Unauthorized
//! ```
//!
//! Metering wraps every route, including the fallback, so each request is
//! counted once whatever its outcome. Bearer authentication is attached only
//! to the `/api/*` routes; `/auth` and `/metrics` stay public.

pub mod auth;
pub mod metering;

pub use auth::BearerAuth;
pub use metering::{UNMATCHED_ROUTE, record_request};

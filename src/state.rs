//! Shared application state for Axum handlers and middleware.
//!
//! Everything here is built once at start-up and is read-only afterwards,
//! except the request counters, which use atomic updates internally.
//!
//! # Thread Safety
//!
//! All components are wrapped in `Arc` (or are internally reference counted,
//! like the HTTP client inside [`Forwarder`]), so cloning the state per
//! request is cheap and no request ever takes a lock held by another.

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::metrics::RequestMetrics;
use crate::route_table::RouteTable;
use crate::services::{Forwarder, TokenService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Token issuance and verification
    pub tokens: Arc<TokenService>,
    /// Prefix → backend routing
    pub routes: Arc<RouteTable>,
    /// Outbound forwarding to backends
    pub forwarder: Forwarder,
    /// Request counters exposed on `/metrics`
    pub metrics: Arc<RequestMetrics>,
}

impl AppState {
    /// Build application state from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if a backend URL is invalid or the
    /// outbound HTTP client cannot be created.
    pub fn new(config: Config) -> AppResult<Self> {
        let tokens = TokenService::new(config.jwt_secret.as_bytes(), config.admin_username.clone());
        let routes = RouteTable::from_config(&config)?;
        let forwarder = Forwarder::new(config.upstream_timeout, config.max_request_body_size)
            .map_err(|e| AppError::ConfigError(e.to_string()))?;

        for entry in routes.entries() {
            info!(prefix = entry.prefix(), backend = %entry.backend(), "Route registered");
        }

        Ok(Self {
            config: Arc::new(config),
            tokens: Arc::new(tokens),
            routes: Arc::new(routes),
            forwarder,
            metrics: Arc::new(RequestMetrics::new()),
        })
    }
}

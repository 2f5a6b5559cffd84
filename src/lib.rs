//! # Edge Gateway
//!
//! Single public entry point in front of internal backend services,
//! featuring:
//!
//! - **Authentication**: Short-lived HS256 identity tokens issued on `POST /auth`
//! - **Routing**: Path-prefix route table mapping `/api/*` to backends
//! - **Forwarding**: Streamed read relay, buffered and JSON-normalized writes
//! - **Observability**: Prometheus request counters, request IDs, structured logging
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → Metering → Bearer Auth)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (login, metrics, proxy)                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (TokenService, Forwarder) + RouteTable            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Backends (settings, callback-router)                       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edge_gateway::{AppState, Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!
//!     let state = AppState::new(config)?;
//!     let app = build_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! JWT_SECRET=change-me SETTINGS_SERVICE_URL=http://localhost:8081 cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod route_table;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::{Config, LogFormat};
pub use error::{AppError, AppResult};
pub use metrics::RequestMetrics;
pub use route_table::{RouteEntry, RouteTable};
pub use routes::build_router;
pub use services::{Forwarder, TokenService};
pub use state::AppState;

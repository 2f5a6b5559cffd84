mod auth;
mod metrics;
mod proxy;

pub use auth::login;
pub use metrics::render_metrics;
pub use proxy::{not_found, proxy};

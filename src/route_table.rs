//! Static prefix routing from request path to backend base URL.
//!
//! The table is an ordered list built once at start-up and never mutated.
//! A path matches an entry when the entry's prefix is a whole-segment prefix
//! of the path: `/api/settings` matches `/api/settings` and
//! `/api/settings/profile`, but not `/api/settingsx`. The first matching
//! entry wins.

use reqwest::Url;
use thiserror::Error;

use crate::config::Config;

/// Path prefix served by the settings service.
pub const SETTINGS_PREFIX: &str = "/api/settings";

/// Path prefix served by the callback router service.
pub const CALLBACK_ROUTER_PREFIX: &str = "/api/callback-router";

/// Route table construction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouteTableError {
    #[error("Route prefix '{0}' must start with '/'")]
    InvalidPrefix(String),

    #[error("Route prefix '{0}' is registered more than once")]
    DuplicatePrefix(String),

    #[error("Invalid backend URL '{url}': {reason}")]
    InvalidBackendUrl { url: String, reason: String },
}

/// One prefix → backend mapping.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    prefix: String,
    backend: Url,
    label: String,
}

impl RouteEntry {
    /// Create an entry, normalizing away any trailing slash on the prefix.
    ///
    /// # Errors
    ///
    /// Returns `RouteTableError` if the prefix is `/`, does not start with
    /// `/`, or the backend is not an absolute `http`/`https` URL.
    pub fn new(prefix: &str, backend_base_url: &str) -> Result<Self, RouteTableError> {
        if !prefix.starts_with('/') {
            return Err(RouteTableError::InvalidPrefix(prefix.to_string()));
        }

        let backend = Url::parse(backend_base_url.trim()).map_err(|e| {
            RouteTableError::InvalidBackendUrl {
                url: backend_base_url.to_string(),
                reason: e.to_string(),
            }
        })?;

        if !matches!(backend.scheme(), "http" | "https") {
            return Err(RouteTableError::InvalidBackendUrl {
                url: backend_base_url.to_string(),
                reason: format!("unsupported scheme '{}'", backend.scheme()),
            });
        }

        let prefix = prefix.trim_end_matches('/').to_string();
        if prefix.is_empty() {
            return Err(RouteTableError::InvalidPrefix("/".to_string()));
        }
        let label = format!("{prefix}/*path");

        Ok(Self {
            prefix,
            backend,
            label,
        })
    }

    /// The normalized prefix (no trailing slash).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The backend base URL requests are forwarded to.
    pub fn backend(&self) -> &Url {
        &self.backend
    }

    /// Route pattern used as the metrics label, e.g. `/api/settings/*path`.
    pub fn label(&self) -> &str {
        &self.label
    }

    fn matches(&self, path: &str) -> bool {
        path.strip_prefix(self.prefix.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    }
}

/// Ordered, immutable prefix → backend table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    /// Build a table from ordered entries.
    ///
    /// # Errors
    ///
    /// Returns `DuplicatePrefix` if two entries share a prefix.
    pub fn new(entries: Vec<RouteEntry>) -> Result<Self, RouteTableError> {
        for (i, entry) in entries.iter().enumerate() {
            if entries
                .iter()
                .skip(i + 1)
                .any(|other| other.prefix == entry.prefix)
            {
                return Err(RouteTableError::DuplicatePrefix(entry.prefix.clone()));
            }
        }

        Ok(Self { entries })
    }

    /// The gateway's backend routes as configured.
    pub fn from_config(config: &Config) -> Result<Self, RouteTableError> {
        Self::new(vec![
            RouteEntry::new(SETTINGS_PREFIX, &config.settings_service_url)?,
            RouteEntry::new(CALLBACK_ROUTER_PREFIX, &config.callback_router_service_url)?,
        ])
    }

    /// First entry whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|entry| entry.matches(path))
    }

    /// All entries in match order.
    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }
}

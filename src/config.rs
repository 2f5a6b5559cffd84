//! Gateway configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. In production, configure via environment variables or a `.env` file.
//! Values are read once at start-up and are immutable for the process lifetime.
//!
//! # Security Configuration
//!
//! - `JWT_SECRET`: Signing secret for identity tokens (required, never logged)
//! - `ADMIN_USERNAME`: The single subject allowed to obtain a token (default: `admin`)
//!
//! # Backends
//!
//! - `SETTINGS_SERVICE_URL`: Base URL for `/api/settings/*` (default: `http://settings:8081`)
//! - `CALLBACK_ROUTER_SERVICE_URL`: Base URL for `/api/callback-router/*`
//!   (default: `http://callback-router:8082`)
//! - `UPSTREAM_TIMEOUT_SECS`: Bound on every outbound call (default: 30)
//! - `MAX_REQUEST_BODY_SIZE`: Largest write body buffered for forwarding (default: 10MB)

use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field lines
    #[default]
    Pretty,
    /// One JSON object per event, for log shippers
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}' (expected 'pretty' or 'json')")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => f.write_str("pretty"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Gateway configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8080)
    pub port: u16,

    // =========================================================================
    // Token Configuration
    // =========================================================================
    /// HS256 signing secret shared by issuance and verification
    pub jwt_secret: String,

    /// The only subject that may log in (default: "admin")
    pub admin_username: String,

    // =========================================================================
    // Backend Configuration
    // =========================================================================
    /// Base URL of the settings service
    pub settings_service_url: String,

    /// Base URL of the callback router service
    pub callback_router_service_url: String,

    /// Timeout applied to every outbound backend call (default: 30 seconds)
    pub upstream_timeout: Duration,

    /// Maximum write body size buffered before forwarding (default: 10MB)
    pub max_request_body_size: usize,

    // =========================================================================
    // Observability Configuration
    // =========================================================================
    /// Log output format (default: pretty)
    pub log_format: LogFormat,

    /// Log level (e.g., "info", "debug", "trace")
    pub log_level: String,
}

// Hand-written so the signing secret never reaches logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("admin_username", &self.admin_username)
            .field("settings_service_url", &self.settings_service_url)
            .field(
                "callback_router_service_url",
                &self.callback_router_service_url,
            )
            .field("upstream_timeout", &self.upstream_timeout)
            .field("max_request_body_size", &self.max_request_body_size)
            .field("log_format", &self.log_format)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `JWT_SECRET` is missing or any value
    /// is invalid (e.g., non-numeric PORT, zero timeout).
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// `from_env` delegates here; tests supply a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |name: &str, default: String| lookup(name).unwrap_or(default);

        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::ConfigError("JWT_SECRET must be set".to_string()))?;

        let config = Self {
            // Server
            host: var("HOST", defaults.host),
            port: Self::parse_var(&lookup, "PORT", defaults.port)?,

            // Tokens
            jwt_secret,
            admin_username: var("ADMIN_USERNAME", defaults.admin_username),

            // Backends
            settings_service_url: var("SETTINGS_SERVICE_URL", defaults.settings_service_url),
            callback_router_service_url: var(
                "CALLBACK_ROUTER_SERVICE_URL",
                defaults.callback_router_service_url,
            ),
            upstream_timeout: Duration::from_secs(Self::parse_var(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            max_request_body_size: Self::parse_var(
                &lookup,
                "MAX_REQUEST_BODY_SIZE",
                defaults.max_request_body_size,
            )?,

            // Observability
            log_format: Self::parse_var(&lookup, "LOG_FORMAT", defaults.log_format)?,
            log_level: var("RUST_LOG", defaults.log_level),
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        if self.jwt_secret.is_empty() {
            return Err(AppError::ConfigError(
                "JWT_SECRET must not be empty".to_string(),
            ));
        }

        if self.admin_username.trim().is_empty() {
            return Err(AppError::ConfigError(
                "ADMIN_USERNAME must not be empty".to_string(),
            ));
        }

        if self.upstream_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        for (name, url) in [
            ("SETTINGS_SERVICE_URL", &self.settings_service_url),
            ("CALLBACK_ROUTER_SERVICE_URL", &self.callback_router_service_url),
        ] {
            if url.trim().is_empty() {
                return Err(AppError::ConfigError(format!("{name} must not be empty")));
            }
        }

        Ok(())
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Parse a variable into the specified type, falling back to a default.
    fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
    where
        F: Fn(&str) -> Option<String>,
        T: FromStr,
        T::Err: fmt::Display,
    {
        match lookup(name) {
            Some(val) => val
                .trim()
                .parse()
                .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
            None => Ok(default),
        }
    }
}

/// Default configuration for testing and development.
///
/// Production deployments should use `Config::from_env()` instead, which
/// refuses to start without an explicit `JWT_SECRET`.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 8080,
            // Tokens
            jwt_secret: "development-only-secret".to_string(),
            admin_username: "admin".to_string(),
            // Backends
            settings_service_url: "http://settings:8081".to_string(),
            callback_router_service_url: "http://callback-router:8082".to_string(),
            upstream_timeout: Duration::from_secs(30),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            // Observability
            log_format: LogFormat::Pretty,
            log_level: "info".to_string(),
        }
    }
}

//! Admin configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! All variables are optional.
//!
//! - `ADMIN_HOST` - Bind address (default: 127.0.0.1)
//! - `ADMIN_PORT` - Listen port (default: 3001)
//! - `CATALOG_DATA_PATH` - JSON file the document store persists to
//!   (default: in-memory only)
//! - `STORAGE_DIR` - Directory uploaded images are written to (default: ./uploads)
//! - `STORAGE_PUBLIC_URL` - Base URL uploaded images are served from
//!   (default: <http://127.0.0.1:3001/uploads/>)
//! - `CATEGORY_DELETE_POLICY` - `orphan`, `cascade` or `block` (default: orphan)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 1.0)

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

const DEFAULT_STORAGE_DIR: &str = "./uploads";
const DEFAULT_STORAGE_PUBLIC_URL: &str = "http://127.0.0.1:3001/uploads/";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// What happens to a category's children when the category is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CategoryDeletePolicy {
    /// Delete the category document only. Subcategories and products that
    /// reference it are left in place.
    #[default]
    Orphan,
    /// Delete the subcategory documents too. Products are left in place.
    Cascade,
    /// Refuse while subcategories or referencing products exist.
    Block,
}

impl FromStr for CategoryDeletePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orphan" => Ok(Self::Orphan),
            "cascade" => Ok(Self::Cascade),
            "block" => Ok(Self::Block),
            other => Err(ConfigError::InvalidEnvVar(
                "CATEGORY_DELETE_POLICY".to_string(),
                format!("expected orphan, cascade or block, got {other:?}"),
            )),
        }
    }
}

/// Object storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory uploaded blobs are written to
    pub dir: PathBuf,
    /// Public base URL the directory is served under (ends with `/`)
    pub public_url: Url,
}

/// Admin application configuration.
#[derive(Debug, Clone)]
pub struct AdminConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// File the document store persists to, if any
    pub data_path: Option<PathBuf>,
    /// Image storage configuration
    pub storage: StorageConfig,
    /// Category delete behavior
    pub delete_policy: CategoryDeletePolicy,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

impl AdminConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("ADMIN_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("ADMIN_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_PORT".to_string(), e.to_string()))?;

        let data_path = get_optional_env("CATALOG_DATA_PATH").map(PathBuf::from);
        let storage = StorageConfig::from_env()?;
        let delete_policy = get_env_or_default("CATEGORY_DELETE_POLICY", "orphan").parse()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            data_path,
            storage,
            delete_policy,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StorageConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let dir = PathBuf::from(get_env_or_default("STORAGE_DIR", DEFAULT_STORAGE_DIR));
        let public_url = parse_base_url(
            "STORAGE_PUBLIC_URL",
            &get_env_or_default("STORAGE_PUBLIC_URL", DEFAULT_STORAGE_PUBLIC_URL),
        )?;
        Ok(Self { dir, public_url })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parse a base URL, adding the trailing slash `Url::join` needs.
fn parse_base_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let with_slash = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&with_slash).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("memory") {
            Self::Memory
        } else {
            Self::Sqlite
        }
    }
}

/// Name resolution provider used by URL validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverProvider {
    /// System resolver with a timeout
    Dns,
    /// Fixed allow-list from STATIC_HOSTS (offline development only)
    Static,
}

impl ResolverProvider {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("static") {
            Self::Static
        } else {
            Self::Dns
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration loaded from environment variables.
///
/// All fields are validated at construction time.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port (default: 3000)
    pub port: u16,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// Persistence connection string (SQLite path, `sqlite://` prefix allowed)
    pub database_url: String,
    /// Name resolution provider
    pub resolver_provider: ResolverProvider,
    /// Hosts that resolve when using the static resolver
    pub static_hosts: Vec<String>,
    /// Upper bound on a single name lookup
    pub dns_timeout: Duration,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Static assets served under /public
    pub public_dir: PathBuf,
    /// Directory holding the landing page index.html
    pub views_dir: PathBuf,
    /// Log format
    pub log_format: LogFormat,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Port
        let port = match var("PORT") {
            Some(s) => s.trim().parse().map_err(|e| ConfigError {
                field: "PORT",
                message: format!("Invalid port '{}': {}", s, e),
            })?,
            None => 3000,
        };

        // Storage provider
        let storage_provider =
            StorageProvider::parse(&var("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into()));

        // Connection string
        let database_url = var("DATABASE_URL")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "./data/shorturls.db".into());

        // Resolver
        let resolver_provider =
            ResolverProvider::parse(&var("HOST_RESOLVER").unwrap_or_else(|| "dns".into()));
        let static_hosts: Vec<String> = var("STATIC_HOSTS")
            .unwrap_or_else(|| "localhost".into())
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        // DNS timeout
        let dns_timeout_ms: u64 = match var("DNS_TIMEOUT_MS") {
            Some(s) => s.trim().parse().map_err(|e| ConfigError {
                field: "DNS_TIMEOUT_MS",
                message: format!("Invalid milliseconds '{}': {}", s, e),
            })?,
            None => 5000,
        };
        if dns_timeout_ms == 0 {
            return Err(ConfigError {
                field: "DNS_TIMEOUT_MS",
                message: "Must be greater than zero".into(),
            });
        }

        // CORS allow origin
        let cors_origin_str = var("CORS_ALLOW_ORIGIN").unwrap_or_else(|| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Static content
        let public_dir = PathBuf::from(var("PUBLIC_DIR").unwrap_or_else(|| "public".into()));
        let views_dir = PathBuf::from(var("VIEWS_DIR").unwrap_or_else(|| "views".into()));

        // Log format
        let log_format =
            LogFormat::parse(&var("LOG_FORMAT").unwrap_or_else(|| "pretty".into()));

        Ok(Self {
            port,
            storage_provider,
            database_url,
            resolver_provider,
            static_hosts,
            dns_timeout: Duration::from_millis(dns_timeout_ms),
            cors_allow_origin,
            public_dir,
            views_dir,
            log_format,
        })
    }

    /// Log warnings about configuration unfit for production.
    pub fn warn_if_insecure(&self) {
        if self.resolver_provider == ResolverProvider::Static {
            tracing::warn!(
                hosts = ?self.static_hosts,
                "HOST_RESOLVER=static: only listed hosts are accepted and no real name \
                 resolution happens. DO NOT USE IN PRODUCTION."
            );
        }
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: short URLs are lost on restart.");
        }
    }
}

//! Centralized configuration for api-server.
//!
//! All environment variables are loaded and validated at startup to fail fast
//! on misconfiguration rather than at request time.

use axum::http::HeaderValue;
use domain::{PathCleanup, ReplacerTables};
use std::env;
use std::fmt;
use std::path::PathBuf;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on restart)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("sqlite") {
            Self::Sqlite
        } else {
            Self::Memory
        }
    }
}

/// Cascade behavior applied when a node's resource locator moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeStrategy {
    /// Every descendant gets its prefix rewritten.
    Full,
    /// Only published descendants are re-rooted.
    Leaf,
}

impl TreeStrategy {
    fn from_str(s: &str) -> Result<Self, ConfigError> {
        if s.eq_ignore_ascii_case("full") {
            Ok(Self::Full)
        } else if s.eq_ignore_ascii_case("leaf") {
            Ok(Self::Leaf)
        } else {
            Err(ConfigError {
                field: "TREE_STRATEGY",
                message: format!("Expected 'full' or 'leaf', got '{}'", s),
            })
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Leaf => "leaf",
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
    fn from_str(s: &str) -> Self {
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
    /// Server port (default: 3001)
    pub port: u16,
    /// CORS allow origin
    pub cors_allow_origin: HeaderValue,
    /// Storage provider
    pub storage_provider: StorageProvider,
    /// SQLite database path (default `./data/resource_locators.db`)
    pub db_path: Option<PathBuf>,
    /// Log format
    pub log_format: LogFormat,
    /// Cascade strategy
    pub tree_strategy: TreeStrategy,
    /// Replacer tables, parsed from `REPLACERS_PATH` or the built-in set
    pub replacers: ReplacerTables,
    /// Base for public URLs of resource locators
    pub public_base_url: Option<String>,
}

impl Config {
    /// Load and validate configuration from environment variables.
    ///
    /// Fails fast on invalid configuration.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Port
        let port = match env::var("PORT") {
            Ok(s) => s.parse().map_err(|_| ConfigError {
                field: "PORT",
                message: format!("Not a valid port: '{}'", s),
            })?,
            Err(_) => 3001,
        };

        // CORS allow origin
        let cors_origin_str = env::var("CORS_ALLOW_ORIGIN").unwrap_or_else(|_| "*".into());
        let cors_allow_origin = if cors_origin_str == "*" {
            HeaderValue::from_static("*")
        } else {
            HeaderValue::from_str(&cors_origin_str).map_err(|e| ConfigError {
                field: "CORS_ALLOW_ORIGIN",
                message: format!("Invalid header value '{}': {}", cors_origin_str, e),
            })?
        };

        // Storage provider
        let storage_provider = StorageProvider::from_str(
            &env::var("STORAGE_PROVIDER").unwrap_or_else(|_| "sqlite".into()),
        );

        let db_path = env::var("DB_PATH").ok().map(PathBuf::from);

        let log_format =
            LogFormat::from_str(&env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()));

        let tree_strategy = match env::var("TREE_STRATEGY").ok().filter(|s| !s.is_empty()) {
            Some(s) => TreeStrategy::from_str(&s)?,
            None => TreeStrategy::Leaf,
        };

        // Replacer tables
        let replacers = match env::var("REPLACERS_PATH").ok().filter(|s| !s.is_empty()) {
            Some(path) => load_replacers(&path)?,
            None => ReplacerTables::builtin(),
        };

        let public_base_url = env::var("PUBLIC_BASE_URL").ok().filter(|s| !s.is_empty());

        Ok(Self {
            port,
            cors_allow_origin,
            storage_provider,
            db_path,
            log_format,
            tree_strategy,
            replacers,
            public_base_url,
        })
    }

    pub fn path_cleanup(&self) -> PathCleanup {
        PathCleanup::new(self.replacers.clone())
    }

    /// Log warnings about configuration that loses data or differs from defaults.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!(
                "STORAGE_PROVIDER=memory: resource locators and history are lost on restart."
            );
        }
        if self.storage_provider == StorageProvider::Sqlite && !cfg!(feature = "sqlite") {
            tracing::warn!(
                "STORAGE_PROVIDER=sqlite but the `sqlite` feature is disabled; using memory."
            );
        }
    }
}

fn load_replacers(path: &str) -> Result<ReplacerTables, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError {
        field: "REPLACERS_PATH",
        message: format!("Cannot read '{}': {}", path, e),
    })?;
    ReplacerTables::from_json(&raw).map_err(|e| ConfigError {
        field: "REPLACERS_PATH",
        message: e.to_string(),
    })
}

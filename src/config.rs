//! Configuration types.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::error::ConfigError;

/// Server configuration, read from `FORMATION_DESK_*` environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to bind.
    pub bind: String,
    /// HTTP port.
    pub port: u16,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Directory for daily-rolling log files. Logs go to stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Client list page size when the request omits `limit`.
    pub default_page_size: u32,
    /// Upper bound on any requested `limit`.
    pub max_page_size: u32,
    /// Team member assigned to newly created clients.
    pub default_assignee: i64,
    /// Author recorded on progress updates and communications.
    pub default_author: i64,
    /// Allowed CORS origins; `["*"]` allows any.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
            db_path: PathBuf::from("./data/formation-desk.db"),
            log_dir: None,
            default_page_size: 20,
            max_page_size: 100,
            default_assignee: 1,
            default_author: 1,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup. Unset keys fall
    /// back to defaults; set-but-unparsable keys are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let bind = lookup("FORMATION_DESK_BIND").unwrap_or(defaults.bind);
        let port = parse_var(&lookup, "FORMATION_DESK_PORT", defaults.port)?;
        let db_path = lookup("FORMATION_DESK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);
        let log_dir = lookup("FORMATION_DESK_LOG_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);
        let default_page_size =
            parse_var(&lookup, "FORMATION_DESK_PAGE_SIZE", defaults.default_page_size)?;
        let max_page_size =
            parse_var(&lookup, "FORMATION_DESK_MAX_PAGE_SIZE", defaults.max_page_size)?;
        let default_assignee = parse_var(
            &lookup,
            "FORMATION_DESK_DEFAULT_ASSIGNEE",
            defaults.default_assignee,
        )?;
        let default_author =
            parse_var(&lookup, "FORMATION_DESK_DEFAULT_AUTHOR", defaults.default_author)?;

        let cors_origins: Vec<String> = match lookup("FORMATION_DESK_CORS_ORIGINS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => defaults.cors_origins,
        };

        if default_page_size == 0 || max_page_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "FORMATION_DESK_PAGE_SIZE".into(),
                message: "page sizes must be positive".into(),
            });
        }
        if default_page_size > max_page_size {
            return Err(ConfigError::InvalidValue {
                key: "FORMATION_DESK_PAGE_SIZE".into(),
                message: format!(
                    "default page size {default_page_size} exceeds maximum {max_page_size}"
                ),
            });
        }

        Ok(Self {
            bind,
            port,
            db_path,
            log_dir,
            default_page_size,
            max_page_size,
            default_assignee,
            default_author,
            cors_origins,
        })
    }

    /// Socket address the HTTP server listens on.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidValue {
                key: "FORMATION_DESK_BIND".into(),
                message: format!("{e}"),
            })
    }

    /// Whether any origin may make cross-origin requests.
    pub fn cors_allows_any(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            }),
        None => Ok(default),
    }
}

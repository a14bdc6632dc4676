//! Process configuration loaded from environment variables.
//!
//! # Invariants
//! - Every setting has a default; an unset variable never fails loading.
//! - A set but malformed variable is rejected, never silently ignored.

use crate::logging::default_log_level;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REDIS_ADDRESS: &str = "localhost:6379";
const DEFAULT_SERVER_PORT: u16 = 3000;
const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_STORE_POOL_SIZE: u32 = 16;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
const SQLITE_MEMORY_URL: &str = "sqlite::memory:";
const SQLITE_URL_PREFIX: &str = "sqlite://";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid {
        variable: &'static str,
        value: String,
        reason: &'static str,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid {
                variable,
                value,
                reason,
            } => write!(f, "invalid {variable}=`{value}`: {reason}"),
        }
    }
}

impl Error for ConfigError {}

/// Where records are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Redis(String),
    SqliteFile(PathBuf),
    SqliteMemory,
}

impl StoreLocation {
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Redis(_) => "redis",
            Self::SqliteFile(_) | Self::SqliteMemory => "sqlite",
        }
    }

    fn parse(raw: &str) -> Result<Self, ConfigError> {
        let invalid = |reason| ConfigError::Invalid {
            variable: "STORE_URL",
            value: raw.to_string(),
            reason,
        };

        if raw == SQLITE_MEMORY_URL {
            return Ok(Self::SqliteMemory);
        }
        if let Some(path) = raw.strip_prefix(SQLITE_URL_PREFIX) {
            if path.is_empty() {
                return Err(invalid("sqlite url needs a file path"));
            }
            return Ok(Self::SqliteFile(PathBuf::from(path)));
        }
        if raw.starts_with("redis://") || raw.starts_with("rediss://") {
            return Ok(Self::Redis(raw.to_string()));
        }
        Err(invalid("expected redis://, rediss://, sqlite://<path> or sqlite::memory:"))
    }
}

/// Runtime settings for the store, HTTP server and logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub store: StoreLocation,
    pub server_port: u16,
    pub store_timeout: Duration,
    pub store_pool_size: u32,
    pub request_timeout: Duration,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreLocation::Redis(format!("redis://{DEFAULT_REDIS_ADDRESS}")),
            server_port: DEFAULT_SERVER_PORT,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            store_pool_size: DEFAULT_STORE_POOL_SIZE,
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(url) = read("STORE_URL") {
            config.store = StoreLocation::parse(&url)?;
        } else if let Some(address) = read("REDIS_ADDRESS") {
            config.store = StoreLocation::Redis(format!("redis://{address}"));
        }

        if let Some(raw) = read("SERVER_PORT") {
            config.server_port = parse_number("SERVER_PORT", &raw)?;
        }
        if let Some(raw) = read("STORE_TIMEOUT_MS") {
            config.store_timeout = parse_millis("STORE_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = read("STORE_POOL_SIZE") {
            config.store_pool_size = parse_number("STORE_POOL_SIZE", &raw)?;
            if config.store_pool_size == 0 {
                return Err(ConfigError::Invalid {
                    variable: "STORE_POOL_SIZE",
                    value: raw,
                    reason: "must be at least 1",
                });
            }
        }
        if let Some(raw) = read("REQUEST_TIMEOUT_MS") {
            config.request_timeout = parse_millis("REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(level) = read("LOG_LEVEL") {
            config.log_level = level;
        }
        config.log_dir = read("LOG_DIR");

        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(variable: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::Invalid {
        variable,
        value: raw.to_string(),
        reason: "not a valid unsigned number in range",
    })
}

fn parse_millis(variable: &'static str, raw: &str) -> Result<Duration, ConfigError> {
    let millis: u64 = parse_number(variable, raw)?;
    if millis == 0 {
        return Err(ConfigError::Invalid {
            variable,
            value: raw.to_string(),
            reason: "timeout must be positive",
        });
    }
    Ok(Duration::from_millis(millis))
}

//! services/companion/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;
use video_learning_core::polling::DEFAULT_POLL_INTERVAL_SECS;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Base URL of the REST backend, without a trailing slash.
    pub api_base_url: String,
    pub api_access_token: Option<String>,
    pub database_url: String,
    pub log_level: Level,
    pub poll_interval: Duration,
    pub http_timeout: Duration,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` uses the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Load Server Settings ---
        let bind_address_str = lookup("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:4000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let allowed_origin =
            lookup("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- Load Backend and Database Settings ---
        let api_base_url = lookup("API_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .ok_or_else(|| ConfigError::MissingVar("API_BASE_URL".to_string()))?;
        if !(api_base_url.starts_with("http://") || api_base_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(
                "API_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", api_base_url),
            ));
        }
        let api_access_token = lookup("API_ACCESS_TOKEN").filter(|t| !t.trim().is_empty());

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Timing Settings ---
        let poll_interval = Duration::from_secs(parse_secs(
            &lookup,
            "POLL_INTERVAL_SECS",
            DEFAULT_POLL_INTERVAL_SECS,
        )?);
        let http_timeout = Duration::from_secs(parse_secs(&lookup, "HTTP_TIMEOUT_SECS", 30)?);

        Ok(Self {
            bind_address,
            api_base_url,
            api_access_token,
            database_url,
            log_level,
            poll_interval,
            http_timeout,
            allowed_origin,
        })
    }
}

fn parse_secs<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(0) | Err(_) => Err(ConfigError::InvalidValue(
                key.to_string(),
                format!("'{}' is not a positive number of seconds", raw),
            )),
            Ok(secs) => Ok(secs),
        },
    }
}

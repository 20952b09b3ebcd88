//! Engine configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `CHAIRTIME_DATABASE_URL` - `PostgreSQL` connection string (falls back
//!   to `DATABASE_URL`)
//!
//! ## Optional
//! - `CHAIRTIME_MAX_CONNECTIONS` - Pool size cap (default: 10)
//! - `CHAIRTIME_MIN_CONNECTIONS` - Pool warm floor (default: 2)
//! - `CHAIRTIME_DEFAULT_UTC_OFFSET_MINUTES` - Shop-local UTC offset in
//!   minutes for tenants without one configured (default: 0)

use chrono::FixedOffset;
use secrecy::SecretString;
use thiserror::Error;

use crate::clock::offset_from_minutes;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// Maximum pool connections
    pub max_connections: u32,
    /// Minimum pool connections kept warm
    pub min_connections: u32,
    /// Fallback UTC offset for tenants without their own, in minutes
    pub default_utc_offset_minutes: i32,
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field(
                "default_utc_offset_minutes",
                &self.default_utc_offset_minutes,
            )
            .finish()
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("CHAIRTIME_DATABASE_URL")?;
        let max_connections = parse_env_or_default("CHAIRTIME_MAX_CONNECTIONS", 10)?;
        let min_connections = parse_env_or_default("CHAIRTIME_MIN_CONNECTIONS", 2)?;
        let default_utc_offset_minutes =
            parse_env_or_default("CHAIRTIME_DEFAULT_UTC_OFFSET_MINUTES", 0)?;

        Ok(Self {
            database_url,
            max_connections,
            min_connections,
            default_utc_offset_minutes,
        })
    }

    /// The fallback offset as a `FixedOffset`, clamped to chrono's range.
    #[must_use]
    pub fn default_offset(&self) -> FixedOffset {
        offset_from_minutes(self.default_utc_offset_minutes)
    }
}

/// Get database URL with fallback to generic `DATABASE_URL` (set by managed
/// postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an environment variable parsed to `T`, or a default when unset.
fn parse_env_or_default<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

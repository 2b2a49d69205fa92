//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing.
//! The database URL is wrapped in secrecy::SecretString so credentials
//! embedded in it never reach the logs.

pub mod secrets;

use crate::error::{Error, Result};
use secrecy::SecretString;

/// Pool size used when `DATABASE_MAX_CONNECTIONS` is unset.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub max_connections: u32,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            max_connections: parse_max_connections(
                std::env::var("DATABASE_MAX_CONNECTIONS").ok().as_deref(),
            )?,
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn parse_max_connections(raw: Option<&str>) -> Result<u32> {
    match raw {
        None => Ok(DEFAULT_MAX_CONNECTIONS),
        Some(value) => match value.trim().parse::<u32>() {
            Ok(0) | Err(_) => Err(Error::Config(format!(
                "DATABASE_MAX_CONNECTIONS must be a positive integer, got {value:?}"
            ))),
            Ok(n) => Ok(n),
        },
    }
}

//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use forecast_generation::application::coordinator::DEFAULT_FRAGMENT_BUFFER;
use forecast_generation::application::poller::PollPolicy;

use crate::error::AppError;

/// Runtime configuration for the API server.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Maximum pool size.
    pub database_max_connections: u32,
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// Endpoint of the upstream NDJSON narrative generator.
    pub generator_url: String,
    /// Capacity of each generation's listener channel.
    pub fragment_buffer: usize,
    /// Schedule used by `?wait=true` lookups.
    pub poll_policy: PollPolicy,
    /// OTLP collector endpoint; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
}

impl Config {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing or a
    /// value does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{key} environment variable must be set")))
        };

        let poll_interval_ms: u64 = parse_or(&lookup, "POLL_INTERVAL_MS", 2_000)?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            generator_url: required("GENERATOR_URL")?,
            fragment_buffer: parse_or(&lookup, "FRAGMENT_BUFFER", DEFAULT_FRAGMENT_BUFFER)?,
            poll_policy: PollPolicy {
                attempts: parse_or(&lookup, "POLL_ATTEMPTS", 30)?,
                interval: Duration::from_millis(poll_interval_ms),
            },
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT")
                .filter(|value| !value.trim().is_empty()),
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `HOST:PORT` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid: {e}"))),
        None => Ok(default),
    }
}

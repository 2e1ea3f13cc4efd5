//! Service Configuration
//!
//! TigerStyle: Resolve once at startup, fail loudly on anything missing.
//!
//! Backend URL priority: explicit flag, then `DB_URL`, `PG_DB_URL`,
//! `REDIS_DB_URL`. Empty values count as unset.
//!
//! Metrics go to statsd when `STATSD_HOST` is set, otherwise nowhere.

use std::net::SocketAddr;

use crate::constants::{
    BACKEND_URL_ENV_VARS, STATSD_HOST_DEFAULT, STATSD_HOST_ENV_VAR, STATSD_PORT_DEFAULT,
};

/// Where request metrics are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsSink {
    /// Metrics are discarded
    Null,
    /// Metrics are pushed to a statsd daemon over UDP
    Statsd {
        /// Daemon host
        host: String,
        /// Daemon port
        port: u16,
    },
}

impl MetricsSink {
    /// Parse a `STATSD_HOST` value: `host:port`, `host`, or `:port`.
    ///
    /// # Errors
    /// Returns error if the port is not a number.
    pub fn from_statsd_host(value: Option<String>) -> Result<Self, ConfigError> {
        let Some(value) = value.filter(|v| !v.is_empty()) else {
            return Ok(Self::Null);
        };

        let (host, port) = match value.rsplit_once(':') {
            Some((host, port)) => {
                let port: u16 = port
                    .parse()
                    .map_err(|_| ConfigError::InvalidStatsdAddress(value.clone()))?;
                (host, port)
            }
            None => (value.as_str(), STATSD_PORT_DEFAULT),
        };
        let host = if host.is_empty() { STATSD_HOST_DEFAULT } else { host };

        Ok(Self::Statsd {
            host: host.to_string(),
            port,
        })
    }
}

/// Resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen address
    pub bind: SocketAddr,
    /// Store connection string, passed to the factory unmodified
    pub backend_url: String,
    /// Metrics destination
    pub metrics: MetricsSink,
}

impl ServiceConfig {
    /// Resolve from CLI values and the process environment.
    ///
    /// # Errors
    /// Returns error if the bind address does not parse or no backend URL
    /// is configured anywhere.
    pub fn resolve(bind: &str, db_url: Option<String>) -> Result<Self, ConfigError> {
        Self::resolve_with(bind, db_url, |name| std::env::var(name).ok())
    }

    /// Resolve with an injectable environment lookup.
    pub fn resolve_with(
        bind: &str,
        db_url: Option<String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind: SocketAddr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(bind.to_string()))?;

        let backend_url = db_url
            .filter(|url| !url.is_empty())
            .or_else(|| {
                BACKEND_URL_ENV_VARS
                    .iter()
                    .find_map(|name| env(name).filter(|url| !url.is_empty()))
            })
            .ok_or(ConfigError::MissingBackendUrl)?;

        let metrics = MetricsSink::from_statsd_host(env(STATSD_HOST_ENV_VAR))?;

        Ok(Self {
            bind,
            backend_url,
            metrics,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Bind address is not `host:port`
    #[error("invalid bind address: {0}")]
    InvalidBindAddress(String),

    /// Neither the flag nor any fallback variable is set
    #[error("no backend configured: pass --db-url or set DB_URL, PG_DB_URL or REDIS_DB_URL")]
    MissingBackendUrl,

    /// `STATSD_HOST` has a non-numeric port
    #[error("invalid STATSD_HOST: {0}")]
    InvalidStatsdAddress(String),
}

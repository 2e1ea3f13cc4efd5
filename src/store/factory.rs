//! Store Factory - Connection String to Engine
//!
//! The scheme before `://` picks the engine; the whole string is handed to
//! that engine unmodified. Unknown schemes fail before any connection is
//! attempted.

use std::fmt;

use async_trait::async_trait;

use super::backend::CounterStore;
use super::error::{StoreError, StoreResult};
use super::memory::MemoryCounterStore;
#[cfg(feature = "postgres")]
use super::postgres::PostgresCounterStore;
#[cfg(feature = "redis")]
use super::redis::RedisCounterStore;

/// Storage engine selected by a connection string scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// `memory://`
    Memory,
    /// `postgres://` or `postgresql://`
    Postgres,
    /// `redis://` or `rediss://`
    Redis,
}

impl BackendKind {
    /// Select an engine from a connection string.
    ///
    /// # Errors
    /// `UnsupportedBackend` if the string has no scheme or an unknown one.
    pub fn from_connection_string(connection_string: &str) -> StoreResult<Self> {
        let (scheme, _) = connection_string.split_once("://").ok_or_else(|| {
            StoreError::unsupported(format!(
                "connection string has no scheme: {connection_string:?}"
            ))
        })?;

        match scheme {
            "memory" => Ok(Self::Memory),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            "redis" | "rediss" => Ok(Self::Redis),
            other => Err(StoreError::unsupported(format!("unknown scheme {other:?}"))),
        }
    }

    /// Get string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres => "postgres",
            Self::Redis => "redis",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend enum wrapper that implements CounterStore
#[derive(Debug, Clone)]
pub enum Backend {
    /// Process-local maps
    Memory(MemoryCounterStore),
    /// Row-locked SQL tables
    #[cfg(feature = "postgres")]
    Postgres(PostgresCounterStore),
    /// Atomic INCR keys
    #[cfg(feature = "redis")]
    Redis(RedisCounterStore),
}

macro_rules! dispatch {
    ($self:ident, $store:ident => $call:expr) => {
        match $self {
            Backend::Memory($store) => $call,
            #[cfg(feature = "postgres")]
            Backend::Postgres($store) => $call,
            #[cfg(feature = "redis")]
            Backend::Redis($store) => $call,
        }
    };
}

impl Backend {
    /// Which engine this handle wraps.
    #[must_use]
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Memory(_) => BackendKind::Memory,
            #[cfg(feature = "postgres")]
            Self::Postgres(_) => BackendKind::Postgres,
            #[cfg(feature = "redis")]
            Self::Redis(_) => BackendKind::Redis,
        }
    }
}

#[async_trait]
impl CounterStore for Backend {
    async fn create_schema(&self) -> StoreResult<()> {
        dispatch!(self, s => s.create_schema().await)
    }

    async fn drop_schema(&self) -> StoreResult<()> {
        dispatch!(self, s => s.drop_schema().await)
    }

    async fn create_token(&self, token: &str) -> StoreResult<()> {
        dispatch!(self, s => s.create_token(token).await)
    }

    async fn increment_and_get_token(&self, token: &str) -> StoreResult<i64> {
        dispatch!(self, s => s.increment_and_get_token(token).await)
    }

    async fn increment_and_get_namespaced_token(
        &self,
        token: &str,
        namespace: &str,
    ) -> StoreResult<i64> {
        dispatch!(self, s => s.increment_and_get_namespaced_token(token, namespace).await)
    }

    async fn close(&self) -> StoreResult<()> {
        dispatch!(self, s => s.close().await)
    }
}

/// Create a counter store from a connection string.
///
/// # Errors
/// `UnsupportedBackend` for an unknown scheme or an engine left out of
/// this build; `StorageUnavailable` if the engine cannot connect.
pub async fn open(connection_string: &str) -> StoreResult<Backend> {
    let kind = BackendKind::from_connection_string(connection_string)?;
    tracing::info!(backend = %kind, "opening counter store");

    match kind {
        BackendKind::Memory => Ok(Backend::Memory(MemoryCounterStore::new())),

        #[cfg(feature = "postgres")]
        BackendKind::Postgres => Ok(Backend::Postgres(
            PostgresCounterStore::connect(connection_string).await?,
        )),
        #[cfg(not(feature = "postgres"))]
        BackendKind::Postgres => Err(StoreError::unsupported(
            "postgres engine not compiled in (enable feature `postgres`)",
        )),

        #[cfg(feature = "redis")]
        BackendKind::Redis => Ok(Backend::Redis(
            RedisCounterStore::connect(connection_string).await?,
        )),
        #[cfg(not(feature = "redis"))]
        BackendKind::Redis => Err(StoreError::unsupported(
            "redis engine not compiled in (enable feature `redis`)",
        )),
    }
}

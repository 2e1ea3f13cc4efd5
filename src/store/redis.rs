//! RedisCounterStore - Atomic Key-Value Engine
//!
//! TigerStyle: The back end's INCR is the only serialization point.
//!
//! # Key Layout
//!
//! ```text
//! inc:counter:{token}            base counter
//! inc:ns:{token}:{namespace}     namespaced counter
//! ```
//!
//! Tokens never contain `:`, so the first separator after `inc:ns:` always
//! ends the token and no namespaced key can alias a base key.
//!
//! # Existence Race
//!
//! Increments check existence with EXISTS and then call INCR, with no
//! transaction around the pair. A key removed between the two calls would
//! be recreated by INCR at 1. Counters are never deleted outside
//! `drop_schema`, which is not safe to run alongside other operations, so
//! the window only opens during teardown.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::RwLock;

use super::backend::{validate_token, CounterStore};
use super::error::{StoreError, StoreResult};
use crate::constants::{KEY_SEPARATOR, KV_DROP_BATCH_COUNT, KV_KEY_PREFIX};

/// Redis counter store.
///
/// Clones share one connection. After `close` every clone fails with
/// `StorageUnavailable`.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: Arc<RwLock<Option<MultiplexedConnection>>>,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore").finish_non_exhaustive()
    }
}

impl RedisCounterStore {
    /// Connect with a `redis://` or `rediss://` URL.
    ///
    /// # Errors
    /// `StorageUnavailable` if the URL is empty or rejected by the driver,
    /// or the server cannot be reached.
    pub async fn connect(connection_string: &str) -> StoreResult<Self> {
        if connection_string.is_empty() {
            return Err(StoreError::unavailable("empty redis url"));
        }

        let client = redis::Client::open(connection_string)
            .map_err(|e| StoreError::unavailable(format!("invalid redis url: {e}")))?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| classify(e, "connect"))?;

        Ok(Self {
            conn: Arc::new(RwLock::new(Some(conn))),
        })
    }

    /// Handle on the shared connection, unless closed.
    async fn conn(&self) -> StoreResult<MultiplexedConnection> {
        self.conn
            .read()
            .await
            .clone()
            .ok_or_else(|| StoreError::unavailable("redis store closed"))
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.exists(key)
            .await
            .map_err(|e| classify(e, "check key"))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let mut conn = self.conn().await?;
        let count: i64 = conn
            .incr(key, 1)
            .await
            .map_err(|e| classify(e, "increment key"))?;

        // Postcondition
        assert!(count > 0, "count must be positive after increment");

        Ok(count)
    }

    /// Set `key` to 0 unless present. True if this call created it.
    async fn init_if_absent(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn().await?;
        conn.set_nx(key, 0)
            .await
            .map_err(|e| classify(e, "initialize key"))
    }
}

// =============================================================================
// Keys
// =============================================================================

fn counter_key(token: &str) -> String {
    format!("{KV_KEY_PREFIX}{KEY_SEPARATOR}counter{KEY_SEPARATOR}{token}")
}

fn namespaced_key(token: &str, namespace: &str) -> String {
    format!("{KV_KEY_PREFIX}{KEY_SEPARATOR}ns{KEY_SEPARATOR}{token}{KEY_SEPARATOR}{namespace}")
}

fn classify(err: redis::RedisError, op: &'static str) -> StoreError {
    if err.is_timeout() || err.is_connection_dropped() || err.is_connection_refusal() {
        tracing::warn!(error = %err, op, "redis connection fault");
    } else {
        tracing::error!(error = %err, op, "redis operation failed");
    }
    StoreError::unavailable(format!("{op}: {err}"))
}

// =============================================================================
// CounterStore Implementation
// =============================================================================

#[async_trait]
impl CounterStore for RedisCounterStore {
    /// Key-value storage has no schema to prepare.
    async fn create_schema(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Delete every key owned by this engine.
    async fn drop_schema(&self) -> StoreResult<()> {
        let mut conn = self.conn().await?;
        let pattern = format!("{KV_KEY_PREFIX}{KEY_SEPARATOR}*");
        let mut cursor: u64 = 0;
        let mut deleted: usize = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(KV_DROP_BATCH_COUNT)
                .query_async(&mut conn)
                .await
                .map_err(|e| classify(e, "scan keys"))?;

            if !keys.is_empty() {
                let removed: usize = conn
                    .del(&keys)
                    .await
                    .map_err(|e| classify(e, "delete keys"))?;
                deleted += removed;
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        tracing::info!(deleted, "redis keys dropped");
        Ok(())
    }

    async fn create_token(&self, token: &str) -> StoreResult<()> {
        validate_token(token)?;

        if !self.init_if_absent(&counter_key(token)).await? {
            return Err(StoreError::duplicate_token(token));
        }

        tracing::debug!(token = %token, "created counter");
        Ok(())
    }

    async fn increment_and_get_token(&self, token: &str) -> StoreResult<i64> {
        validate_token(token)?;

        let key = counter_key(token);
        if !self.exists(&key).await? {
            return Err(StoreError::invalid_token(token));
        }
        self.incr(&key).await
    }

    async fn increment_and_get_namespaced_token(
        &self,
        token: &str,
        namespace: &str,
    ) -> StoreResult<i64> {
        validate_token(token)?;

        let key = namespaced_key(token, namespace);
        if self.exists(&key).await? {
            return self.incr(&key).await;
        }

        if !self.exists(&counter_key(token)).await? {
            return Err(StoreError::invalid_token(token));
        }

        if self.init_if_absent(&key).await? {
            tracing::debug!(token = %token, namespace = %namespace, "created namespaced counter");
            return Ok(0);
        }

        // Lost a concurrent first touch; the counter now exists.
        self.incr(&key).await
    }

    /// Release the shared connection; the socket closes once in-flight
    /// calls finish with their handles.
    async fn close(&self) -> StoreResult<()> {
        if self.conn.write().await.take().is_some() {
            tracing::info!("redis connection closed");
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

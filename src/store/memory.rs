//! MemoryCounterStore - Process-Local Engine
//!
//! TigerStyle: Reference engine for correctness testing of the others.
//!
//! Both maps sit behind a single mutex, so every operation observes and
//! mutates them atomically. Each instance owns its own maps; instances
//! never share state.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::backend::{validate_token, CounterStore};
use super::error::{StoreError, StoreResult};

/// Base counters and namespaced counters.
#[derive(Debug, Default)]
struct Tables {
    counters: HashMap<String, i64>,
    namespaced: HashMap<(String, String), i64>,
}

/// In-memory counter store.
///
/// `None` means the schema has not been created (or was dropped); every
/// counter operation then fails with `StorageUnavailable`, the same way a
/// missing table fails in the relational engine.
#[derive(Debug, Clone, Default)]
pub struct MemoryCounterStore {
    tables: Arc<Mutex<Option<Tables>>>,
}

impl MemoryCounterStore {
    /// Create a store with no schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of base counters (testing aid).
    pub async fn token_count(&self) -> usize {
        self.tables
            .lock()
            .await
            .as_ref()
            .map_or(0, |t| t.counters.len())
    }

    /// Number of namespaced counters (testing aid).
    pub async fn namespaced_count(&self) -> usize {
        self.tables
            .lock()
            .await
            .as_ref()
            .map_or(0, |t| t.namespaced.len())
    }
}

fn schema_missing() -> StoreError {
    StoreError::unavailable("memory schema not created")
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn create_schema(&self) -> StoreResult<()> {
        let mut guard = self.tables.lock().await;
        if guard.is_none() {
            *guard = Some(Tables::default());
            tracing::debug!("memory schema created");
        }
        Ok(())
    }

    async fn drop_schema(&self) -> StoreResult<()> {
        *self.tables.lock().await = None;
        tracing::debug!("memory schema dropped");
        Ok(())
    }

    async fn create_token(&self, token: &str) -> StoreResult<()> {
        validate_token(token)?;

        let mut guard = self.tables.lock().await;
        let tables = guard.as_mut().ok_or_else(schema_missing)?;

        if tables.counters.contains_key(token) {
            return Err(StoreError::duplicate_token(token));
        }
        tables.counters.insert(token.to_string(), 0);

        tracing::debug!(token = %token, "created counter");
        Ok(())
    }

    async fn increment_and_get_token(&self, token: &str) -> StoreResult<i64> {
        validate_token(token)?;

        let mut guard = self.tables.lock().await;
        let tables = guard.as_mut().ok_or_else(schema_missing)?;

        let count = tables
            .counters
            .get_mut(token)
            .ok_or_else(|| StoreError::invalid_token(token))?;
        *count += 1;

        // Postcondition
        assert!(*count > 0, "count must be positive after increment");

        Ok(*count)
    }

    async fn increment_and_get_namespaced_token(
        &self,
        token: &str,
        namespace: &str,
    ) -> StoreResult<i64> {
        validate_token(token)?;

        let mut guard = self.tables.lock().await;
        let tables = guard.as_mut().ok_or_else(schema_missing)?;

        if !tables.counters.contains_key(token) {
            return Err(StoreError::invalid_token(token));
        }

        let key = (token.to_string(), namespace.to_string());
        match tables.namespaced.get_mut(&key) {
            Some(count) => {
                *count += 1;
                Ok(*count)
            }
            None => {
                tables.namespaced.insert(key, 0);
                tracing::debug!(token = %token, namespace = %namespace, "created namespaced counter");
                Ok(0)
            }
        }
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}

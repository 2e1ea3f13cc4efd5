//! CounterStore - The Contract Every Engine Satisfies
//!
//! TigerStyle: One capability set, identical observable semantics.

use async_trait::async_trait;

use super::error::{StoreError, StoreResult};
use crate::constants::KEY_SEPARATOR;

/// Token-keyed counters with optional per-namespace sub-counters.
///
/// Implementations must be safe for concurrent use by many callers without
/// external synchronization. Increments on the same key are serializable:
/// N concurrent increments from count `c` return exactly `c+1 ..= c+N`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Prepare persistent structures. Idempotent; never destroys data.
    async fn create_schema(&self) -> StoreResult<()>;

    /// Remove all persisted state. Not safe alongside other operations.
    async fn drop_schema(&self) -> StoreResult<()>;

    /// Register a base counter at 0.
    ///
    /// # Errors
    /// `DuplicateToken` if the token already exists; the existing counter
    /// is left untouched.
    async fn create_token(&self, token: &str) -> StoreResult<()>;

    /// Increment the base counter by one and return the new value.
    ///
    /// # Errors
    /// `InvalidToken` if no counter exists; nothing is created.
    async fn increment_and_get_token(&self, token: &str) -> StoreResult<i64>;

    /// Increment the `(token, namespace)` counter and return the new value.
    ///
    /// The first call for a pair creates the counter and returns 0 without
    /// incrementing.
    ///
    /// # Errors
    /// `InvalidToken` if the base token does not exist.
    async fn increment_and_get_namespaced_token(
        &self,
        token: &str,
        namespace: &str,
    ) -> StoreResult<i64>;

    /// Release engine resources. No-op where there is nothing to release.
    async fn close(&self) -> StoreResult<()>;
}

/// Reject tokens that could alias another key.
///
/// Shared by every engine so the same input fails the same way everywhere.
pub(crate) fn validate_token(token: &str) -> StoreResult<()> {
    if token.is_empty() || token.contains(KEY_SEPARATOR) {
        return Err(StoreError::invalid_token(token));
    }
    Ok(())
}

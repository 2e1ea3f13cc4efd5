//! PostgresCounterStore - Transactional Relational Engine
//!
//! TigerStyle: Row-level locks serialize increments on the same key.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS counters (
//!     id TEXT PRIMARY KEY,
//!     count BIGINT NOT NULL DEFAULT 0
//! );
//! CREATE TABLE IF NOT EXISTS namespaced_counters (
//!     id BIGSERIAL PRIMARY KEY,
//!     token TEXT NOT NULL REFERENCES counters (id),
//!     namespace TEXT NOT NULL,
//!     count BIGINT NOT NULL DEFAULT 0,
//!     UNIQUE (token, namespace)
//! );
//! ```
//!
//! Every increment runs inside one transaction that takes the row lock
//! with `SELECT ... FOR UPDATE` before writing. A second transaction on
//! the same row blocks until the first commits or rolls back, then reads
//! the new value. Different rows proceed in parallel. Any failure after
//! `BEGIN` rolls back before the error is returned.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};

use super::backend::{validate_token, CounterStore};
use super::error::{StoreError, StoreResult};
use crate::constants::{
    PG_ACQUIRE_TIMEOUT_MS, PG_LOCK_TIMEOUT_MS, PG_POOL_CONNECTIONS_MAX, PG_STATEMENT_TIMEOUT_MS,
};

/// SQLSTATE unique_violation
const SQLSTATE_UNIQUE_VIOLATION: &str = "23505";

/// SQLSTATE foreign_key_violation
const SQLSTATE_FOREIGN_KEY_VIOLATION: &str = "23503";

type PgTransaction = Transaction<'static, Postgres>;

/// One statement per entry; prepared statements take a single command.
const SCHEMA_CREATE: [&str; 2] = [
    r#"
    CREATE TABLE IF NOT EXISTS counters (
        id TEXT PRIMARY KEY,
        count BIGINT NOT NULL DEFAULT 0
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS namespaced_counters (
        id BIGSERIAL PRIMARY KEY,
        token TEXT NOT NULL REFERENCES counters (id),
        namespace TEXT NOT NULL,
        count BIGINT NOT NULL DEFAULT 0,
        UNIQUE (token, namespace)
    )
    "#,
];

const SCHEMA_DROP: [&str; 2] = [
    "DROP TABLE IF EXISTS namespaced_counters",
    "DROP TABLE IF EXISTS counters",
];

// =============================================================================
// PostgresCounterStore
// =============================================================================

/// PostgreSQL counter store.
#[derive(Debug, Clone)]
pub struct PostgresCounterStore {
    pool: PgPool,
}

impl PostgresCounterStore {
    /// Connect with a `postgres://` or `postgresql://` URL.
    ///
    /// Query parameters are passed to the driver unmodified. Every session
    /// gets `lock_timeout` and `statement_timeout` so that no call blocks
    /// indefinitely on a held row lock.
    ///
    /// # Errors
    /// `StorageUnavailable` if the URL is empty or cannot be parsed, or the
    /// first connection cannot be established.
    pub async fn connect(connection_string: &str) -> StoreResult<Self> {
        if connection_string.is_empty() {
            return Err(StoreError::unavailable("empty postgres url"));
        }

        let options = PgConnectOptions::from_str(connection_string)
            .map_err(|e| StoreError::unavailable(format!("invalid postgres url: {e}")))?
            .options([
                ("lock_timeout", PG_LOCK_TIMEOUT_MS.to_string()),
                ("statement_timeout", PG_STATEMENT_TIMEOUT_MS.to_string()),
            ]);

        let pool = PgPoolOptions::new()
            .max_connections(PG_POOL_CONNECTIONS_MAX)
            .acquire_timeout(Duration::from_millis(PG_ACQUIRE_TIMEOUT_MS))
            .connect_with(options)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to connect to postgres");
                StoreError::unavailable(format!("failed to connect: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Get the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn begin(&self) -> StoreResult<PgTransaction> {
        self.pool
            .begin()
            .await
            .map_err(|e| classify(e, "", "begin transaction"))
    }
}

// =============================================================================
// Error Classification
// =============================================================================

/// Map a driver error onto the store taxonomy.
///
/// Constraint violations carry meaning; everything else (connection loss,
/// pool timeout, lock timeout, serialization failure, missing table) is a
/// back-end fault the caller cannot fix by changing the request.
fn classify(err: sqlx::Error, token: &str, op: &'static str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(SQLSTATE_UNIQUE_VIOLATION) => return StoreError::duplicate_token(token),
            Some(SQLSTATE_FOREIGN_KEY_VIOLATION) => return StoreError::invalid_token(token),
            _ => {}
        }
    }

    tracing::error!(error = %err, op, "postgres operation failed");
    StoreError::unavailable(format!("{op}: {err}"))
}

/// Commit on success, roll back on failure.
async fn finish<T>(tx: PgTransaction, result: StoreResult<T>) -> StoreResult<T> {
    match result {
        Ok(value) => {
            tx.commit()
                .await
                .map_err(|e| classify(e, "", "commit transaction"))?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                // The server discards the transaction when the session ends.
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

// =============================================================================
// Transaction Bodies
// =============================================================================

async fn increment_token_in(tx: &mut PgTransaction, token: &str) -> StoreResult<i64> {
    let current: Option<i64> =
        sqlx::query_scalar("SELECT count FROM counters WHERE id = $1 FOR UPDATE")
            .bind(token)
            .fetch_optional(&mut **tx)
            .await
            .map_err(|e| classify(e, token, "lock counter"))?;

    let Some(current) = current else {
        return Err(StoreError::invalid_token(token));
    };

    let count: i64 =
        sqlx::query_scalar("UPDATE counters SET count = count + 1 WHERE id = $1 RETURNING count")
            .bind(token)
            .fetch_one(&mut **tx)
            .await
            .map_err(|e| classify(e, token, "update counter"))?;

    // Postcondition: the row lock makes this exact
    assert_eq!(count, current + 1, "increment must add exactly one");

    Ok(count)
}

async fn lock_namespaced(
    tx: &mut PgTransaction,
    token: &str,
    namespace: &str,
) -> StoreResult<Option<i64>> {
    sqlx::query_scalar(
        r#"
        SELECT count FROM namespaced_counters
        WHERE token = $1 AND namespace = $2
        FOR UPDATE
        "#,
    )
    .bind(token)
    .bind(namespace)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| classify(e, token, "lock namespaced counter"))
}

async fn bump_namespaced(
    tx: &mut PgTransaction,
    token: &str,
    namespace: &str,
    current: i64,
) -> StoreResult<i64> {
    let next = current + 1;

    sqlx::query(
        r#"
        UPDATE namespaced_counters SET count = $3
        WHERE token = $1 AND namespace = $2
        "#,
    )
    .bind(token)
    .bind(namespace)
    .bind(next)
    .execute(&mut **tx)
    .await
    .map_err(|e| classify(e, token, "update namespaced counter"))?;

    Ok(next)
}

async fn increment_namespaced_in(
    tx: &mut PgTransaction,
    token: &str,
    namespace: &str,
) -> StoreResult<i64> {
    if let Some(current) = lock_namespaced(tx, token, namespace).await? {
        return bump_namespaced(tx, token, namespace, current).await;
    }

    // First touch: the parent counter must exist. FOR SHARE keeps it in
    // place until this transaction ends.
    let parent: Option<i32> = sqlx::query_scalar("SELECT 1 FROM counters WHERE id = $1 FOR SHARE")
        .bind(token)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| classify(e, token, "check parent counter"))?;

    if parent.is_none() {
        return Err(StoreError::invalid_token(token));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO namespaced_counters (token, namespace, count)
        VALUES ($1, $2, 0)
        ON CONFLICT (token, namespace) DO NOTHING
        "#,
    )
    .bind(token)
    .bind(namespace)
    .execute(&mut **tx)
    .await
    .map_err(|e| classify(e, token, "create namespaced counter"))?
    .rows_affected();

    if inserted == 1 {
        tracing::debug!(token = %token, namespace = %namespace, "created namespaced counter");
        return Ok(0);
    }

    // A concurrent first touch committed the row between our read and insert.
    let current = lock_namespaced(tx, token, namespace)
        .await?
        .ok_or_else(|| StoreError::unavailable("namespaced counter vanished after conflict"))?;
    bump_namespaced(tx, token, namespace, current).await
}

// =============================================================================
// CounterStore Implementation
// =============================================================================

#[async_trait]
impl CounterStore for PostgresCounterStore {
    async fn create_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA_CREATE {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| classify(e, "", "create schema"))?;
        }

        tracing::info!("postgres schema ready");
        Ok(())
    }

    async fn drop_schema(&self) -> StoreResult<()> {
        // Children first; the foreign key pins the parent table.
        for statement in SCHEMA_DROP {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| classify(e, "", "drop schema"))?;
        }

        tracing::info!("postgres schema dropped");
        Ok(())
    }

    async fn create_token(&self, token: &str) -> StoreResult<()> {
        validate_token(token)?;

        sqlx::query("INSERT INTO counters (id, count) VALUES ($1, 0)")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| classify(e, token, "create counter"))?;

        tracing::debug!(token = %token, "created counter");
        Ok(())
    }

    async fn increment_and_get_token(&self, token: &str) -> StoreResult<i64> {
        validate_token(token)?;

        let mut tx = self.begin().await?;
        let result = increment_token_in(&mut tx, token).await;
        finish(tx, result).await
    }

    async fn increment_and_get_namespaced_token(
        &self,
        token: &str,
        namespace: &str,
    ) -> StoreResult<i64> {
        validate_token(token)?;

        let mut tx = self.begin().await?;
        let result = increment_namespaced_in(&mut tx, token, namespace).await;
        finish(tx, result).await
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

// =============================================================================
// Tests (require running Postgres)
// =============================================================================

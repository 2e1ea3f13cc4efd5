//! Inc - Token-Based Counters
//!
//! TigerStyle: Clients create an opaque token, then increment it (or a
//! namespace under it) and read back the new count.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  HTTP API (axum)         │ thin glue        │
//! ├─────────────────────────────────────────────┤
//! │  Store Factory           │ scheme dispatch  │
//! ├─────────────────────────────────────────────┤
//! │  CounterStore trait                          │
//! │   memory │ postgres │ redis                  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use inc::store::{self, CounterStore};
//!
//! # tokio_test::block_on(async {
//! let store = store::open("memory://").await?;
//! store.create_schema().await?;
//! store.create_token("t1").await?;
//! assert_eq!(store.increment_and_get_token("t1").await?, 1);
//! assert_eq!(store.increment_and_get_namespaced_token("t1", "v1").await?, 0);
//! # Ok::<(), inc::store::StoreError>(())
//! # }).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod api;
pub mod config;
pub mod constants;
pub mod metrics;
pub mod store;
pub mod token;

// Re-export common types
pub use config::{ConfigError, MetricsSink, ServiceConfig};
pub use store::{Backend, BackendKind, CounterStore, StoreError, StoreResult};
pub use token::{Token, TokenError};

/// Application name
pub const APP_NAME: &str = "inc";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

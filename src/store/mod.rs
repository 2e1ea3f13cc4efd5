//! Store - Counter Store Trait and Engines
//!
//! TigerStyle: One contract, three structurally different engines.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    CounterStore Trait                        │
//! └─────────────────────────────────────────────────────────────┘
//!          ↑                    ↑                    ↑
//!          │                    │                    │
//! ┌────────┴────────┐  ┌────────┴────────┐  ┌───────┴────────┐
//! │ MemoryCounter   │  │ PostgresCounter │  │ RedisCounter   │
//! │ (single mutex)  │  │ (row locks)     │  │ (atomic INCR)  │
//! └─────────────────┘  └─────────────────┘  └────────────────┘
//!          ↑                    ↑                    ↑
//!          └────────────── factory::open ────────────┘
//! ```

mod backend;
mod error;
pub mod factory;
mod memory;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "redis")]
mod redis;

pub use backend::CounterStore;
pub use error::{StoreError, StoreResult};
pub use factory::{open, Backend, BackendKind};
pub use memory::MemoryCounterStore;

#[cfg(feature = "postgres")]
pub use self::postgres::PostgresCounterStore;

#[cfg(feature = "redis")]
pub use self::redis::RedisCounterStore;

//! HTTP API
//!
//! TigerStyle: Thin glue. Every route is one store call.
//!
//! ```text
//! GET  /healthcheck            -> "OK"
//! POST /new                    -> 201 {token}
//! PUT  /{token}                -> {count}
//! PUT  /{token}/{namespace...} -> {count}
//! ```

mod error;
mod handlers;
mod logging;

use std::sync::Arc;

use axum::routing::{get, post, put};
use axum::Router;

use crate::metrics::MetricsCollector;
use crate::store::Backend;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The one store handle for the process
    pub store: Backend,
    /// Request counters
    pub metrics: Arc<dyn MetricsCollector>,
}

impl AppState {
    /// Create handler state.
    pub fn new(store: Backend, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self { store, metrics }
    }
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(handlers::healthcheck))
        .route("/new", post(handlers::new_token))
        .route("/:token", put(handlers::increment_token))
        .route("/:token/*namespace", put(handlers::increment_namespaced_token))
        .layer(axum::middleware::from_fn(logging::log_requests))
        .with_state(state)
}

//! Route handlers

use axum::extract::{Path, State};
use axum::http::StatusCode;

use super::{ApiError, AppState};
use crate::metrics::{METRIC_CREATE_TOKEN, METRIC_INCREMENT_NAMESPACE_TOKEN, METRIC_INCREMENT_TOKEN};
use crate::store::CounterStore;
use crate::token::Token;

pub async fn healthcheck() -> &'static str {
    "OK"
}

pub async fn new_token(State(state): State<AppState>) -> Result<(StatusCode, String), ApiError> {
    state.metrics.increment(METRIC_CREATE_TOKEN);

    let token = Token::generate()?;
    state.store.create_token(token.as_str()).await?;

    tracing::info!(token = %token, "issued token");
    Ok((StatusCode::CREATED, token.into_string()))
}

pub async fn increment_token(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<String, ApiError> {
    state.metrics.increment(METRIC_INCREMENT_TOKEN);

    if !Token::is_well_formed(&token) {
        return Err(ApiError::NotFound);
    }

    let count = state.store.increment_and_get_token(&token).await?;
    Ok(count.to_string())
}

pub async fn increment_namespaced_token(
    State(state): State<AppState>,
    Path((token, namespace)): Path<(String, String)>,
) -> Result<String, ApiError> {
    state.metrics.increment(METRIC_INCREMENT_NAMESPACE_TOKEN);

    if !Token::is_well_formed(&token) || namespace.is_empty() {
        return Err(ApiError::NotFound);
    }

    let count = state
        .store
        .increment_and_get_namespaced_token(&token, &namespace)
        .await?;
    Ok(count.to_string())
}

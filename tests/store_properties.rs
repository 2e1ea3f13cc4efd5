//! Counter store properties, checked against every engine.
//!
//! The in-memory engine always runs. Postgres and Redis run when
//! `TEST_POSTGRES_URL` / `TEST_REDIS_URL` are set; otherwise those tests
//! print a skip notice and return.

use std::collections::HashSet;
use std::env;

use futures::future::join_all;
use inc::store::{self, Backend, CounterStore, MemoryCounterStore, StoreError};
use inc::Token;

// =============================================================================
// Helper Functions
// =============================================================================

fn new_token() -> String {
    Token::generate().unwrap().into_string()
}

async fn fresh<S: CounterStore>(store: &S) {
    store.drop_schema().await.unwrap();
    store.create_schema().await.unwrap();
}

// =============================================================================
// Properties
// =============================================================================

async fn increments_by_one<S: CounterStore>(store: &S) {
    let token = new_token();
    store.create_token(&token).await.unwrap();

    for expected in 1..=10 {
        assert_eq!(store.increment_and_get_token(&token).await.unwrap(), expected);
    }
}

async fn missing_token_is_invalid<S: CounterStore>(store: &S) {
    let token = new_token();

    let result = store.increment_and_get_token(&token).await;
    assert!(matches!(result, Err(StoreError::InvalidToken(_))));

    // No counter was created as a side effect
    let result = store.increment_and_get_token(&token).await;
    assert!(matches!(result, Err(StoreError::InvalidToken(_))));

    // The token is still free to create, starting from zero
    store.create_token(&token).await.unwrap();
    assert_eq!(store.increment_and_get_token(&token).await.unwrap(), 1);
}

async fn namespaces_are_isolated<S: CounterStore>(store: &S) {
    let token = new_token();
    store.create_token(&token).await.unwrap();

    assert_eq!(store.increment_and_get_namespaced_token(&token, "n1").await.unwrap(), 0);
    assert_eq!(store.increment_and_get_namespaced_token(&token, "n1").await.unwrap(), 1);
    assert_eq!(store.increment_and_get_namespaced_token(&token, "n2").await.unwrap(), 0);
    assert_eq!(store.increment_and_get_namespaced_token(&token, "n1").await.unwrap(), 2);

    // Base counter untouched by namespace traffic
    assert_eq!(store.increment_and_get_token(&token).await.unwrap(), 1);

    // Same namespace under another token is independent
    let other = new_token();
    store.create_token(&other).await.unwrap();
    assert_eq!(store.increment_and_get_namespaced_token(&other, "n1").await.unwrap(), 0);
}

async fn namespace_on_missing_token_is_invalid<S: CounterStore>(store: &S) {
    let token = new_token();

    for namespace in ["v1", "v2", "a/b", "with:colon", ""] {
        let result = store.increment_and_get_namespaced_token(&token, namespace).await;
        assert!(
            matches!(result, Err(StoreError::InvalidToken(_))),
            "namespace {namespace:?}"
        );
    }
}

async fn duplicate_create_is_rejected<S: CounterStore>(store: &S) {
    let token = new_token();
    store.create_token(&token).await.unwrap();
    store.increment_and_get_token(&token).await.unwrap();

    let result = store.create_token(&token).await;
    assert!(matches!(result, Err(StoreError::DuplicateToken(_))));

    // Existing count survives the collision
    assert_eq!(store.increment_and_get_token(&token).await.unwrap(), 2);
}

async fn scenario<S: CounterStore>(store: &S) {
    let t1 = new_token();
    store.create_token(&t1).await.unwrap();

    assert_eq!(store.increment_and_get_token(&t1).await.unwrap(), 1);
    assert_eq!(store.increment_and_get_token(&t1).await.unwrap(), 2);
    assert_eq!(store.increment_and_get_namespaced_token(&t1, "v1").await.unwrap(), 0);
    assert_eq!(store.increment_and_get_namespaced_token(&t1, "v1").await.unwrap(), 1);
    assert_eq!(store.increment_and_get_namespaced_token(&t1, "v2").await.unwrap(), 0);

    let result = store.increment_and_get_token("unknown").await;
    assert!(matches!(result, Err(StoreError::InvalidToken(_))));
}

async fn drop_then_create_is_empty<S: CounterStore>(store: &S) {
    let token = new_token();
    store.create_token(&token).await.unwrap();
    store.increment_and_get_namespaced_token(&token, "v1").await.unwrap();

    store.drop_schema().await.unwrap();
    store.create_schema().await.unwrap();

    let result = store.increment_and_get_token(&token).await;
    assert!(matches!(result, Err(StoreError::InvalidToken(_))));
    let result = store.increment_and_get_namespaced_token(&token, "v1").await;
    assert!(matches!(result, Err(StoreError::InvalidToken(_))));

    // Recreated token starts over, namespace included
    store.create_token(&token).await.unwrap();
    assert_eq!(store.increment_and_get_namespaced_token(&token, "v1").await.unwrap(), 0);
}

async fn concurrent_increments_are_serializable<S>(store: &S, tasks: usize)
where
    S: CounterStore + Clone + 'static,
{
    let token = new_token();
    store.create_token(&token).await.unwrap();

    let handles = (0..tasks).map(|_| {
        let store = store.clone();
        let token = token.clone();
        tokio::spawn(async move { store.increment_and_get_token(&token).await })
    });

    let values: Vec<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let seen: HashSet<i64> = values.iter().copied().collect();
    let expected: HashSet<i64> = (1..=tasks as i64).collect();
    assert_eq!(seen.len(), tasks, "duplicate values observed: {values:?}");
    assert_eq!(seen, expected);

    assert_eq!(
        store.increment_and_get_token(&token).await.unwrap(),
        tasks as i64 + 1
    );
}

async fn concurrent_namespaced_increments_are_serializable<S>(store: &S, tasks: usize)
where
    S: CounterStore + Clone + 'static,
{
    let token = new_token();
    store.create_token(&token).await.unwrap();

    // Every task races on the first touch as well
    let handles = (0..tasks).map(|_| {
        let store = store.clone();
        let token = token.clone();
        tokio::spawn(async move { store.increment_and_get_namespaced_token(&token, "hot").await })
    });

    let seen: HashSet<i64> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    let expected: HashSet<i64> = (0..tasks as i64).collect();
    assert_eq!(seen, expected);
}

async fn run_suite<S>(store: &S, tasks: usize)
where
    S: CounterStore + Clone + 'static,
{
    fresh(store).await;
    increments_by_one(store).await;
    missing_token_is_invalid(store).await;
    namespaces_are_isolated(store).await;
    namespace_on_missing_token_is_invalid(store).await;
    duplicate_create_is_rejected(store).await;
    scenario(store).await;
    concurrent_increments_are_serializable(store, tasks).await;
    concurrent_namespaced_increments_are_serializable(store, tasks).await;
    drop_then_create_is_empty(store).await;
}

// =============================================================================
// In-Memory Engine
// =============================================================================

async fn memory_store() -> MemoryCounterStore {
    let store = MemoryCounterStore::new();
    store.create_schema().await.unwrap();
    store
}

#[tokio::test]
async fn test_memory_increments_by_one() {
    increments_by_one(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_missing_token_is_invalid() {
    missing_token_is_invalid(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_namespaces_are_isolated() {
    namespaces_are_isolated(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_namespace_on_missing_token_is_invalid() {
    namespace_on_missing_token_is_invalid(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_duplicate_create_is_rejected() {
    duplicate_create_is_rejected(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_scenario() {
    scenario(&memory_store().await).await;
}

#[tokio::test]
async fn test_memory_drop_then_create_is_empty() {
    let store = memory_store().await;
    drop_then_create_is_empty(&store).await;

    store.drop_schema().await.unwrap();
    store.create_schema().await.unwrap();
    assert_eq!(store.token_count().await, 0);
    assert_eq!(store.namespaced_count().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_increments() {
    concurrent_increments_are_serializable(&memory_store().await, 200).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_concurrent_namespaced_increments() {
    concurrent_namespaced_increments_are_serializable(&memory_store().await, 200).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_memory_full_suite_through_factory() {
    let backend = store::open("memory://").await.unwrap();
    run_suite(&backend, 100).await;
    backend.close().await.unwrap();
}

// =============================================================================
// External Engines
// =============================================================================

async fn external_backend(var: &str) -> Option<Backend> {
    match env::var(var) {
        Ok(url) => Some(store::open(&url).await.unwrap()),
        Err(_) => {
            eprintln!("Skipping test: {var} not set");
            None
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_postgres_full_suite() {
    let Some(backend) = external_backend("TEST_POSTGRES_URL").await else {
        return;
    };
    run_suite(&backend, 50).await;
    backend.close().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_redis_full_suite() {
    let Some(backend) = external_backend("TEST_REDIS_URL").await else {
        return;
    };
    run_suite(&backend, 50).await;
    backend.close().await.unwrap();
}

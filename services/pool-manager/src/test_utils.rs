//! Test utilities for driving the router and managers
//!
//! Helpers for building test state and sending requests through the router
//! without binding a socket.

use crate::api::{AppState, build_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use pool_core::{Allocation, ResourcePool};
use pool_store::{KeyOf, MemoryStore, PoolSnapshot, PoolStore, StoreError};
use serde_json::Value;
use tower::ServiceExt;

/// Helper to create in-memory state with the default retry bound
pub fn test_state() -> AppState {
    AppState::in_memory(3)
}

/// Helper to create a router mounted under `/api/v1`
pub fn test_router() -> Router {
    build_router(test_state(), "/api/v1")
}

/// Send one request and return the status and the JSON body (`Null` when empty).
///
/// Panics when a non-empty body is not JSON.
pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = router.clone().oneshot(request).await.expect("Router failed");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to read body")
        .to_bytes();

    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            panic!(
                "Response body is not JSON ({e}): {}",
                String::from_utf8_lossy(&bytes)
            )
        })
    };
    (status, json)
}

/// Store whose pools vanish as soon as an allocation is committed, as if a
/// delete landed right behind the commit
pub struct VanishingStore<P: ResourcePool> {
    inner: MemoryStore<P>,
}

impl<P: ResourcePool> VanishingStore<P> {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
        }
    }
}

#[async_trait::async_trait]
impl<P: ResourcePool> PoolStore<P> for VanishingStore<P> {
    async fn insert_pool(&self, pool: P) -> Result<(), StoreError> {
        self.inner.insert_pool(pool).await
    }

    async fn get_pool(&self, name: &str) -> Result<P, StoreError> {
        self.inner.get_pool(name).await
    }

    async fn list_pools(&self) -> Result<Vec<P>, StoreError> {
        self.inner.list_pools().await
    }

    async fn delete_pool(&self, name: &str) -> Result<usize, StoreError> {
        self.inner.delete_pool(name).await
    }

    async fn snapshot(&self, name: &str) -> Result<PoolSnapshot<P>, StoreError> {
        self.inner.snapshot(name).await
    }

    async fn commit_allocation(
        &self,
        pool: &P,
        allocation: Allocation<P::Resource>,
    ) -> Result<Allocation<P::Resource>, StoreError> {
        let committed = self.inner.commit_allocation(pool, allocation).await?;
        self.inner.delete_pool(pool.name()).await?;
        Ok(committed)
    }

    async fn release_allocation(
        &self,
        name: &str,
        key: &KeyOf<P>,
        now: DateTime<Utc>,
    ) -> Result<Allocation<P::Resource>, StoreError> {
        self.inner.release_allocation(name, key, now).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    #[should_panic(expected = "Response body is not JSON")]
    async fn test_send_rejects_non_json_body() {
        let router = test_router();
        // Missing `name`: the JSON extractor answers with plain text
        send(
            &router,
            Method::POST,
            "/api/v1/ip-pools",
            Some(json!({ "cidr": "10.0.0.0/24" })),
        )
        .await;
    }
}

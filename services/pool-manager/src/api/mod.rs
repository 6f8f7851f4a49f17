//! REST API for the Pool Manager.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Service banner |
//! | GET | `/health` | Health check |
//! | POST | `{prefix}/ip-pools` | Create an address pool |
//! | GET | `{prefix}/ip-pools` | List address pools with statistics |
//! | GET | `{prefix}/ip-pools/{name}` | Pool detail with live allocations |
//! | DELETE | `{prefix}/ip-pools/{name}` | Delete a pool and its allocations |
//! | POST | `{prefix}/ip-pools/{name}/allocate` | Allocate a block |
//! | POST | `{prefix}/ip-pools/{name}/release` | Release a block |
//! | GET | `{prefix}/ip-pools/{name}/allocations` | Live allocations |
//! | ... | `{prefix}/rtrd-pools/...` | Same shape for RT/RD value pools |

pub mod address_pools;
pub mod value_pools;

use crate::manager::PoolManager;
use axum::routing::{get, post};
use axum::{Json, Router};
use pool_core::{AddressPool, ValuePool};
use pool_store::MemoryStore;
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state for API handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// IPv4/IPv6 block pools
    pub address_pools: Arc<PoolManager<AddressPool>>,
    /// RT/RD value pools
    pub value_pools: Arc<PoolManager<ValuePool>>,
}

impl AppState {
    /// State backed by in-memory stores.
    pub fn in_memory(commit_attempts: u32) -> Self {
        Self {
            address_pools: Arc::new(PoolManager::new(
                Arc::new(MemoryStore::<AddressPool>::new()),
                commit_attempts,
            )),
            value_pools: Arc::new(PoolManager::new(
                Arc::new(MemoryStore::<ValuePool>::new()),
                commit_attempts,
            )),
        }
    }
}

/// Response of `release` endpoints.
#[derive(Debug, Serialize)]
pub struct ReleaseResponse<T> {
    /// Human-readable confirmation
    pub message: String,
    /// The allocation as it is after the release
    pub allocation: T,
}

/// Response of `allocations` endpoints.
#[derive(Debug, Serialize)]
pub struct AllocationListResponse<T> {
    pub pool_name: String,
    pub total_allocations: usize,
    pub allocations: Vec<T>,
}

/// Build the complete API router.
///
/// `api_prefix` is either empty or starts with `/` and has no trailing `/`.
pub fn build_router(state: AppState, api_prefix: &str) -> Router {
    let api_routes = Router::new()
        .route(
            "/ip-pools",
            get(address_pools::list_pools).post(address_pools::create_pool),
        )
        .route(
            "/ip-pools/{name}",
            get(address_pools::get_pool).delete(address_pools::delete_pool),
        )
        .route("/ip-pools/{name}/allocate", post(address_pools::allocate))
        .route("/ip-pools/{name}/release", post(address_pools::release))
        .route("/ip-pools/{name}/allocations", get(address_pools::list_allocations))
        .route(
            "/rtrd-pools",
            get(value_pools::list_pools).post(value_pools::create_pool),
        )
        .route(
            "/rtrd-pools/{name}",
            get(value_pools::get_pool).delete(value_pools::delete_pool),
        )
        .route("/rtrd-pools/{name}/allocate", post(value_pools::allocate))
        .route("/rtrd-pools/{name}/release", post(value_pools::release))
        .route("/rtrd-pools/{name}/allocations", get(value_pools::list_allocations))
        .with_state(state);

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health));

    let router = if api_prefix.is_empty() {
        router.merge(api_routes)
    } else {
        router.nest(api_prefix, api_routes)
    };

    router.layer(TraceLayer::new_for_http())
}

/// GET /
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "Network Resource Pool Manager",
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

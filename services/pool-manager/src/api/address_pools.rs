//! Address pool handlers.
//!
//! Address counts are rendered as decimal strings: an IPv6 /64 holds 2^64
//! addresses, more than a JSON number reliably carries. Allocated blocks list
//! their addresses only up to [`MAX_LISTED_ADDRESSES`].

use super::{AllocationListResponse, AppState, ReleaseResponse};
use crate::error::ServiceError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use pool_core::{
    AddressBlock, AddressFamily, AddressPool, Allocation, AllocationMeta, AllocationStatus,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Largest block whose addresses are listed in `ip_addresses`
pub const MAX_LISTED_ADDRESSES: u128 = 256;

/// Create request body.
#[derive(Debug, Deserialize)]
pub struct CreateAddressPoolRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Optional; must match the CIDR when given
    #[serde(default)]
    pub pool_type: Option<AddressFamily>,
    pub cidr: String,
}

/// Pool with statistics.
#[derive(Debug, Serialize)]
pub struct AddressPoolResponse {
    pub name: String,
    pub description: Option<String>,
    pub pool_type: AddressFamily,
    pub cidr: String,
    pub network_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_address: Option<String>,
    pub total_addresses: String,
    pub usable_addresses: String,
    pub allocated_count: String,
    pub available_count: String,
    pub created_at: DateTime<Utc>,
}

/// Pool with statistics and live allocations.
#[derive(Debug, Serialize)]
pub struct AddressPoolDetail {
    #[serde(flatten)]
    pub pool: AddressPoolResponse,
    pub allocations: Vec<BlockAllocationResponse>,
}

/// Allocate request body.
#[derive(Debug, Deserialize)]
pub struct AllocateBlockRequest {
    pub prefix_length: u8,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allocated_to: Option<String>,
}

/// Release request body.
#[derive(Debug, Deserialize)]
pub struct ReleaseBlockRequest {
    pub allocated_cidr: String,
}

/// An allocated block. IPv6 blocks carry neither `subnet_mask` nor
/// `broadcast_address`.
#[derive(Debug, Serialize)]
pub struct BlockAllocationResponse {
    pub id: Uuid,
    pub allocated_cidr: String,
    pub network_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub broadcast_address: Option<String>,
    pub last_address: String,
    /// Every address of the block; omitted above [`MAX_LISTED_ADDRESSES`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_addresses: Option<Vec<String>>,
    pub block_size: String,
    pub pool_name: String,
    pub pool_type: AddressFamily,
    pub pool_cidr: String,
    pub prefix_length: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<String>,
    pub description: Option<String>,
    pub allocated_to: Option<String>,
    pub status: AllocationStatus,
    pub allocated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

impl BlockAllocationResponse {
    fn new(allocation: Allocation<AddressBlock>, pool: &AddressPool) -> Self {
        let block = &allocation.resource;
        Self {
            id: allocation.id,
            allocated_cidr: block.to_string(),
            network_address: block.network_address().to_string(),
            broadcast_address: block.broadcast_address().map(|a| a.to_string()),
            last_address: block.last_address().to_string(),
            ip_addresses: block
                .addresses(MAX_LISTED_ADDRESSES)
                .map(|addrs| addrs.iter().map(ToString::to_string).collect()),
            block_size: block.address_count().to_string(),
            pool_name: pool.name.clone(),
            pool_type: pool.family,
            pool_cidr: pool.cidr.to_string(),
            prefix_length: block.prefix_len(),
            subnet_mask: block.subnet_mask().map(|m| m.to_string()),
            description: allocation.description,
            allocated_to: allocation.allocated_to,
            status: allocation.status,
            allocated_at: allocation.allocated_at,
            released_at: allocation.released_at,
        }
    }
}

fn pool_response<'a>(
    pool: &AddressPool,
    live: impl IntoIterator<Item = &'a Allocation<AddressBlock>>,
) -> AddressPoolResponse {
    let stats = pool.statistics(live.into_iter().map(|a| &a.resource));
    let total = stats.total_addresses.to_string();
    AddressPoolResponse {
        name: pool.name.clone(),
        description: pool.description.clone(),
        pool_type: pool.family,
        cidr: pool.cidr.to_string(),
        network_address: pool.cidr.network_address().to_string(),
        broadcast_address: pool.cidr.broadcast_address().map(|a| a.to_string()),
        usable_addresses: total.clone(),
        total_addresses: total,
        allocated_count: stats.allocated_addresses.to_string(),
        available_count: stats.available_addresses.to_string(),
        created_at: pool.created_at,
    }
}

/// POST /ip-pools
pub async fn create_pool(
    State(state): State<AppState>,
    Json(req): Json<CreateAddressPoolRequest>,
) -> Result<(StatusCode, Json<AddressPoolResponse>), ServiceError> {
    let pool = AddressPool::new(req.name, &req.cidr, req.pool_type, req.description, Utc::now())?;
    let pool = state.address_pools.create_pool(pool).await?;
    Ok((StatusCode::CREATED, Json(pool_response(&pool, []))))
}

/// GET /ip-pools
pub async fn list_pools(
    State(state): State<AppState>,
) -> Result<Json<Vec<AddressPoolResponse>>, ServiceError> {
    let mut pools = Vec::new();
    for pool in state.address_pools.list_pools().await? {
        // Deleted between list and snapshot
        let Ok(snapshot) = state.address_pools.snapshot(&pool.name).await else {
            continue;
        };
        pools.push(pool_response(&snapshot.pool, snapshot.live()));
    }
    Ok(Json(pools))
}

/// GET /ip-pools/{name}
pub async fn get_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AddressPoolDetail>, ServiceError> {
    let snapshot = state.address_pools.snapshot(&name).await?;
    let pool = pool_response(&snapshot.pool, snapshot.live());
    let allocations = snapshot
        .live()
        .cloned()
        .map(|a| BlockAllocationResponse::new(a, &snapshot.pool))
        .collect();
    Ok(Json(AddressPoolDetail { pool, allocations }))
}

/// DELETE /ip-pools/{name}
pub async fn delete_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.address_pools.delete_pool(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /ip-pools/{name}/allocate
pub async fn allocate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<AllocateBlockRequest>,
) -> Result<Json<BlockAllocationResponse>, ServiceError> {
    let meta = AllocationMeta {
        description: req.description,
        allocated_to: req.allocated_to,
    };
    let (allocation, pool) = state
        .address_pools
        .allocate(&name, &req.prefix_length, meta)
        .await?;
    Ok(Json(BlockAllocationResponse::new(allocation, &pool)))
}

/// POST /ip-pools/{name}/release
pub async fn release(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReleaseBlockRequest>,
) -> Result<Json<ReleaseResponse<BlockAllocationResponse>>, ServiceError> {
    let (released, pool) = state
        .address_pools
        .release(&name, &req.allocated_cidr)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => ServiceError::NotFound(format!(
                "Block '{}' not found or already released",
                req.allocated_cidr
            )),
            other => other,
        })?;
    Ok(Json(ReleaseResponse {
        message: format!("Block '{}' released successfully", released.resource),
        allocation: BlockAllocationResponse::new(released, &pool),
    }))
}

/// GET /ip-pools/{name}/allocations
pub async fn list_allocations(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AllocationListResponse<BlockAllocationResponse>>, ServiceError> {
    let snapshot = state.address_pools.snapshot(&name).await?;
    let allocations: Vec<_> = snapshot
        .live()
        .cloned()
        .map(|a| BlockAllocationResponse::new(a, &snapshot.pool))
        .collect();
    Ok(Json(AllocationListResponse {
        pool_name: name,
        total_allocations: allocations.len(),
        allocations,
    }))
}

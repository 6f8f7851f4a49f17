//! RT/RD value pool handlers.

use super::{AllocationListResponse, AppState, ReleaseResponse};
use crate::error::ServiceError;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use pool_core::{
    Allocation, AllocationMeta, AllocationStatus, RouteValue, ValueFormat, ValueKind, ValuePool,
    ValuePoolSpec,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Create request body.
#[derive(Debug, Deserialize)]
pub struct CreateValuePoolRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub pool_type: ValueKind,
    pub format_type: ValueFormat,
    pub admin_value: String,
    pub range_start: u64,
    pub range_end: u64,
}

impl From<CreateValuePoolRequest> for ValuePoolSpec {
    fn from(req: CreateValuePoolRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            kind: req.pool_type,
            format: req.format_type,
            admin_value: req.admin_value,
            range_start: req.range_start,
            range_end: req.range_end,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ValuePoolResponse {
    pub name: String,
    pub description: Option<String>,
    pub pool_type: ValueKind,
    pub format_type: ValueFormat,
    pub admin_value: String,
    pub format_display: String,
    pub range_start: u32,
    pub range_end: u32,
    pub total_values: u64,
    pub allocated_count: u64,
    pub available_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ValuePoolDetail {
    #[serde(flatten)]
    pub pool: ValuePoolResponse,
    pub allocations: Vec<ValueAllocationResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AllocateValueRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allocated_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseValueRequest {
    /// `admin:number`
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct ValueAllocationResponse {
    pub id: Uuid,
    /// `admin:number`
    pub value: String,
    pub pool_name: String,
    pub pool_type: ValueKind,
    pub description: Option<String>,
    pub allocated_to: Option<String>,
    pub status: AllocationStatus,
    pub allocated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

impl ValueAllocationResponse {
    fn new(allocation: Allocation<RouteValue>, pool: &ValuePool) -> Self {
        Self {
            id: allocation.id,
            value: allocation.resource.to_string(),
            pool_name: pool.name.clone(),
            pool_type: pool.kind,
            description: allocation.description,
            allocated_to: allocation.allocated_to,
            status: allocation.status,
            allocated_at: allocation.allocated_at,
            released_at: allocation.released_at,
        }
    }
}

fn pool_response<'a>(
    pool: &ValuePool,
    live: impl IntoIterator<Item = &'a Allocation<RouteValue>>,
) -> ValuePoolResponse {
    let stats = pool.statistics(live.into_iter().map(|a| &a.resource));
    ValuePoolResponse {
        name: pool.name.clone(),
        description: pool.description.clone(),
        pool_type: pool.kind,
        format_type: pool.format,
        admin_value: pool.admin_value.clone(),
        format_display: stats.format_display,
        range_start: pool.range_start,
        range_end: pool.range_end,
        total_values: stats.total_values,
        allocated_count: stats.allocated_count,
        available_count: stats.available_count,
        created_at: pool.created_at,
    }
}

/// POST /rtrd-pools
pub async fn create_pool(
    State(state): State<AppState>,
    Json(req): Json<CreateValuePoolRequest>,
) -> Result<(StatusCode, Json<ValuePoolResponse>), ServiceError> {
    let pool = ValuePool::new(req.into(), Utc::now())?;
    let pool = state.value_pools.create_pool(pool).await?;
    Ok((StatusCode::CREATED, Json(pool_response(&pool, []))))
}

/// GET /rtrd-pools
pub async fn list_pools(
    State(state): State<AppState>,
) -> Result<Json<Vec<ValuePoolResponse>>, ServiceError> {
    let mut pools = Vec::new();
    for pool in state.value_pools.list_pools().await? {
        let Ok(snapshot) = state.value_pools.snapshot(&pool.name).await else {
            continue;
        };
        pools.push(pool_response(&snapshot.pool, snapshot.live()));
    }
    Ok(Json(pools))
}

/// GET /rtrd-pools/{name}
pub async fn get_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ValuePoolDetail>, ServiceError> {
    let snapshot = state.value_pools.snapshot(&name).await?;
    let pool = pool_response(&snapshot.pool, snapshot.live());
    let allocations = snapshot
        .live()
        .cloned()
        .map(|a| ValueAllocationResponse::new(a, &snapshot.pool))
        .collect();
    Ok(Json(ValuePoolDetail { pool, allocations }))
}

/// DELETE /rtrd-pools/{name}
pub async fn delete_pool(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode, ServiceError> {
    state.value_pools.delete_pool(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /rtrd-pools/{name}/allocate
///
/// The body is optional; an empty request allocates without metadata.
pub async fn allocate(
    State(state): State<AppState>,
    Path(name): Path<String>,
    req: Option<Json<AllocateValueRequest>>,
) -> Result<Json<ValueAllocationResponse>, ServiceError> {
    let req = req.map(|Json(req)| req).unwrap_or_default();
    let meta = AllocationMeta {
        description: req.description,
        allocated_to: req.allocated_to,
    };
    let (allocation, pool) = state.value_pools.allocate(&name, &(), meta).await?;
    Ok(Json(ValueAllocationResponse::new(allocation, &pool)))
}

/// POST /rtrd-pools/{name}/release
pub async fn release(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<ReleaseValueRequest>,
) -> Result<Json<ReleaseResponse<ValueAllocationResponse>>, ServiceError> {
    let (released, pool) = state
        .value_pools
        .release(&name, &req.value)
        .await
        .map_err(|e| match e {
            ServiceError::NotFound(_) => {
                ServiceError::NotFound(format!("Value '{}' not found or already released", req.value))
            }
            other => other,
        })?;
    Ok(Json(ReleaseResponse {
        message: format!("Value '{}' released successfully", released.resource),
        allocation: ValueAllocationResponse::new(released, &pool),
    }))
}

/// GET /rtrd-pools/{name}/allocations
pub async fn list_allocations(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<AllocationListResponse<ValueAllocationResponse>>, ServiceError> {
    let snapshot = state.value_pools.snapshot(&name).await?;
    let allocations: Vec<_> = snapshot
        .live()
        .cloned()
        .map(|a| ValueAllocationResponse::new(a, &snapshot.pool))
        .collect();
    Ok(Json(AllocationListResponse {
        pool_name: name,
        total_allocations: allocations.len(),
        allocations,
    }))
}

#[cfg(test)]
mod tests {
    use crate::manager::PoolManager;
    use crate::test_utils::*;
    use axum::http::{Method, StatusCode};
    use pool_core::ValuePool;
    use serde_json::{Value, json};
    use std::sync::Arc;

    async fn create(router: &axum::Router, body: Value) -> (StatusCode, Value) {
        send(router, Method::POST, "/api/v1/rtrd-pools", Some(body)).await
    }

    async fn allocate(router: &axum::Router, name: &str) -> (StatusCode, Value) {
        send(
            router,
            Method::POST,
            &format!("/api/v1/rtrd-pools/{name}/allocate"),
            Some(json!({ "description": "vrf blue" })),
        )
        .await
    }

    fn type0_pool(name: &str, start: u64, end: u64) -> Value {
        json!({
            "name": name,
            "pool_type": "rt",
            "format_type": 0,
            "admin_value": " 65000 ",
            "range_start": start,
            "range_end": end,
        })
    }

    #[tokio::test]
    async fn test_create_pool() {
        let router = test_router();
        let (status, body) = create(&router, type0_pool("rt", 1000, 1999)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["admin_value"], "65000");
        assert_eq!(body["format_type"], 0);
        assert_eq!(body["format_display"], "65000:1000-1999");
        assert_eq!(body["total_values"], 1000);
        assert_eq!(body["available_count"], 1000);
    }

    #[tokio::test]
    async fn test_create_pool_validation() {
        let router = test_router();
        let cases = [
            (json!({ "name": "a", "pool_type": "rt", "format_type": 0, "admin_value": "70000", "range_start": 1, "range_end": 2 }),
             "Type 0 admin_value must be a valid 2-byte ASN (1-65535)"),
            (json!({ "name": "b", "pool_type": "rd", "format_type": 1, "admin_value": "65000", "range_start": 1, "range_end": 2 }),
             "Type 1 admin_value must be a valid IP address"),
            (json!({ "name": "c", "pool_type": "rd", "format_type": 1, "admin_value": "10.0.0.1", "range_start": 1, "range_end": 70000 }),
             "Type 1 range must be between 0 and 65535"),
            (json!({ "name": "d", "pool_type": "rt", "format_type": 2, "admin_value": "4200000000", "range_start": 9, "range_end": 3 }),
             "range_start must be less than or equal to range_end"),
        ];

        for (body, detail) in cases {
            let (status, response) = create(&router, body).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(response["detail"], detail);
        }
    }

    #[tokio::test]
    async fn test_allocate_until_exhausted_then_reuse() {
        let router = test_router();
        create(&router, type0_pool("small", 100, 102)).await;

        for expected in ["65000:100", "65000:101", "65000:102"] {
            let (status, body) = allocate(&router, "small").await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["value"], expected);
            assert_eq!(body["pool_type"], "rt");
        }

        let (status, body) = allocate(&router, "small").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["detail"], "Pool 'small' is exhausted - no available values");

        let (status, released) = send(
            &router,
            Method::POST,
            "/api/v1/rtrd-pools/small/release",
            Some(json!({ "value": "65000:101" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(released["allocation"]["status"], "released");

        let (_, body) = allocate(&router, "small").await;
        assert_eq!(body["value"], "65000:101");
    }

    #[tokio::test]
    async fn test_allocate_survives_concurrent_delete() {
        let mut state = test_state();
        state.value_pools = Arc::new(PoolManager::new(
            Arc::new(VanishingStore::<ValuePool>::new()),
            3,
        ));
        let router = crate::api::build_router(state, "/api/v1");
        create(&router, type0_pool("rt", 1, 10)).await;

        let (status, body) = allocate(&router, "rt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], "65000:1");
        assert_eq!(body["pool_name"], "rt");

        let (status, _) = send(&router, Method::GET, "/api/v1/rtrd-pools/rt", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_allocate_without_body() {
        let router = test_router();
        create(&router, type0_pool("rt", 1, 10)).await;

        let (status, body) = send(&router, Method::POST, "/api/v1/rtrd-pools/rt/allocate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["value"], "65000:1");
    }

    #[tokio::test]
    async fn test_release_errors() {
        let router = test_router();
        create(&router, type0_pool("rt", 1, 10)).await;

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/rtrd-pools/rt/release",
            Some(json!({ "value": "65000:5" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "Value '65000:5' not found or already released");

        // Integers no pool can hold are well-formed but match nothing
        for value in ["65000:-1", "65000:4294967296", "65000: 12"] {
            let (status, body) = send(
                &router,
                Method::POST,
                "/api/v1/rtrd-pools/rt/release",
                Some(json!({ "value": value })),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{value}");
            assert_eq!(body["detail"], format!("Value '{value}' not found or already released"));
        }

        let (status, _) = send(
            &router,
            Method::POST,
            "/api/v1/rtrd-pools/rt/release",
            Some(json!({ "value": "5" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail_lists_live_allocations() {
        let router = test_router();
        create(&router, type0_pool("rt", 1, 10)).await;
        allocate(&router, "rt").await;
        allocate(&router, "rt").await;

        let (status, body) = send(&router, Method::GET, "/api/v1/rtrd-pools/rt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["allocated_count"], 2);
        assert_eq!(body["allocations"][1]["value"], "65000:2");
        assert_eq!(body["allocations"][0]["description"], "vrf blue");

        let (_, listing) = send(&router, Method::GET, "/api/v1/rtrd-pools/rt/allocations", None).await;
        assert_eq!(listing["total_allocations"], 2);

        let (status, _) = send(&router, Method::DELETE, "/api/v1/rtrd-pools/rt", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, pools) = send(&router, Method::GET, "/api/v1/rtrd-pools", None).await;
        assert_eq!(pools, json!([]));
    }
}

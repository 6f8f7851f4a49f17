//! Shared pool and allocation lifecycle.
//!
//! Address pools and value pools differ only in what they hand out and how
//! they pick the next candidate. The status machine, metadata, timestamps
//! and release handling live here once, parameterised by [`Resource`] and
//! [`ResourcePool`].

use crate::error::PoolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use tracing::debug;
use uuid::Uuid;

/// Lifecycle status of an allocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStatus {
    /// Held by a caller; counts against the pool
    #[default]
    Allocated,

    /// Part of the status vocabulary but never produced by the allocators
    Reserved,

    /// Returned to the pool; kept for audit only
    Released,
}

impl AllocationStatus {
    /// Whether an allocation in this state occupies pool space.
    pub fn is_live(self) -> bool {
        matches!(self, Self::Allocated)
    }

    /// Whether `self → next` is a legal transition.
    pub fn can_transition_to(self, next: Self) -> bool {
        match self {
            Self::Allocated => next == Self::Released,
            // No business rules are defined for reserved allocations yet.
            Self::Reserved => false,
            Self::Released => false,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Allocated => "allocated",
            Self::Reserved => "reserved",
            Self::Released => "released",
        };
        f.write_str(s)
    }
}

/// Something a pool hands out: an address block or an RT/RD value.
pub trait Resource: Clone + fmt::Display + fmt::Debug + Send + Sync + 'static {
    /// What a release request identifies the resource by.
    type Key: Clone + Eq + Hash + fmt::Display + fmt::Debug + Send + Sync + 'static;

    /// Release key of this resource.
    fn key(&self) -> Self::Key;

    /// Whether two resources may not be live at the same time.
    fn conflicts_with(&self, other: &Self) -> bool;
}

/// A named resource space and its selection strategy.
pub trait ResourcePool: Clone + fmt::Debug + Send + Sync + 'static {
    /// Resource handed out by this pool.
    type Resource: Resource;

    /// Per-request parameters (prefix length for address pools).
    type Request: fmt::Debug + Send + Sync;

    /// Unique pool name.
    fn name(&self) -> &str;

    /// Picks the next resource given the currently live resources.
    ///
    /// Must return [`PoolError::Exhausted`] when nothing is free and must
    /// never return a resource that conflicts with one in `taken`.
    fn select(
        &self,
        request: &Self::Request,
        taken: &[&Self::Resource],
    ) -> Result<Self::Resource, PoolError>;

    /// Records a successful selection on the pool value (cursor update).
    fn record_selection(&mut self, _resource: &Self::Resource) {}

    /// Parses and normalises a release argument into a resource key.
    fn parse_key(&self, raw: &str) -> Result<<Self::Resource as Resource>::Key, PoolError>;
}

/// Longest accepted pool name.
pub const MAX_POOL_NAME_LEN: usize = 100;

/// Checks that a pool name is non-blank and at most [`MAX_POOL_NAME_LEN`] characters.
pub fn validate_pool_name(name: &str) -> Result<(), PoolError> {
    if name.trim().is_empty() {
        return Err(PoolError::InvalidInput("pool name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_POOL_NAME_LEN {
        return Err(PoolError::InvalidInput(format!(
            "pool name must be at most {MAX_POOL_NAME_LEN} characters"
        )));
    }
    Ok(())
}

/// Caller-supplied metadata attached to a new allocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllocationMeta {
    /// Purpose of the allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Client or service holding the allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_to: Option<String>,
}

/// A claim against a pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation<R> {
    /// Allocation identifier
    pub id: Uuid,

    /// Owning pool name
    pub pool: String,

    /// The block or value held
    pub resource: R,

    /// Lifecycle status
    pub status: AllocationStatus,

    /// Purpose of the allocation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Holder identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocated_to: Option<String>,

    /// When the allocation was made
    pub allocated_at: DateTime<Utc>,

    /// When the allocation was released
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
}

impl<R: Resource> Allocation<R> {
    /// Creates a live allocation.
    pub fn new(
        pool: impl Into<String>,
        resource: R,
        meta: AllocationMeta,
        allocated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool: pool.into(),
            resource,
            status: AllocationStatus::Allocated,
            description: meta.description,
            allocated_to: meta.allocated_to,
            allocated_at,
            released_at: None,
        }
    }

    /// Whether this allocation occupies pool space.
    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    /// Transitions the allocation to `released`.
    ///
    /// Releasing an allocation that is not live reports `NotFound` and leaves
    /// it untouched.
    pub fn release(&mut self, now: DateTime<Utc>) -> Result<(), PoolError> {
        if !self.status.can_transition_to(AllocationStatus::Released) {
            return Err(PoolError::NotFound(format!(
                "'{}' in pool '{}' is {} and cannot be released",
                self.resource, self.pool, self.status
            )));
        }
        self.status = AllocationStatus::Released;
        self.released_at = Some(now);
        Ok(())
    }
}

/// Selects the next resource from `pool` and builds the allocation for it.
///
/// Only live entries of `existing` are considered occupied. On success the
/// pool value carries any updated cursor; on failure it is left untouched.
pub fn allocate<P: ResourcePool>(
    pool: &mut P,
    request: &P::Request,
    existing: &[Allocation<P::Resource>],
    meta: AllocationMeta,
    now: DateTime<Utc>,
) -> Result<Allocation<P::Resource>, PoolError> {
    let taken: Vec<&P::Resource> = existing
        .iter()
        .filter(|a| a.is_live())
        .map(|a| &a.resource)
        .collect();

    let resource = pool.select(request, &taken)?;
    debug!(
        "Selected {} from pool {} ({} live allocations, request {:?})",
        resource,
        pool.name(),
        taken.len(),
        request
    );
    pool.record_selection(&resource);

    Ok(Allocation::new(pool.name(), resource, meta, now))
}

/// Releases the live allocation identified by `key`.
pub fn release<'a, R: Resource>(
    allocations: &'a mut [Allocation<R>],
    key: &R::Key,
    now: DateTime<Utc>,
) -> Result<&'a Allocation<R>, PoolError> {
    let allocation = allocations
        .iter_mut()
        .find(|a| a.is_live() && a.resource.key() == *key)
        .ok_or_else(|| PoolError::NotFound(format!("'{key}' not found or already released")))?;

    allocation.release(now)?;
    Ok(allocation)
}

/// Checks that `candidate` does not conflict with any live allocation.
pub fn ensure_disjoint<R: Resource>(
    existing: &[Allocation<R>],
    candidate: &R,
) -> Result<(), Allocation<R>> {
    match existing
        .iter()
        .find(|a| a.is_live() && a.resource.conflicts_with(candidate))
    {
        Some(clash) => Err(clash.clone()),
        None => Ok(()),
    }
}

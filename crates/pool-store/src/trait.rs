//! PoolStore trait
//!
//! Abstracts pool persistence so the service can run against the in-memory
//! store or any transactional backend. All methods are `Send` to work with
//! Tokio's work-stealing runtime.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use pool_core::{Allocation, Resource, ResourcePool};

/// Release key of the resources handed out by pool type `P`.
pub type KeyOf<P> = <<P as ResourcePool>::Resource as Resource>::Key;

/// A pool record together with every allocation made from it, read at one
/// point in time.
#[derive(Debug, Clone)]
pub struct PoolSnapshot<P: ResourcePool> {
    /// Pool record, including its cursor
    pub pool: P,

    /// All allocations, released ones included, in allocation order
    pub allocations: Vec<Allocation<P::Resource>>,
}

impl<P: ResourcePool> PoolSnapshot<P> {
    /// Allocations that currently occupy pool space.
    pub fn live(&self) -> impl Iterator<Item = &Allocation<P::Resource>> {
        self.allocations.iter().filter(|a| a.is_live())
    }
}

/// Storage operations for one pool kind
#[async_trait::async_trait]
pub trait PoolStore<P: ResourcePool>: Send + Sync {
    /// Store a new pool. Fails with `AlreadyExists` on a name collision.
    async fn insert_pool(&self, pool: P) -> Result<(), StoreError>;

    /// Get a pool record by name
    async fn get_pool(&self, name: &str) -> Result<P, StoreError>;

    /// All pools, sorted by name
    async fn list_pools(&self) -> Result<Vec<P>, StoreError>;

    /// Delete a pool and all of its allocations.
    ///
    /// Returns the number of allocation records removed with it.
    async fn delete_pool(&self, name: &str) -> Result<usize, StoreError>;

    /// Consistent read of a pool and its allocations
    async fn snapshot(&self, name: &str) -> Result<PoolSnapshot<P>, StoreError>;

    /// Live allocations of a pool
    async fn live_allocations(&self, name: &str) -> Result<Vec<Allocation<P::Resource>>, StoreError> {
        let snapshot = self.snapshot(name).await?;
        Ok(snapshot.live().cloned().collect())
    }

    /// Commit a new allocation together with the updated pool record.
    ///
    /// Re-checks the allocation against the live set as it is now, not as the
    /// caller saw it. A clash fails with `Conflict` and writes nothing.
    async fn commit_allocation(
        &self,
        pool: &P,
        allocation: Allocation<P::Resource>,
    ) -> Result<Allocation<P::Resource>, StoreError>;

    /// Transition the live allocation identified by `key` to released.
    async fn release_allocation(
        &self,
        name: &str,
        key: &KeyOf<P>,
        now: DateTime<Utc>,
    ) -> Result<Allocation<P::Resource>, StoreError>;
}

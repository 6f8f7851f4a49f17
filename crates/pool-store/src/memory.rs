//! In-memory PoolStore
//!
//! Pool records live in a name-keyed map. The map lock is only held long
//! enough to look an entry up; each entry has its own mutex, so writes to
//! different pools never wait on each other.

use crate::error::StoreError;
use crate::store_trait::{KeyOf, PoolSnapshot, PoolStore};
use chrono::{DateTime, Utc};
use pool_core::{Allocation, ResourcePool, ensure_disjoint, release};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

#[derive(Debug)]
struct PoolEntry<P: ResourcePool> {
    pool: P,
    allocations: Vec<Allocation<P::Resource>>,
    // Set when the entry is removed from the map while a writer holds its Arc
    deleted: bool,
}

/// PoolStore that keeps everything in process memory
#[derive(Debug)]
pub struct MemoryStore<P: ResourcePool> {
    pools: RwLock<HashMap<String, Arc<Mutex<PoolEntry<P>>>>>,
}

impl<P: ResourcePool> Default for MemoryStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ResourcePool> MemoryStore<P> {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            pools: RwLock::new(HashMap::new()),
        }
    }

    async fn entry(&self, name: &str) -> Result<Arc<Mutex<PoolEntry<P>>>, StoreError> {
        self.pools
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::PoolNotFound(name.to_string()))
    }
}

#[async_trait::async_trait]
impl<P: ResourcePool> PoolStore<P> for MemoryStore<P> {
    async fn insert_pool(&self, pool: P) -> Result<(), StoreError> {
        let mut pools = self.pools.write().await;
        if pools.contains_key(pool.name()) {
            return Err(StoreError::AlreadyExists(pool.name().to_string()));
        }
        pools.insert(
            pool.name().to_string(),
            Arc::new(Mutex::new(PoolEntry {
                pool,
                allocations: Vec::new(),
                deleted: false,
            })),
        );
        Ok(())
    }

    async fn get_pool(&self, name: &str) -> Result<P, StoreError> {
        let entry = self.entry(name).await?;
        let entry = entry.lock().await;
        Ok(entry.pool.clone())
    }

    async fn list_pools(&self) -> Result<Vec<P>, StoreError> {
        let entries: Vec<_> = self.pools.read().await.values().cloned().collect();
        let mut pools = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry = entry.lock().await;
            if !entry.deleted {
                pools.push(entry.pool.clone());
            }
        }
        pools.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(pools)
    }

    async fn delete_pool(&self, name: &str) -> Result<usize, StoreError> {
        let removed = self
            .pools
            .write()
            .await
            .remove(name)
            .ok_or_else(|| StoreError::PoolNotFound(name.to_string()))?;

        let mut entry = removed.lock().await;
        entry.deleted = true;
        let cascaded = entry.allocations.len();
        entry.allocations.clear();
        debug!("Removed pool {} with {} allocation records", name, cascaded);
        Ok(cascaded)
    }

    async fn snapshot(&self, name: &str) -> Result<PoolSnapshot<P>, StoreError> {
        let entry = self.entry(name).await?;
        let entry = entry.lock().await;
        Ok(PoolSnapshot {
            pool: entry.pool.clone(),
            allocations: entry.allocations.clone(),
        })
    }

    async fn commit_allocation(
        &self,
        pool: &P,
        allocation: Allocation<P::Resource>,
    ) -> Result<Allocation<P::Resource>, StoreError> {
        let entry = self.entry(pool.name()).await?;
        let mut entry = entry.lock().await;
        if entry.deleted {
            return Err(StoreError::PoolNotFound(pool.name().to_string()));
        }

        if let Err(clash) = ensure_disjoint(&entry.allocations, &allocation.resource) {
            warn!(
                "Rejected {} in pool {}: conflicts with live allocation {} ({})",
                allocation.resource,
                pool.name(),
                clash.resource,
                clash.id
            );
            return Err(StoreError::Conflict(format!(
                "{} conflicts with {} in pool '{}'",
                allocation.resource,
                clash.resource,
                pool.name()
            )));
        }

        entry.allocations.push(allocation.clone());
        entry.pool = pool.clone();
        Ok(allocation)
    }

    async fn release_allocation(
        &self,
        name: &str,
        key: &KeyOf<P>,
        now: DateTime<Utc>,
    ) -> Result<Allocation<P::Resource>, StoreError> {
        let entry = self.entry(name).await?;
        let mut entry = entry.lock().await;
        if entry.deleted {
            return Err(StoreError::PoolNotFound(name.to_string()));
        }

        let released = release(&mut entry.allocations, key, now)?;
        Ok(released.clone())
    }
}

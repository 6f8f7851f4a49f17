//! Pool manager
//!
//! Runs every allocate/release against a pool as one serialized unit:
//! snapshot read, candidate selection and commit happen while the pool's
//! lock is held. Locks are per pool name, so requests against different
//! pools never wait on each other.
//!
//! The store re-checks disjointness at commit. If another writer of the same
//! store got there first the commit fails with a conflict; the manager then
//! re-reads the snapshot and retries a bounded number of times.

use crate::backoff::FibonacciBackoff;
use crate::error::ServiceError;
use chrono::Utc;
use pool_core::{Allocation, AllocationMeta, ResourcePool, allocate};
use pool_store::{PoolSnapshot, PoolStore};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Default number of commit attempts before a conflict is surfaced
pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

const BACKOFF_MIN_MILLIS: u64 = 5;
const BACKOFF_MAX_MILLIS: u64 = 50;

/// Serializes allocation traffic per pool on top of a [`PoolStore`].
pub struct PoolManager<P: ResourcePool> {
    store: Arc<dyn PoolStore<P>>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    commit_attempts: u32,
}

impl<P: ResourcePool> std::fmt::Debug for PoolManager<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolManager")
            .field("commit_attempts", &self.commit_attempts)
            .finish_non_exhaustive()
    }
}

impl<P: ResourcePool> PoolManager<P> {
    /// Create a manager over `store`. At least one commit attempt is always made.
    pub fn new(store: Arc<dyn PoolStore<P>>, commit_attempts: u32) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
            commit_attempts: commit_attempts.max(1),
        }
    }

    async fn pool_lock(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Declare a new pool.
    pub async fn create_pool(&self, pool: P) -> Result<P, ServiceError> {
        let name = pool.name().to_string();
        self.store.insert_pool(pool.clone()).await?;
        info!("Created pool {}", name);
        Ok(pool)
    }

    /// Pool record by name.
    pub async fn get_pool(&self, name: &str) -> Result<P, ServiceError> {
        Ok(self.store.get_pool(name).await?)
    }

    /// All pools, sorted by name.
    pub async fn list_pools(&self) -> Result<Vec<P>, ServiceError> {
        Ok(self.store.list_pools().await?)
    }

    /// Pool record with all of its allocations.
    pub async fn snapshot(&self, name: &str) -> Result<PoolSnapshot<P>, ServiceError> {
        Ok(self.store.snapshot(name).await?)
    }

    /// Delete a pool and every allocation made from it.
    pub async fn delete_pool(&self, name: &str) -> Result<(), ServiceError> {
        let lock = self.pool_lock(name).await;
        let result = {
            let _guard = lock.lock().await;
            self.store.delete_pool(name).await
        };
        self.locks.lock().await.remove(name);

        let cascaded = result?;
        info!("Deleted pool {} ({} allocation records)", name, cascaded);
        Ok(())
    }

    /// Allocate the next resource from `name`.
    ///
    /// Returns the committed allocation together with the pool record it was
    /// committed against. Exhaustion and invalid requests are reported
    /// immediately; only commit conflicts are retried.
    pub async fn allocate(
        &self,
        name: &str,
        request: &P::Request,
        meta: AllocationMeta,
    ) -> Result<(Allocation<P::Resource>, P), ServiceError> {
        // Unknown pools must not leave a lock entry behind
        self.get_pool(name).await?;

        let lock = self.pool_lock(name).await;
        let _guard = lock.lock().await;

        let mut backoff = FibonacciBackoff::new(BACKOFF_MIN_MILLIS, BACKOFF_MAX_MILLIS);
        let mut attempt = 1;
        loop {
            let snapshot = self.store.snapshot(name).await?;
            let mut pool = snapshot.pool;
            let allocation = allocate(
                &mut pool,
                request,
                &snapshot.allocations,
                meta.clone(),
                Utc::now(),
            )
            .inspect_err(|e| debug!("Allocation from pool {} failed: {}", name, e))?;

            match self.store.commit_allocation(&pool, allocation).await {
                Ok(allocation) => {
                    info!(
                        "Allocated {} from pool {} ({})",
                        allocation.resource, name, allocation.id
                    );
                    return Ok((allocation, pool));
                }
                Err(e) if e.is_conflict() && attempt < self.commit_attempts => {
                    let delay = backoff.next_backoff();
                    warn!(
                        "Commit conflict in pool {} (attempt {}/{}), retrying in {:?}: {}",
                        name, attempt, self.commit_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    error!("Failed to commit allocation in pool {}: {}", name, e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Release the live allocation named by `raw`.
    ///
    /// `raw` is normalised by the pool first, so `10.0.0.6/30` releases the
    /// stored `10.0.0.4/30`. The pool record is returned alongside.
    pub async fn release(&self, name: &str, raw: &str) -> Result<(Allocation<P::Resource>, P), ServiceError> {
        let pool = self.get_pool(name).await?;
        let key = pool.parse_key(raw)?;

        let lock = self.pool_lock(name).await;
        let _guard = lock.lock().await;

        let released = self.store.release_allocation(name, &key, Utc::now()).await?;
        info!("Released {} from pool {}", released.resource, name);
        Ok((released, pool))
    }

    /// Number of pools that currently have a lock entry.
    #[cfg(test)]
    pub async fn lock_count(&self) -> usize {
        self.locks.lock().await.len()
    }
}

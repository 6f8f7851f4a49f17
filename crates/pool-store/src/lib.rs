//! Pool Storage
//!
//! The persistence collaborator of the allocation engine. A [`PoolStore`]
//! keeps pool records and their allocations, and re-checks the storage-level
//! invariants on every write:
//!
//! - pool names are unique per pool kind
//! - live allocations of one pool never conflict
//!
//! A commit that would break the second invariant fails with
//! [`StoreError::Conflict`], which callers treat as transient and retry.
//!
//! [`MemoryStore`] is the in-process implementation used by the service and
//! its tests.

pub mod error;
pub mod memory;
#[path = "trait.rs"]
pub mod store_trait;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store_trait::{KeyOf, PoolSnapshot, PoolStore};

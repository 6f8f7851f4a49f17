//! Pool Manager allocation engine
//!
//! Tracks finite network resource spaces and hands out non-overlapping
//! pieces of them:
//!
//! - **Address pools**: IPv4/IPv6 CIDRs carved into aligned sub-blocks,
//!   selected lowest-address first.
//! - **Value pools**: L3VPN Route-Target / Route-Distinguisher number ranges,
//!   selected by a cyclic scan starting at the pool's cursor.
//!
//! Both pool kinds share one lifecycle (`allocated → released`) through the
//! [`ResourcePool`] and [`Resource`] traits. Everything in this crate is a
//! pure function of the pool value and the caller-supplied allocation
//! snapshot; storage and serialisation of concurrent requests belong to the
//! caller.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use pool_core::{allocate, AddressPool, AllocationMeta};
//!
//! # fn example() -> Result<(), pool_core::PoolError> {
//! let mut pool = AddressPool::new("core-links", "10.0.0.0/24", None, None, Utc::now())?;
//! let first = allocate(&mut pool, &30, &[], AllocationMeta::default(), Utc::now())?;
//! assert_eq!(first.resource.to_string(), "10.0.0.0/30");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod address;
pub mod error;
pub mod lifecycle;
pub mod value;

pub use address::*;
pub use error::*;
pub use lifecycle::*;
pub use value::*;

//! Address Block Allocator
//!
//! Carves an IPv4/IPv6 pool into aligned sub-blocks identified by prefix
//! length, always handing out the lowest-addressed free block.

pub mod block;
pub mod intervals;
pub mod pool;

pub use block::*;
pub use intervals::CoveredRanges;
pub use pool::*;

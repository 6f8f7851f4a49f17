//! Allocation engine errors

use thiserror::Error;

/// Errors produced by pool validation and allocation.
///
/// Every variant is a deterministic function of the input state, so none of
/// them is worth retrying.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    /// Referenced pool or allocation does not exist, or a release target
    /// matches no live allocation
    #[error("Not found: {0}")]
    NotFound(String),

    /// No free block or value satisfies the request
    #[error("Pool exhausted: {0}")]
    Exhausted(String),

    /// Malformed CIDR, malformed value string, or out-of-bounds parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

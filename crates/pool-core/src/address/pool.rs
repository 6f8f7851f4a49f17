//! Address pools and lowest-address first-fit block selection.

use super::block::{AddressBlock, AddressFamily, block_size, is_aligned};
use super::intervals::CoveredRanges;
use crate::error::PoolError;
use crate::lifecycle::{Resource, ResourcePool, validate_pool_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named IPv4 or IPv6 CIDR from which aligned sub-blocks are allocated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressPool {
    /// Unique pool name
    pub name: String,

    /// Purpose of the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Address family
    pub family: AddressFamily,

    /// Base CIDR in canonical form
    pub cidr: AddressBlock,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Address-count statistics of an address pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AddressPoolStats {
    /// Addresses in the pool CIDR
    pub total_addresses: u128,

    /// Addresses covered by live allocations
    pub allocated_addresses: u128,

    /// `total_addresses - allocated_addresses`
    pub available_addresses: u128,
}

impl AddressPool {
    /// Declares a pool over `cidr`.
    ///
    /// The CIDR is canonicalised (`10.0.0.9/24` becomes `10.0.0.0/24`). When
    /// `family` is given it must match the CIDR. A pool covering the whole
    /// IPv6 space is rejected because its size does not fit a 128-bit count.
    pub fn new(
        name: impl Into<String>,
        cidr: &str,
        family: Option<AddressFamily>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, PoolError> {
        let name = name.into();
        validate_pool_name(&name)?;

        let cidr = AddressBlock::parse(cidr)?;
        if let Some(declared) = family {
            if declared != cidr.family() {
                return Err(PoolError::InvalidInput(format!(
                    "pool type {declared} does not match CIDR {cidr}"
                )));
            }
        }
        if cidr.family() == AddressFamily::V6 && cidr.prefix_len() == 0 {
            return Err(PoolError::InvalidInput(
                "an IPv6 pool cannot span the entire address space".to_string(),
            ));
        }

        Ok(Self {
            name,
            description,
            family: cidr.family(),
            cidr,
            created_at,
        })
    }

    /// Number of addresses in the pool.
    pub fn total_addresses(&self) -> u128 {
        self.cidr.address_count()
    }

    /// Checks that a block of `prefix_len` can be carved from this pool.
    pub fn validate_prefix(&self, prefix_len: u8) -> Result<(), PoolError> {
        let max = self.family.max_prefix();
        if prefix_len > max {
            return Err(PoolError::InvalidInput(format!(
                "prefix_length cannot exceed {max} for {}",
                self.family
            )));
        }
        if prefix_len < self.cidr.prefix_len() {
            return Err(PoolError::InvalidInput(format!(
                "Cannot allocate /{prefix_len} from pool /{} - requested block is larger than pool",
                self.cidr.prefix_len()
            )));
        }
        Ok(())
    }

    /// Allocated and available address counts given the live blocks.
    ///
    /// A live /30 counts as four addresses, not one allocation.
    pub fn statistics<'a>(&self, live: impl IntoIterator<Item = &'a AddressBlock>) -> AddressPoolStats {
        let covered = CoveredRanges::from_blocks(live.into_iter().filter(|b| b.family() == self.family));
        let allocated = covered.count_within(self.cidr.first(), self.cidr.last());
        let total = self.total_addresses();

        AddressPoolStats {
            total_addresses: total,
            allocated_addresses: allocated,
            available_addresses: total.saturating_sub(allocated),
        }
    }
}

impl ResourcePool for AddressPool {
    type Resource = AddressBlock;
    type Request = u8;

    fn name(&self) -> &str {
        &self.name
    }

    fn select(&self, prefix_len: &u8, taken: &[&AddressBlock]) -> Result<AddressBlock, PoolError> {
        let prefix_len = *prefix_len;
        self.validate_prefix(prefix_len)?;

        let max = self.family.max_prefix();
        let size = block_size(prefix_len, max).ok_or_else(|| {
            PoolError::InvalidInput(format!("/{prefix_len} is not a valid {} block", self.family))
        })?;

        let covered = CoveredRanges::from_blocks(taken.iter().copied().filter(|b| b.family() == self.family));
        let start = covered
            .first_fit(self.cidr.first(), self.cidr.last(), size)
            .ok_or_else(|| {
                PoolError::Exhausted(format!(
                    "Pool '{}' has no available /{prefix_len} blocks",
                    self.name
                ))
            })?;
        debug_assert!(is_aligned(start, prefix_len, max));

        AddressBlock::from_parts(self.family, start, prefix_len)
    }

    fn parse_key(&self, raw: &str) -> Result<<AddressBlock as Resource>::Key, PoolError> {
        AddressBlock::parse(raw)
    }
}

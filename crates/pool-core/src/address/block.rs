//! Address blocks and prefix arithmetic.
//!
//! Addresses of both families are handled as `u128` so that alignment,
//! membership and enumeration are plain integer arithmetic.

use crate::error::PoolError;
use crate::lifecycle::Resource;
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// IP address family of a pool or block.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4 (32-bit addresses)
    #[serde(rename = "ipv4")]
    V4,

    /// IPv6 (128-bit addresses)
    #[serde(rename = "ipv6")]
    V6,
}

impl AddressFamily {
    /// Longest prefix length of the family.
    pub const fn max_prefix(self) -> u8 {
        match self {
            Self::V4 => 32,
            Self::V6 => 128,
        }
    }

    fn of(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::V4,
            IpAddr::V6(_) => Self::V6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => f.write_str("ipv4"),
            Self::V6 => f.write_str("ipv6"),
        }
    }
}

impl FromStr for AddressFamily {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ipv4" | "v4" | "4" => Ok(Self::V4),
            "ipv6" | "v6" | "6" => Ok(Self::V6),
            other => Err(PoolError::InvalidInput(format!(
                "unknown address family '{other}' (expected ipv4 or ipv6)"
            ))),
        }
    }
}

/// Number of addresses in a block of `prefix_len` within a family whose
/// longest prefix is `max_prefix`: `2^(max_prefix - prefix_len)`.
///
/// Returns `None` when `prefix_len` exceeds `max_prefix` or when the block
/// would cover all 2^128 IPv6 addresses.
pub fn block_size(prefix_len: u8, max_prefix: u8) -> Option<u128> {
    let host_bits = max_prefix.checked_sub(prefix_len)?;
    1u128.checked_shl(u32::from(host_bits))
}

/// Whether `address` is a valid first address for a block of `prefix_len`.
pub fn is_aligned(address: u128, prefix_len: u8, max_prefix: u8) -> bool {
    if prefix_len > max_prefix {
        return false;
    }
    block_size(prefix_len, max_prefix).map_or(address == 0, |size| address % size == 0)
}

/// Integer value of an address.
pub fn address_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(a) => u128::from(u32::from(a)),
        IpAddr::V6(a) => u128::from(a),
    }
}

/// Address with integer value `value` in `family`.
pub fn u128_to_address(family: AddressFamily, value: u128) -> Result<IpAddr, PoolError> {
    match family {
        AddressFamily::V4 => u32::try_from(value)
            .map(|v| IpAddr::V4(Ipv4Addr::from(v)))
            .map_err(|_| PoolError::InvalidInput(format!("{value} is outside the IPv4 space"))),
        AddressFamily::V6 => Ok(IpAddr::V6(Ipv6Addr::from(value))),
    }
}

/// A CIDR block in canonical network form (host bits cleared).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AddressBlock(IpNet);

impl AddressBlock {
    /// Parses CIDR notation, normalising host bits away.
    ///
    /// `10.0.0.5/30` yields `10.0.0.4/30`. A bare address is read as a
    /// single-address block (`/32` or `/128`).
    pub fn parse(raw: &str) -> Result<Self, PoolError> {
        let raw = raw.trim();
        let invalid = || PoolError::InvalidInput(format!("'{raw}' is not valid CIDR notation"));

        let net = if raw.contains('/') {
            IpNet::from_str(raw).map_err(|_| invalid())?
        } else {
            let addr = IpAddr::from_str(raw).map_err(|_| invalid())?;
            IpNet::new(addr, AddressFamily::of(addr).max_prefix()).map_err(|_| invalid())?
        };

        Ok(Self(net.trunc()))
    }

    /// Block of `prefix_len` whose first address has integer value `first`.
    pub fn from_parts(family: AddressFamily, first: u128, prefix_len: u8) -> Result<Self, PoolError> {
        let addr = u128_to_address(family, first)?;
        let net = IpNet::new(addr, prefix_len).map_err(|_| {
            PoolError::InvalidInput(format!(
                "prefix length {prefix_len} exceeds {} for {family}",
                family.max_prefix()
            ))
        })?;
        Ok(Self(net.trunc()))
    }

    /// Address family of the block.
    pub fn family(&self) -> AddressFamily {
        AddressFamily::of(self.0.network())
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.0.prefix_len()
    }

    /// First address.
    pub fn network_address(&self) -> IpAddr {
        self.0.network()
    }

    /// Last address.
    pub fn last_address(&self) -> IpAddr {
        self.0.broadcast()
    }

    /// Integer value of the first address.
    pub fn first(&self) -> u128 {
        address_to_u128(self.0.network())
    }

    /// Integer value of the last address.
    pub fn last(&self) -> u128 {
        address_to_u128(self.0.broadcast())
    }

    /// Number of addresses in the block, saturating for `::/0`.
    pub fn address_count(&self) -> u128 {
        (self.last() - self.first()).saturating_add(1)
    }

    /// Every address of the block in ascending order, or `None` when the
    /// block holds more than `limit` addresses.
    pub fn addresses(&self, limit: u128) -> Option<Vec<IpAddr>> {
        if self.address_count() > limit {
            return None;
        }
        let family = self.family();
        (self.first()..=self.last())
            .map(|value| u128_to_address(family, value).ok())
            .collect()
    }

    /// Dotted-decimal subnet mask; IPv4 only.
    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        match self.0 {
            IpNet::V4(net) => Some(net.netmask()),
            IpNet::V6(_) => None,
        }
    }

    /// Broadcast (last) address; IPv4 only.
    pub fn broadcast_address(&self) -> Option<Ipv4Addr> {
        match self.0 {
            IpNet::V4(net) => Some(net.broadcast()),
            IpNet::V6(_) => None,
        }
    }

    /// Whether `other` lies entirely inside this block.
    pub fn contains_block(&self, other: &Self) -> bool {
        self.family() == other.family() && self.first() <= other.first() && other.last() <= self.last()
    }

    /// Whether the two blocks share at least one address.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.family() == other.family() && self.first() <= other.last() && other.first() <= self.last()
    }
}

impl fmt::Display for AddressBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AddressBlock {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AddressBlock {
    type Error = PoolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AddressBlock> for String {
    fn from(block: AddressBlock) -> Self {
        block.to_string()
    }
}

impl Resource for AddressBlock {
    type Key = AddressBlock;

    fn key(&self) -> Self::Key {
        *self
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.overlaps(other)
    }
}

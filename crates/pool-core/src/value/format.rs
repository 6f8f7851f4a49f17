//! RT/RD wire formats.
//!
//! | Format | Admin field | Admin range | Number range |
//! |---|---|---|---|
//! | 0 | 2-byte ASN | 1–65535 | 0–4294967295 |
//! | 1 | IPv4/IPv6 address | valid address | 0–65535 |
//! | 2 | 4-byte ASN | 1–4294967295 | 0–65535 |

use crate::error::PoolError;
use crate::lifecycle::Resource;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::num::IntErrorKind;
use std::str::FromStr;

/// Whether a value pool hands out Route Targets or Route Distinguishers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Route Target: controls route import/export between VRFs
    #[serde(alias = "route-target")]
    Rt,

    /// Route Distinguisher: makes VPN prefixes globally unique
    #[serde(alias = "route-distinguisher")]
    Rd,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rt => f.write_str("rt"),
            Self::Rd => f.write_str("rd"),
        }
    }
}

/// RT/RD encoding type; serialised as its number (0, 1 or 2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub enum ValueFormat {
    /// 2-byte ASN : 4-byte number (`65000:100`)
    Type0,

    /// IP address : 2-byte number (`10.0.0.1:100`)
    Type1,

    /// 4-byte ASN : 2-byte number (`4200000000:100`)
    Type2,
}

impl ValueFormat {
    /// Largest assignable number.
    pub const fn max_number(self) -> u32 {
        match self {
            Self::Type0 => u32::MAX,
            Self::Type1 | Self::Type2 => 65_535,
        }
    }

    /// Validates an administrative field, returning it trimmed.
    pub fn validate_admin(self, admin: &str) -> Result<String, PoolError> {
        let admin = admin.trim();
        match self {
            Self::Type0 => {
                parse_asn(admin, 65_535).map_err(|()| {
                    PoolError::InvalidInput(
                        "Type 0 admin_value must be a valid 2-byte ASN (1-65535)".to_string(),
                    )
                })?;
            }
            Self::Type1 => {
                IpAddr::from_str(admin).map_err(|_| {
                    PoolError::InvalidInput("Type 1 admin_value must be a valid IP address".to_string())
                })?;
            }
            Self::Type2 => {
                parse_asn(admin, u64::from(u32::MAX)).map_err(|()| {
                    PoolError::InvalidInput(
                        "Type 2 admin_value must be a valid 4-byte ASN (1-4294967295)".to_string(),
                    )
                })?;
            }
        }
        Ok(admin.to_string())
    }

    /// Validates that `[start, end]` fits the format's number field.
    pub fn validate_range(self, start: u64, end: u64) -> Result<(u32, u32), PoolError> {
        let max = u64::from(self.max_number());
        if start > max || end > max {
            return Err(PoolError::InvalidInput(format!(
                "Type {} range must be between 0 and {max}",
                u8::from(self)
            )));
        }
        if start > end {
            return Err(PoolError::InvalidInput(
                "range_start must be less than or equal to range_end".to_string(),
            ));
        }
        // Both bounds are at most max_number(), which is a u32
        let narrow = |n: u64| {
            u32::try_from(n).map_err(|_| PoolError::InvalidInput(format!("{n} does not fit the number field")))
        };
        Ok((narrow(start)?, narrow(end)?))
    }
}

fn parse_asn(raw: &str, max: u64) -> Result<u64, ()> {
    match raw.parse::<u64>() {
        Ok(asn) if (1..=max).contains(&asn) => Ok(asn),
        _ => Err(()),
    }
}

impl TryFrom<u8> for ValueFormat {
    type Error = PoolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Type0),
            1 => Ok(Self::Type1),
            2 => Ok(Self::Type2),
            other => Err(PoolError::InvalidInput(format!(
                "format_type must be 0, 1 or 2 (got {other})"
            ))),
        }
    }
}

impl From<ValueFormat> for u8 {
    fn from(format: ValueFormat) -> Self {
        match format {
            ValueFormat::Type0 => 0,
            ValueFormat::Type1 => 1,
            ValueFormat::Type2 => 2,
        }
    }
}

/// Renders `admin:number`.
pub fn format_value(admin: &str, number: u32) -> String {
    format!("{admin}:{number}")
}

/// Splits `admin:number` on the last `:`.
///
/// The admin part is returned as-is, so IPv6 administrators such as
/// `2001:db8::1:100` parse to (`2001:db8::1`, 100). The number may be
/// signed, padded with whitespace or out of any format's range; integers
/// beyond `i64` saturate. Only a missing `:` or a non-integer number fails.
pub fn parse_value(raw: &str) -> Result<(String, i64), PoolError> {
    let invalid = || PoolError::InvalidInput(format!("Invalid RT/RD value format: {raw}"));
    let (admin, number) = raw.rsplit_once(':').ok_or_else(invalid)?;
    let number = match number.trim().parse::<i64>() {
        Ok(n) => n,
        Err(e) => match e.kind() {
            IntErrorKind::PosOverflow => i64::MAX,
            IntErrorKind::NegOverflow => i64::MIN,
            _ => return Err(invalid()),
        },
    };
    Ok((admin.to_string(), number))
}

/// An assigned RT/RD value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RouteValue {
    /// Administrative field (ASN or IP address)
    pub admin: String,

    /// Assigned number
    pub number: u32,
}

impl RouteValue {
    /// Builds a value from its parts.
    pub fn new(admin: impl Into<String>, number: u32) -> Self {
        Self {
            admin: admin.into(),
            number,
        }
    }
}

impl fmt::Display for RouteValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_value(&self.admin, self.number))
    }
}

impl FromStr for RouteValue {
    type Err = PoolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (admin, number) = parse_value(s)?;
        let number = u32::try_from(number)
            .map_err(|_| PoolError::InvalidInput(format!("RT/RD number out of range: {s}")))?;
        Ok(Self { admin, number })
    }
}

impl TryFrom<String> for RouteValue {
    type Error = PoolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RouteValue> for String {
    fn from(value: RouteValue) -> Self {
        value.to_string()
    }
}

impl Resource for RouteValue {
    type Key = i64;

    fn key(&self) -> i64 {
        i64::from(self.number)
    }

    fn conflicts_with(&self, other: &Self) -> bool {
        self.number == other.number
    }
}

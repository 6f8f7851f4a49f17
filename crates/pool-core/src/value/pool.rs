//! Value pools and cursor-based cyclic selection.

use super::format::{RouteValue, ValueFormat, ValueKind, parse_value};
use crate::error::PoolError;
use crate::lifecycle::{Resource, ResourcePool, validate_pool_name};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Creation parameters of a value pool, validated by [`ValuePool::new`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValuePoolSpec {
    /// Unique pool name
    pub name: String,

    /// Purpose of the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Route Target or Route Distinguisher
    #[serde(alias = "pool_type")]
    pub kind: ValueKind,

    /// Encoding type
    #[serde(alias = "format_type")]
    pub format: ValueFormat,

    /// ASN or IP address
    pub admin_value: String,

    /// First assignable number
    pub range_start: u64,

    /// Last assignable number (inclusive)
    pub range_end: u64,
}

/// A named integer range from which RT/RD values are allocated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValuePool {
    /// Unique pool name
    pub name: String,

    /// Purpose of the pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Route Target or Route Distinguisher
    pub kind: ValueKind,

    /// Encoding type
    pub format: ValueFormat,

    /// Administrative field shared by every value of the pool
    pub admin_value: String,

    /// First assignable number
    pub range_start: u32,

    /// Last assignable number (inclusive)
    pub range_end: u32,

    /// Where the next scan starts. A hint only: disjointness never depends on it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u32>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Statistics of a value pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValuePoolStats {
    /// Numbers in `[range_start, range_end]`
    pub total_values: u64,

    /// Live allocations
    pub allocated_count: u64,

    /// `total_values - allocated_count`
    pub available_count: u64,

    /// `admin:start-end`
    pub format_display: String,
}

impl ValuePool {
    /// Validates `spec` against its format and declares the pool.
    pub fn new(spec: ValuePoolSpec, created_at: DateTime<Utc>) -> Result<Self, PoolError> {
        validate_pool_name(&spec.name)?;
        let admin_value = spec.format.validate_admin(&spec.admin_value)?;
        let (range_start, range_end) = spec.format.validate_range(spec.range_start, spec.range_end)?;

        Ok(Self {
            name: spec.name,
            description: spec.description,
            kind: spec.kind,
            format: spec.format,
            admin_value,
            range_start,
            range_end,
            cursor: Some(range_start),
            created_at,
        })
    }

    /// Number of values in the range.
    pub fn total_values(&self) -> u64 {
        u64::from(self.range_end) - u64::from(self.range_start) + 1
    }

    /// Whether `number` lies inside the pool range.
    pub fn contains(&self, number: u32) -> bool {
        (self.range_start..=self.range_end).contains(&number)
    }

    /// Where the next scan starts; an unset or out-of-range cursor means
    /// `range_start`.
    pub fn scan_start(&self) -> u32 {
        self.cursor
            .filter(|&c| self.contains(c))
            .unwrap_or(self.range_start)
    }

    /// `admin:start-end`.
    pub fn format_display(&self) -> String {
        format!("{}:{}-{}", self.admin_value, self.range_start, self.range_end)
    }

    /// Statistics given the live values.
    pub fn statistics<'a>(&self, live: impl IntoIterator<Item = &'a RouteValue>) -> ValuePoolStats {
        let allocated = live
            .into_iter()
            .map(|v| v.number)
            .filter(|&n| self.contains(n))
            .collect::<BTreeSet<u32>>()
            .len() as u64;
        let total = self.total_values();

        ValuePoolStats {
            total_values: total,
            allocated_count: allocated,
            available_count: total.saturating_sub(allocated),
            format_display: self.format_display(),
        }
    }
}

/// Lowest number in `[from, to]` that is not in `occupied`.
fn first_gap(occupied: &BTreeSet<u32>, from: u32, to: u32) -> Option<u32> {
    let mut candidate = u64::from(from);
    for &taken in occupied.range(from..=to) {
        if u64::from(taken) != candidate {
            break;
        }
        candidate += 1;
    }
    if candidate > u64::from(to) {
        return None;
    }
    u32::try_from(candidate).ok()
}

impl ResourcePool for ValuePool {
    type Resource = RouteValue;
    type Request = ();

    fn name(&self) -> &str {
        &self.name
    }

    /// Cyclic scan from the cursor: `[cursor, range_end]` then
    /// `[range_start, cursor)`, returning the first number not taken.
    fn select(&self, _request: &(), taken: &[&RouteValue]) -> Result<RouteValue, PoolError> {
        let occupied: BTreeSet<u32> = taken
            .iter()
            .map(|v| v.number)
            .filter(|&n| self.contains(n))
            .collect();

        let start = self.scan_start();
        let wrapped = || {
            if start > self.range_start {
                first_gap(&occupied, self.range_start, start - 1)
            } else {
                None
            }
        };

        let number = first_gap(&occupied, start, self.range_end)
            .or_else(wrapped)
            .ok_or_else(|| {
                PoolError::Exhausted(format!("Pool '{}' is exhausted - no available values", self.name))
            })?;

        Ok(RouteValue::new(self.admin_value.clone(), number))
    }

    fn record_selection(&mut self, value: &RouteValue) {
        let next = if value.number >= self.range_end {
            self.range_start
        } else {
            value.number + 1
        };
        self.cursor = Some(next);
    }

    fn parse_key(&self, raw: &str) -> Result<<RouteValue as Resource>::Key, PoolError> {
        parse_value(raw).map(|(_, number)| number)
    }
}

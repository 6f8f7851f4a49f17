//! Coalesced interval set over integer addresses.
//!
//! Live blocks are folded into sorted, non-adjacent inclusive ranges so that
//! first-fit search and address counting cost O(n log n) in the number of
//! live blocks, independent of how many candidate blocks the pool contains.

use super::block::AddressBlock;

/// Sorted, coalesced, inclusive `[first, last]` ranges of covered addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoveredRanges {
    ranges: Vec<(u128, u128)>,
}

impl CoveredRanges {
    /// Builds the set from arbitrary (possibly overlapping) ranges.
    pub fn from_ranges(ranges: impl IntoIterator<Item = (u128, u128)>) -> Self {
        let mut sorted: Vec<(u128, u128)> = ranges.into_iter().filter(|(a, b)| a <= b).collect();
        sorted.sort_unstable();

        let mut merged: Vec<(u128, u128)> = Vec::with_capacity(sorted.len());
        for (first, last) in sorted {
            match merged.last_mut() {
                // Overlapping or directly adjacent
                Some((_, prev_last)) if prev_last.checked_add(1).is_none_or(|next| first <= next) => {
                    *prev_last = (*prev_last).max(last);
                }
                _ => merged.push((first, last)),
            }
        }

        Self { ranges: merged }
    }

    /// Builds the set from address blocks.
    pub fn from_blocks<'a>(blocks: impl IntoIterator<Item = &'a AddressBlock>) -> Self {
        Self::from_ranges(blocks.into_iter().map(|b| (b.first(), b.last())))
    }

    /// Coalesced ranges in ascending order.
    pub fn ranges(&self) -> &[(u128, u128)] {
        &self.ranges
    }

    /// Number of covered addresses inside `[first, last]`.
    pub fn count_within(&self, first: u128, last: u128) -> u128 {
        self.ranges
            .iter()
            .filter(|&&(a, b)| a <= last && first <= b)
            .map(|&(a, b)| (b.min(last) - a.max(first)).saturating_add(1))
            .fold(0u128, u128::saturating_add)
    }

    /// Lowest `size`-aligned start `s` with `[s, s + size - 1]` inside
    /// `[first, last]` and disjoint from every covered range.
    ///
    /// `first` must itself be `size`-aligned and `size` a power of two.
    pub fn first_fit(&self, first: u128, last: u128, size: u128) -> Option<u128> {
        debug_assert!(size.is_power_of_two());
        let span = size - 1;
        let mut candidate = first;

        for &(covered_first, covered_last) in &self.ranges {
            if covered_last < candidate {
                continue;
            }
            let candidate_last = candidate.checked_add(span)?;
            if candidate_last > last {
                return None;
            }
            if candidate_last < covered_first {
                return Some(candidate);
            }
            // Skip past the covered range, then round up to the next boundary
            candidate = align_up(covered_last.checked_add(1)?, size)?;
        }

        let candidate_last = candidate.checked_add(span)?;
        (candidate_last <= last).then_some(candidate)
    }
}

fn align_up(value: u128, size: u128) -> Option<u128> {
    let mask = size - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

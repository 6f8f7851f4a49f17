//! Integration tests for the allocation engine
//!
//! Drives both allocators through the public lifecycle functions the way a
//! store would: keep a list of allocations, allocate against it, release by
//! a caller-supplied string.

use chrono::Utc;
use pool_core::{
    AddressBlock, AddressPool, Allocation, AllocationMeta, AllocationStatus, PoolError,
    ResourcePool, RouteValue, ValueFormat, ValueKind, ValuePool, ValuePoolSpec, allocate,
    format_value, parse_value, release,
};

fn address_pool(cidr: &str) -> AddressPool {
    AddressPool::new("scenario", cidr, None, None, Utc::now()).expect("Failed to create pool")
}

fn value_pool(start: u64, end: u64) -> ValuePool {
    let spec = ValuePoolSpec {
        name: "l3vpn-rt".to_string(),
        description: Some("customer VRFs".to_string()),
        kind: ValueKind::Rt,
        format: ValueFormat::Type0,
        admin_value: "65000".to_string(),
        range_start: start,
        range_end: end,
    };
    ValuePool::new(spec, Utc::now()).expect("Failed to create pool")
}

fn allocate_block(pool: &mut AddressPool, allocations: &mut Vec<Allocation<AddressBlock>>, prefix: u8) -> String {
    let allocation = allocate(pool, &prefix, allocations, AllocationMeta::default(), Utc::now())
        .expect("Failed to allocate block");
    let cidr = allocation.resource.to_string();
    allocations.push(allocation);
    cidr
}

fn allocate_value(pool: &mut ValuePool, allocations: &mut Vec<Allocation<RouteValue>>) -> Result<String, PoolError> {
    let allocation = allocate(pool, &(), allocations, AllocationMeta::default(), Utc::now())?;
    let value = allocation.resource.to_string();
    allocations.push(allocation);
    Ok(value)
}

#[test]
fn test_ipv4_lowest_fit_reclaim() {
    // Setup
    let mut pool = address_pool("10.0.0.0/24");
    let mut allocations = Vec::new();

    // Execute & Assert
    assert_eq!(allocate_block(&mut pool, &mut allocations, 30), "10.0.0.0/30");
    assert_eq!(allocate_block(&mut pool, &mut allocations, 30), "10.0.0.4/30");

    let key = pool.parse_key("10.0.0.0/30").expect("Failed to parse key");
    release(&mut allocations, &key, Utc::now()).expect("Failed to release");

    assert_eq!(allocate_block(&mut pool, &mut allocations, 30), "10.0.0.0/30");
    assert_eq!(allocations.iter().filter(|a| a.is_live()).count(), 2);
}

#[test]
fn test_ipv6_block_has_no_broadcast() {
    let mut pool = address_pool("2001:db8::/64");
    let mut allocations = Vec::new();

    assert_eq!(allocate_block(&mut pool, &mut allocations, 127), "2001:db8::/127");
    let block = &allocations[0].resource;
    assert!(block.broadcast_address().is_none());
    assert!(block.subnet_mask().is_none());
    assert_eq!(block.address_count(), 2);
}

#[test]
fn test_ipv4_block_exposes_mask_and_broadcast() {
    let mut pool = address_pool("10.0.0.0/24");
    let mut allocations = Vec::new();

    allocate_block(&mut pool, &mut allocations, 30);
    let block = &allocations[0].resource;
    assert_eq!(block.subnet_mask().map(|m| m.to_string()).as_deref(), Some("255.255.255.252"));
    assert_eq!(block.broadcast_address().map(|b| b.to_string()).as_deref(), Some("10.0.0.3"));
}

#[test]
fn test_value_pool_exhausts_then_reuses_gap() {
    // Setup
    let mut pool = value_pool(100, 102);
    let mut allocations = Vec::new();

    // Execute: fill the range
    for expected in ["65000:100", "65000:101", "65000:102"] {
        assert_eq!(allocate_value(&mut pool, &mut allocations).unwrap(), expected);
    }
    let cursor = pool.cursor;
    let err = allocate_value(&mut pool, &mut allocations).unwrap_err();
    assert!(matches!(err, PoolError::Exhausted(_)));
    assert_eq!(pool.cursor, cursor);
    assert_eq!(allocations.len(), 3);

    // Execute: free the middle value and allocate again
    let key = pool.parse_key("65000:101").expect("Failed to parse key");
    release(&mut allocations, &key, Utc::now()).expect("Failed to release");

    // Assert: cursor wrapped past 102 back to 100; 101 is the first gap
    assert_eq!(allocate_value(&mut pool, &mut allocations).unwrap(), "65000:101");
}

#[test]
fn test_single_block_pool() {
    let mut pool = address_pool("10.0.0.0/30");
    let mut allocations = Vec::new();

    assert_eq!(allocate_block(&mut pool, &mut allocations, 30), "10.0.0.0/30");
    let err = allocate(&mut pool, &30, &allocations, AllocationMeta::default(), Utc::now()).unwrap_err();
    assert!(matches!(err, PoolError::Exhausted(_)));
}

#[test]
fn test_release_with_host_bits_matches_canonical() {
    let mut pool = address_pool("10.0.0.0/24");
    let mut allocations = Vec::new();
    allocate_block(&mut pool, &mut allocations, 30);
    allocate_block(&mut pool, &mut allocations, 30);

    let key = pool.parse_key("10.0.0.6/30").expect("Failed to parse key");
    let released = release(&mut allocations, &key, Utc::now()).expect("Failed to release");
    assert_eq!(released.resource.to_string(), "10.0.0.4/30");
    assert_eq!(released.status, AllocationStatus::Released);
}

#[test]
fn test_release_is_idempotent_not_found() {
    let mut pool = address_pool("10.0.0.0/24");
    let mut allocations = Vec::new();
    allocate_block(&mut pool, &mut allocations, 29);

    let key = pool.parse_key("10.0.0.0/29").expect("Failed to parse key");
    release(&mut allocations, &key, Utc::now()).expect("Failed to release");
    let before = allocations.clone();

    // Already released
    let err = release(&mut allocations, &key, Utc::now()).unwrap_err();
    assert!(matches!(err, PoolError::NotFound(_)));

    // Never allocated
    let other = pool.parse_key("10.0.0.128/25").expect("Failed to parse key");
    let err = release(&mut allocations, &other, Utc::now()).unwrap_err();
    assert!(matches!(err, PoolError::NotFound(_)));

    assert_eq!(allocations, before);
}

#[test]
fn test_mixed_prefixes_stay_disjoint_and_aligned() {
    let mut pool = address_pool("10.20.0.0/22");
    let mut allocations: Vec<Allocation<AddressBlock>> = Vec::new();

    for (i, prefix) in [32u8, 30, 26, 32, 24, 29, 31, 28, 32, 25].into_iter().enumerate() {
        allocate_block(&mut pool, &mut allocations, prefix);
        // Release every third allocation to leave holes for later requests
        if i % 3 == 2 {
            let key = allocations[i - 1].resource.clone();
            release(&mut allocations, &key, Utc::now()).expect("Failed to release");
        }
    }

    let live: Vec<&AddressBlock> = allocations.iter().filter(|a| a.is_live()).map(|a| &a.resource).collect();
    for (i, a) in live.iter().enumerate() {
        assert_eq!(a.first() % a.address_count(), 0, "{a} is misaligned");
        assert!(pool.cidr.contains_block(a));
        for b in &live[i + 1..] {
            assert!(!a.overlaps(b), "{a} overlaps {b}");
        }
    }
}

#[test]
fn test_first_fit_prefers_lowest_hole() {
    let mut pool = address_pool("192.168.0.0/24");
    let mut allocations = Vec::new();
    for _ in 0..4 {
        allocate_block(&mut pool, &mut allocations, 28);
    }
    let key = pool.parse_key("192.168.0.16/28").expect("Failed to parse key");
    release(&mut allocations, &key, Utc::now()).expect("Failed to release");

    // A /29 fits in the freed /28 before untouched space at .64
    assert_eq!(allocate_block(&mut pool, &mut allocations, 29), "192.168.0.16/29");
    assert_eq!(allocate_block(&mut pool, &mut allocations, 29), "192.168.0.24/29");
    assert_eq!(allocate_block(&mut pool, &mut allocations, 29), "192.168.0.64/29");
}

#[test]
fn test_value_round_trip_across_formats() {
    for (admin, number) in [("65000", 7u32), ("192.0.2.1", 65_535), ("2001:db8::1", 0), ("4200000000", 9)] {
        assert_eq!(parse_value(&format_value(admin, number)).unwrap(), (admin.to_string(), i64::from(number)));
    }
}

#[test]
fn test_value_statistics_track_live_only() {
    let mut pool = value_pool(1, 10);
    let mut allocations = Vec::new();
    for _ in 0..4 {
        allocate_value(&mut pool, &mut allocations).unwrap();
    }
    release(&mut allocations, &2, Utc::now()).expect("Failed to release");

    let stats = pool.statistics(allocations.iter().filter(|a| a.is_live()).map(|a| &a.resource));
    assert_eq!(stats.total_values, 10);
    assert_eq!(stats.allocated_count, 3);
    assert_eq!(stats.available_count, 7);
    assert_eq!(stats.format_display, "65000:1-10");
}

//! Facade API behavior: membership discipline, miss semantics,
//! add_all abort, capacity.

use largeset::prelude::*;

fn sorted_ints(members: Vec<Value>) -> Vec<i64> {
    let mut out: Vec<i64> = members.iter().map(|v| v.as_int().unwrap()).collect();
    out.sort_unstable();
    out
}

// ============================================================================
// Unique membership
// ============================================================================

#[test]
fn duplicate_add_is_rejected_and_size_unchanged() {
    let mut set = LargeSet::create("s").unwrap();
    set.add("a").unwrap();
    set.add("b").unwrap();

    let err = set.add("a").unwrap_err();
    assert!(err.is_duplicate());

    assert_eq!(set.len().unwrap(), 2);
    assert!(set.exists("a").unwrap());
    assert!(!set.exists("c").unwrap());
}

#[test]
fn add_then_exists_then_remove() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(42).unwrap();
    assert!(set.exists(42).unwrap());

    set.remove(42).unwrap();
    assert!(!set.exists(42).unwrap());
    assert_eq!(set.len().unwrap(), 0);
}

#[test]
fn members_of_different_types_coexist() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(1).unwrap();
    set.add(1.0).unwrap();
    set.add("1").unwrap();
    assert_eq!(set.len().unwrap(), 3);
    assert!(set.exists(1).unwrap());
    assert!(set.exists(1.0).unwrap());
    assert!(set.exists("1").unwrap());
}

// ============================================================================
// Miss semantics
// ============================================================================

#[test]
fn get_miss_is_an_error_exists_miss_is_not() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(1).unwrap();

    let err = set.get(2).unwrap_err();
    assert!(err.is_not_found());

    assert!(!set.exists(2).unwrap());
}

#[test]
fn remove_miss_is_an_error_and_changes_nothing() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(1).unwrap();

    let err = set.remove(9).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(set.len().unwrap(), 1);
}

#[test]
fn remove_then_readd_succeeds() {
    let mut set = LargeSet::create("s").unwrap();
    set.add_all(["a", "b", "c"]).unwrap();

    set.remove("b").unwrap();
    let members: Vec<String> = set
        .scan()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    let mut members = members;
    members.sort();
    assert_eq!(members, vec!["a", "c"]);

    set.add("b").unwrap();
    assert_eq!(set.len().unwrap(), 3);
}

// ============================================================================
// add_all
// ============================================================================

#[test]
fn add_all_aborts_at_first_failure_keeping_the_prefix() {
    let mut set = LargeSet::create("s").unwrap();
    let err = set.add_all([10, 20, 30, 10]).unwrap_err();
    assert!(err.is_duplicate());
    // The failing element's index is in the diagnostic.
    assert!(err.to_string().contains("element 3"));

    assert_eq!(set.len().unwrap(), 3);
    assert_eq!(sorted_ints(set.scan().unwrap()), vec![10, 20, 30]);
}

#[test]
fn add_all_of_disjoint_members_adds_everything() {
    let mut set = LargeSet::create("s").unwrap();
    set.add_all(0..50).unwrap();
    assert_eq!(set.len().unwrap(), 50);
    assert_eq!(sorted_ints(set.scan().unwrap()), (0..50).collect::<Vec<_>>());
}

// ============================================================================
// take and structured members
// ============================================================================

#[test]
fn take_returns_the_removed_member() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(json!({"id": "a", "n": 1})).unwrap();
    let taken = set.take(json!({"id": "a", "n": 1})).unwrap();
    assert!(taken.as_object().is_some());
    assert!(set.is_empty().unwrap());
}

#[test]
fn structured_members_key_on_canonical_rendering_by_default() {
    let mut set = LargeSet::create("s").unwrap();
    set.add(json!({"x": 1, "y": 2})).unwrap();
    // Same object, different field order: same canonical key.
    let err = set.add(json!({"y": 2, "x": 1})).unwrap_err();
    assert!(err.is_duplicate());
}

// ============================================================================
// Capacity and config
// ============================================================================

#[test]
fn capacity_is_stored_not_enforced() {
    let mut set = LargeSet::create("s").unwrap();
    set.set_capacity(3).unwrap();
    assert_eq!(set.capacity().unwrap(), 3);

    // Advisory only: inserts beyond the ceiling still succeed.
    set.add_all(0..10).unwrap();
    assert_eq!(set.len().unwrap(), 10);
}

#[test]
fn zero_capacity_is_rejected() {
    let mut set = LargeSet::create("s").unwrap();
    let err = set.set_capacity(0).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn config_reflects_counters() {
    let mut set = LargeSet::create("s").unwrap();
    set.add_all(0..5).unwrap();
    let cfg = set.config().unwrap();
    let m = cfg.as_object().unwrap();
    assert_eq!(m["ItemCount"], Value::Int(5));
    assert_eq!(m["TotalCount"], Value::Int(5));
}

// ============================================================================
// Bin name rules
// ============================================================================

#[test]
fn bin_names_are_validated() {
    assert!(LargeSet::create("").is_err());
    assert!(LargeSet::create("muchtoolongforabinname").is_err());
    assert!(LargeSet::create("exactly14chars").is_ok());
}

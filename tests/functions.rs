//! User functions: key extraction, transform pairs, filters, and the
//! create-time settings hook.

use largeset::prelude::*;
use largeset_core::LdtError;

fn id_module() -> UserModule {
    UserModule::new().with_key_function("key_id", |v| {
        v.as_object()
            .and_then(|o| o.get("id").cloned())
            .ok_or_else(|| LdtError::InputParam {
                reason: "member has no id field".to_string(),
            })
    })
}

fn wrap_module() -> UserModule {
    UserModule::new()
        .with_transform("wrap", |v| Ok(Value::Array(vec![v])))
        .with_transform("unwrap", |v| match v {
            Value::Array(mut a) if a.len() == 1 => Ok(a.remove(0)),
            other => Ok(other),
        })
}

// ============================================================================
// Key extraction
// ============================================================================

#[test]
fn key_function_defines_uniqueness() {
    let mut set = LargeSet::builder()
        .module("ids", id_module())
        .key_function("key_id")
        .create("s")
        .unwrap();

    set.add(json!({"id": "x", "v": 1})).unwrap();
    // Different payload, same key: rejected.
    let err = set.add(json!({"id": "x", "v": 2})).unwrap_err();
    assert!(err.is_duplicate());

    set.add(json!({"id": "y", "v": 1})).unwrap();
    assert_eq!(set.len().unwrap(), 2);
}

#[test]
fn lookup_by_extracted_key() {
    let mut set = LargeSet::builder()
        .module("ids", id_module())
        .key_function("key_id")
        .create("s")
        .unwrap();

    set.add(json!({"id": "x", "v": 1})).unwrap();

    // The key itself is atomic, so it can be passed directly.
    assert!(set.exists("x").unwrap());
    let member = set.get("x").unwrap();
    assert_eq!(
        member.as_object().unwrap().get("v"),
        Some(&Value::Int(1))
    );

    set.remove("x").unwrap();
    assert!(!set.exists("x").unwrap());
}

// ============================================================================
// Transform pair
// ============================================================================

#[test]
fn transform_pair_is_invisible_to_readers() {
    let mut set = LargeSet::builder()
        .module("codec", wrap_module())
        .transform_pair("wrap", "unwrap")
        .threshold(4)
        .create("s")
        .unwrap();

    // Enough members to cross the rehash, so transformed storage flows
    // through the regular phase too.
    for i in 0..10 {
        set.add(i).unwrap();
    }
    assert_eq!(set.len().unwrap(), 10);
    assert!(set.exists(7).unwrap());
    assert_eq!(set.get(7).unwrap(), Value::Int(7));

    let mut members: Vec<i64> = set
        .scan()
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    members.sort_unstable();
    assert_eq!(members, (0..10).collect::<Vec<_>>());

    assert_eq!(set.take(3).unwrap(), Value::Int(3));
}

// ============================================================================
// Filters
// ============================================================================

fn over_module() -> UserModule {
    UserModule::new().with_filter("over", |v, args| {
        let floor = args.and_then(Value::as_int).unwrap_or(0);
        Ok(v.as_int().map(|i| i > floor).unwrap_or(false))
    })
}

#[test]
fn scan_filter_selects_a_subset() {
    let mut set = LargeSet::builder()
        .module("filters", over_module())
        .create("s")
        .unwrap();
    set.add_all(0..10).unwrap();

    let filter = FilterSpec::with_args("over", Value::Int(6));
    let mut hits: Vec<i64> = set
        .scan_filtered(&filter)
        .unwrap()
        .iter()
        .map(|v| v.as_int().unwrap())
        .collect();
    hits.sort_unstable();
    assert_eq!(hits, vec![7, 8, 9]);
}

#[test]
fn get_filter_veto_reads_as_not_found() {
    let mut set = LargeSet::builder()
        .module("filters", over_module())
        .create("s")
        .unwrap();
    set.add(5).unwrap();

    let filter = FilterSpec::with_args("over", Value::Int(10));
    let err = set.get_filtered(5, &filter).unwrap_err();
    assert!(err.is_not_found());

    // Without the filter the member is there.
    assert_eq!(set.get(5).unwrap(), Value::Int(5));
}

#[test]
fn unknown_filter_name_is_reported() {
    let mut set = LargeSet::builder()
        .module("filters", over_module())
        .create("s")
        .unwrap();
    set.add(1).unwrap();

    let err = set.scan_filtered(&FilterSpec::named("missing")).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

// ============================================================================
// Settings hook
// ============================================================================

#[test]
fn settings_hook_tunes_the_set_at_create_time() {
    let module = UserModule::new().with_settings(|m| {
        m.modulo = 7;
        m.threshold = 3;
    });
    let mut set = LargeSet::builder().module("tuning", module).create("s").unwrap();

    let cfg = set.config().unwrap();
    let m = cfg.as_object().unwrap();
    assert_eq!(m["Modulo"], Value::Int(7));
    assert_eq!(m["Threshold"], Value::Int(3));
}

// ============================================================================
// Packaged settings
// ============================================================================

#[test]
fn debug_package_shrinks_every_bound() {
    let mut set = LargeSet::builder().package("DebugModeList").create("s").unwrap();
    let cfg = set.config().unwrap();
    let m = cfg.as_object().unwrap();
    assert_eq!(m["Modulo"], Value::Int(7));
    assert_eq!(m["Threshold"], Value::Int(4));
    assert_eq!(m["HashCellMaxList"], Value::Int(2));

    // Everything still works at those sizes.
    set.add_all(0..30).unwrap();
    assert_eq!(set.len().unwrap(), 30);
}

#[test]
fn unknown_package_is_rejected() {
    let err = LargeSet::builder()
        .package("NoSuchPackage")
        .create("s")
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

//! Engine-level contracts: descriptor integrity on disk, version
//! gating, record flags, and sub-record hygiene.

use largeset::prelude::*;
use largeset_core::descriptor::{LsetDescriptor, LDT_VERSION};
use largeset_engine::Engine as RawEngine;

fn fixture() -> (MemoryHost, UserModuleRegistry, TopRecord) {
    let mut host = MemoryHost::new();
    let rec = host.new_record();
    (host, UserModuleRegistry::new(), rec)
}

// ============================================================================
// Descriptor on disk
// ============================================================================

#[test]
fn descriptor_in_the_bin_is_valid_and_named() {
    let (mut host, registry, mut rec) = fixture();
    let mut eng = RawEngine::new(&mut host, &registry);
    eng.create(&mut rec, "s", None).unwrap();

    let desc = LsetDescriptor::from_value("s", rec.bin("s").unwrap()).unwrap();
    assert_eq!(desc.props.bin_name, "s");
    assert_eq!(desc.props.version, LDT_VERSION);
    assert_eq!(desc.props.item_count, 0);
    assert!(desc.props.create_time > 0);
}

#[test]
fn counters_track_inserts_and_removals() {
    let (mut host, registry, mut rec) = fixture();
    let mut eng = RawEngine::new(&mut host, &registry);
    for i in 0..6 {
        eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
    }
    eng.remove(&mut rec, "s", &Value::Int(0), None, false).unwrap();

    let desc = LsetDescriptor::from_value("s", rec.bin("s").unwrap()).unwrap();
    assert_eq!(desc.props.item_count, 5);
    // Total count records insertions, not the current population.
    assert_eq!(desc.map.total_count, 6);
    assert_eq!(eng.size(&rec, "s").unwrap(), 5);
}

#[test]
fn newer_stored_version_is_refused() {
    let (mut host, registry, mut rec) = fixture();
    {
        let mut eng = RawEngine::new(&mut host, &registry);
        eng.create(&mut rec, "s", None).unwrap();
    }

    // Simulate a record written by a future engine.
    let Value::Array(mut parts) = rec.bin("s").unwrap().clone() else {
        panic!("descriptor is not a two-map list");
    };
    if let Value::Object(props) = &mut parts[0] {
        props.insert("V".into(), Value::Int(LDT_VERSION + 1));
    }
    rec.set_bin("s", Value::Array(parts));

    let mut eng = RawEngine::new(&mut host, &registry);
    let err = eng.size(&rec, "s").unwrap_err();
    assert_eq!(err.error_code(), "VersionMismatch");
}

#[test]
fn damaged_bin_is_refused_even_on_the_create_path() {
    let (mut host, registry, mut rec) = fixture();
    rec.set_bin("s", Value::String("junk".into()));
    host.update(&mut rec).unwrap();

    let mut eng = RawEngine::new(&mut host, &registry);
    let err = eng.add(&mut rec, "s", Value::Int(1), None).unwrap_err();
    assert_eq!(err.error_code(), "BinDamaged");
}

// ============================================================================
// Record flags and properties
// ============================================================================

#[test]
fn bins_carry_their_flags_after_every_write() {
    let (mut host, registry, mut rec) = fixture();
    let mut eng = RawEngine::new(&mut host, &registry);
    let spec = json!({"SetTypeStore": "record", "Threshold": 3});
    eng.create(&mut rec, "s", Some(&Value::from(spec))).unwrap();
    for i in 0..8 {
        eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
    }

    assert!(rec.is_ldt_record());
    // The user bin is restricted but visible.
    let user = rec.bin_flags("s");
    assert!(user.restricted && user.control && !user.hidden);
    // Every bucket bin is hidden, including those written by the rehash.
    for name in rec
        .bin_names()
        .filter(|n| n.starts_with("LSetBin_"))
        .map(str::to_string)
        .collect::<Vec<_>>()
    {
        assert!(rec.bin_flags(&name).hidden, "{} must stay hidden", name);
    }
    // So is the record property bin.
    assert!(rec.bin_flags("LDTCONTROLBIN").hidden);
}

#[test]
fn record_properties_count_collections() {
    let (mut host, registry, mut rec) = fixture();
    let mut eng = RawEngine::new(&mut host, &registry);
    eng.create(&mut rec, "one", None).unwrap();
    eng.create(&mut rec, "two", None).unwrap();
    assert!(rec.bin("LDTCONTROLBIN").is_some());

    eng.destroy(&mut rec, "one").unwrap();
    assert!(rec.bin("LDTCONTROLBIN").is_some());
    eng.destroy(&mut rec, "two").unwrap();
    // The property bin leaves with the last collection.
    assert!(rec.bin("LDTCONTROLBIN").is_none());
}

// ============================================================================
// Sub-record hygiene
// ============================================================================

#[test]
fn failed_insert_persists_no_sub_record_changes() {
    let (mut host, registry, mut rec) = fixture();
    let spec = json!({"Modulo": 1, "Threshold": 2, "HashCellMaxList": 1});
    {
        let mut eng = RawEngine::new(&mut host, &registry);
        eng.create(&mut rec, "s", Some(&Value::from(spec))).unwrap();
        for i in 0..4 {
            eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
        }
    }
    let updates_before = host.subrec_update_count();

    // A duplicate insert travels into the sub-record before failing.
    let mut eng = RawEngine::new(&mut host, &registry);
    let err = eng.add(&mut rec, "s", Value::Int(2), None).unwrap_err();
    assert_eq!(err.error_code(), "UniqueKeyViolation");
    assert_eq!(host.subrec_update_count(), updates_before);
}

#[test]
fn reads_leave_sub_records_clean() {
    let (mut host, registry, mut rec) = fixture();
    let spec = json!({"Modulo": 1, "Threshold": 2, "HashCellMaxList": 1});
    {
        let mut eng = RawEngine::new(&mut host, &registry);
        eng.create(&mut rec, "s", Some(&Value::from(spec))).unwrap();
        for i in 0..5 {
            eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
        }
    }
    let updates_before = host.subrec_update_count();

    let mut eng = RawEngine::new(&mut host, &registry);
    assert!(eng.exists(&rec, "s", &Value::Int(3)).unwrap());
    let members = eng.scan(&rec, "s", None).unwrap();
    assert_eq!(members.len(), 5);
    assert_eq!(host.subrec_update_count(), updates_before);
}

#[test]
fn sub_records_are_stamped_with_the_parent() {
    let (mut host, registry, mut rec) = fixture();
    let spec = json!({"Modulo": 1, "Threshold": 2, "HashCellMaxList": 1});
    let mut eng = RawEngine::new(&mut host, &registry);
    eng.create(&mut rec, "s", Some(&Value::from(spec))).unwrap();
    for i in 0..4 {
        eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
    }

    let desc = LsetDescriptor::from_value("s", rec.bin("s").unwrap()).unwrap();
    let esr = desc.props.esr_digest.expect("sub-records imply an ESR");
    assert!(host.contains_subrec(&esr));
    assert!(desc.props.subrec_count >= 1);
}

#[test]
fn dump_describes_a_grown_set() {
    let (mut host, registry, mut rec) = fixture();
    let spec = json!({"Modulo": 3, "Threshold": 2, "HashCellMaxList": 1});
    let mut eng = RawEngine::new(&mut host, &registry);
    eng.create(&mut rec, "s", Some(&Value::from(spec))).unwrap();
    for i in 0..9 {
        eng.add(&mut rec, "s", Value::Int(i), None).unwrap();
    }

    let text = eng.dump(&rec, "s").unwrap();
    assert!(text.contains("state=Regular"));
    assert!(text.contains("cell["));
    assert!(text.contains("esr:"));
}

//! Record layout: buckets as numbered hidden bins of the top record.
//!
//! Bucket `i` lives in hidden bin `LSetBin_<i>`; the user's named bin
//! holds only the control descriptor. In the compact phase every member
//! sits in bin 0. Crossing the threshold allocates all `modulo` bins and
//! redistributes. Capacity is bounded by record size, and the reserved
//! bin names allow only one record-layout set per record.

use crate::hash::bucket_for;
use crate::record::{BinFlags, TopRecord};
use crate::search::find_position;
use largeset_core::descriptor::{LsetMap, StoreState};
use largeset_core::error::{LdtError, Result};
use largeset_core::functions::FunctionContext;
use largeset_core::value::Value;
use tracing::debug;

/// Prefix reserved for bucket bins. Reserving the whole prefix is what
/// enforces the one-record-layout-set-per-record rule.
pub(crate) const BUCKET_BIN_PREFIX: &str = "LSetBin_";

fn bucket_bin(index: usize) -> String {
    format!("{}{}", BUCKET_BIN_PREFIX, index)
}

/// Whether the record already carries bucket bins of a record-layout
/// set.
pub(crate) fn has_bucket_bins(rec: &TopRecord) -> bool {
    rec.bin_names().any(|n| n.starts_with(BUCKET_BIN_PREFIX))
}

/// Set up the compact phase: a single empty bucket in bin 0.
pub(crate) fn init_compact(rec: &mut TopRecord) {
    write_bucket(rec, 0, Vec::new());
}

fn read_bucket(rec: &TopRecord, index: usize) -> Result<Vec<Value>> {
    match rec.bin(&bucket_bin(index)) {
        Some(Value::Array(list)) => Ok(list.clone()),
        Some(_) => Err(LdtError::internal(format!(
            "bucket bin {} holds a non-list value",
            index
        ))),
        None => Err(LdtError::internal(format!("bucket bin {} is missing", index))),
    }
}

fn write_bucket(rec: &mut TopRecord, index: usize, list: Vec<Value>) {
    let name = bucket_bin(index);
    rec.set_bin(&name, Value::Array(list));
    // The host forgets flags on assignment; re-assert every time.
    rec.set_bin_flags(&name, BinFlags::hidden_bin());
}

/// Insert a stored value, rehashing first when this insert reaches the
/// threshold.
pub(crate) fn insert(
    rec: &mut TopRecord,
    map: &mut LsetMap,
    stored: Value,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<()> {
    if map.store_state == StoreState::Compact {
        let list = read_bucket(rec, 0)?;
        if find_position(&list, key, fctx)?.is_some() {
            return Err(LdtError::UniqueKeyViolation {
                key: key.canonical_string(),
            });
        }
        if map.total_count + 1 >= map.threshold as u64 {
            rehash(rec, map, fctx)?;
            return insert_regular(rec, map, stored, key, fctx);
        }
        let mut list = list;
        list.push(stored);
        write_bucket(rec, 0, list);
        return Ok(());
    }
    insert_regular(rec, map, stored, key, fctx)
}

fn insert_regular(
    rec: &mut TopRecord,
    map: &LsetMap,
    stored: Value,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<()> {
    let index = bucket_for(key, map.modulo, StoreState::Regular)?;
    let mut list = read_bucket(rec, index)?;
    if find_position(&list, key, fctx)?.is_some() {
        return Err(LdtError::UniqueKeyViolation {
            key: key.canonical_string(),
        });
    }
    list.push(stored);
    write_bucket(rec, index, list);
    Ok(())
}

/// Redistribute the compact bucket across all `modulo` bins.
fn rehash(rec: &mut TopRecord, map: &mut LsetMap, fctx: &FunctionContext<'_>) -> Result<()> {
    let snapshot = read_bucket(rec, 0)?;
    debug!(members = snapshot.len(), modulo = map.modulo, "rehashing record-layout set");
    for index in 0..map.modulo {
        write_bucket(rec, index, Vec::new());
    }
    map.store_state = StoreState::Regular;
    for stored in snapshot {
        let live = fctx.read_form(&stored)?;
        let key = fctx.extract_key(&live)?;
        let index = bucket_for(&key, map.modulo, StoreState::Regular)?;
        let mut list = read_bucket(rec, index)?;
        list.push(stored);
        write_bucket(rec, index, list);
    }
    Ok(())
}

/// Find a member by key; the live value is returned only when it passes
/// the caller's filter.
pub(crate) fn find(
    rec: &TopRecord,
    map: &LsetMap,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    let index = bucket_for(key, map.modulo, map.store_state)?;
    let list = read_bucket(rec, index)?;
    let Some(i) = find_position(&list, key, fctx)? else {
        return Ok(None);
    };
    let live = fctx.read_form(&list[i])?;
    if fctx.passes_filter(&live)? {
        Ok(Some(live))
    } else {
        Ok(None)
    }
}

/// Remove a member by key with swap-with-last; returns the removed live
/// value. A filter veto counts as not found.
pub(crate) fn remove_member(
    rec: &mut TopRecord,
    map: &LsetMap,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    let index = bucket_for(key, map.modulo, map.store_state)?;
    let mut list = read_bucket(rec, index)?;
    let Some(i) = find_position(&list, key, fctx)? else {
        return Ok(None);
    };
    let live = fctx.read_form(&list[i])?;
    if !fctx.passes_filter(&live)? {
        return Ok(None);
    }
    list.swap_remove(i);
    write_bucket(rec, index, list);
    Ok(Some(live))
}

/// All members (untransformed, filtered), bucket by bucket.
pub(crate) fn scan(
    rec: &TopRecord,
    map: &LsetMap,
    fctx: &FunctionContext<'_>,
) -> Result<Vec<Value>> {
    let buckets = match map.store_state {
        StoreState::Compact => 1,
        StoreState::Regular => map.modulo,
    };
    let mut out = Vec::new();
    for index in 0..buckets {
        for stored in read_bucket(rec, index)? {
            if stored.is_null() {
                continue;
            }
            let live = fctx.read_form(&stored)?;
            if fctx.passes_filter(&live)? {
                out.push(live);
            }
        }
    }
    Ok(out)
}

/// Member count per bucket, for diagnostics.
pub(crate) fn bucket_sizes(rec: &TopRecord, map: &LsetMap) -> Result<Vec<usize>> {
    let buckets = match map.store_state {
        StoreState::Compact => 1,
        StoreState::Regular => map.modulo,
    };
    (0..buckets)
        .map(|i| read_bucket(rec, i).map(|l| l.len()))
        .collect()
}

/// Null out every bucket bin.
pub(crate) fn destroy(rec: &mut TopRecord) {
    let buckets: Vec<String> = rec
        .bin_names()
        .filter(|n| n.starts_with(BUCKET_BIN_PREFIX))
        .map(str::to_string)
        .collect();
    for name in buckets {
        rec.remove_bin(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use largeset_core::digest::Digest;

    fn fixture() -> (TopRecord, LsetMap) {
        let mut rec = TopRecord::new(Digest::from_bytes([1; 20]));
        let map = LsetMap {
            modulo: 7,
            threshold: 100,
            compact_list: None,
            ..LsetMap::default()
        };
        init_compact(&mut rec);
        (rec, map)
    }

    fn add(rec: &mut TopRecord, map: &mut LsetMap, v: i64) -> Result<()> {
        let fctx = FunctionContext::default();
        let value = Value::Int(v);
        insert(rec, map, value.clone(), &value, &fctx)?;
        map.total_count += 1;
        Ok(())
    }

    #[test]
    fn compact_inserts_land_in_bucket_zero() {
        let (mut rec, mut map) = fixture();
        for i in 0..5 {
            add(&mut rec, &mut map, i).unwrap();
        }
        assert_eq!(bucket_sizes(&rec, &map).unwrap(), vec![5]);
        assert!(rec.bin_flags("LSetBin_0").hidden);
    }

    #[test]
    fn rehash_redistributes_and_preserves_members() {
        let (mut rec, mut map) = fixture();
        map.threshold = 4;
        for i in 0..10 {
            add(&mut rec, &mut map, i).unwrap();
        }
        assert_eq!(map.store_state, StoreState::Regular);
        let sizes = bucket_sizes(&rec, &map).unwrap();
        assert_eq!(sizes.len(), 7);
        assert_eq!(sizes.iter().sum::<usize>(), 10);

        let fctx = FunctionContext::default();
        let mut members = scan(&rec, &map, &fctx).unwrap();
        members.sort_by_key(|v| v.as_int().unwrap());
        assert_eq!(members, (0..10).map(Value::Int).collect::<Vec<_>>());
    }

    #[test]
    fn duplicate_is_rejected_in_both_phases() {
        let (mut rec, mut map) = fixture();
        add(&mut rec, &mut map, 1).unwrap();
        assert!(add(&mut rec, &mut map, 1).is_err());

        map.threshold = 3;
        add(&mut rec, &mut map, 2).unwrap();
        add(&mut rec, &mut map, 3).unwrap(); // third insert triggers rehash
        assert_eq!(map.store_state, StoreState::Regular);
        assert!(add(&mut rec, &mut map, 3).is_err());
    }

    #[test]
    fn remove_uses_swap_with_last() {
        let (mut rec, mut map) = fixture();
        for i in 0..4 {
            add(&mut rec, &mut map, i).unwrap();
        }
        let fctx = FunctionContext::default();
        let removed = remove_member(&mut rec, &map, &Value::Int(1), &fctx).unwrap();
        assert_eq!(removed, Some(Value::Int(1)));
        assert_eq!(bucket_sizes(&rec, &map).unwrap(), vec![3]);
        assert_eq!(
            remove_member(&mut rec, &map, &Value::Int(99), &fctx).unwrap(),
            None
        );
    }

    #[test]
    fn destroy_drops_every_bucket_bin() {
        let (mut rec, mut map) = fixture();
        map.threshold = 2;
        for i in 0..5 {
            add(&mut rec, &mut map, i).unwrap();
        }
        assert!(has_bucket_bins(&rec));
        destroy(&mut rec);
        assert!(!has_bucket_bins(&rec));
    }
}

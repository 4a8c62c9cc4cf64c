//! Sub-record layout: a hash directory in the descriptor, overflow in
//! digest-keyed child records.
//!
//! In the compact phase members live in the descriptor's own compact
//! list. Crossing the threshold replaces the list with a directory of
//! `modulo` cell anchors and redistributes through the cell engine,
//! which in turn promotes crowded cells into sub-records. Capacity is
//! effectively unbounded; the existence sub-record ties every child's
//! lifetime to the set.

use crate::cell::{cell_find, cell_insert, cell_remove, cell_scan};
use crate::hash::bucket_for;
use crate::host::Host;
use crate::record::TopRecord;
use crate::search::find_position;
use crate::subrec::SubRecContext;
use largeset_core::descriptor::{CellAnchor, LsetMap, PropertyMap, StoreState};
use largeset_core::error::{LdtError, Result};
use largeset_core::functions::FunctionContext;
use largeset_core::value::Value;
use tracing::debug;

fn compact_list(map: &LsetMap) -> Result<&Vec<Value>> {
    map.compact_list
        .as_ref()
        .ok_or_else(|| LdtError::internal("compact set has no compact list"))
}

fn take_directory(map: &mut LsetMap) -> Result<Vec<CellAnchor>> {
    map.hash_directory
        .take()
        .ok_or_else(|| LdtError::internal("regular set has no hash directory"))
}

/// Insert a stored value, rehashing first when this insert reaches the
/// threshold.
#[allow(clippy::too_many_arguments)]
pub(crate) fn insert<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    rec: &TopRecord,
    props: &mut PropertyMap,
    map: &mut LsetMap,
    stored: Value,
    key: &Value,
    fctx: &FunctionContext<'_>,
    now: i64,
) -> Result<()> {
    if map.store_state == StoreState::Compact {
        if find_position(compact_list(map)?, key, fctx)?.is_some() {
            return Err(LdtError::UniqueKeyViolation {
                key: key.canonical_string(),
            });
        }
        if map.total_count + 1 >= map.threshold as u64 {
            rehash(host, ctx, rec, props, map, fctx, now)?;
            return insert_regular(host, ctx, rec, props, map, stored, key, fctx, true, now);
        }
        map.compact_list
            .as_mut()
            .ok_or_else(|| LdtError::internal("compact set has no compact list"))?
            .push(stored);
        return Ok(());
    }
    insert_regular(host, ctx, rec, props, map, stored, key, fctx, true, now)
}

#[allow(clippy::too_many_arguments)]
fn insert_regular<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    rec: &TopRecord,
    props: &mut PropertyMap,
    map: &mut LsetMap,
    stored: Value,
    key: &Value,
    fctx: &FunctionContext<'_>,
    check_unique: bool,
    now: i64,
) -> Result<()> {
    let index = bucket_for(key, map.modulo, StoreState::Regular)?;
    let mut dir = take_directory(map)?;
    let result = match dir.get_mut(index) {
        Some(cell) => cell_insert(
            host,
            ctx,
            rec.digest(),
            props,
            cell,
            map.cell_max_list,
            stored,
            key,
            fctx,
            check_unique,
            now,
        ),
        None => Err(LdtError::internal("hash directory shorter than modulo")),
    };
    map.hash_directory = Some(dir);
    result
}

/// Replace the compact list with a directory of empty cells and
/// redistribute every member through the cell engine.
fn rehash<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    rec: &TopRecord,
    props: &mut PropertyMap,
    map: &mut LsetMap,
    fctx: &FunctionContext<'_>,
    now: i64,
) -> Result<()> {
    let snapshot = map
        .compact_list
        .take()
        .ok_or_else(|| LdtError::internal("compact set has no compact list"))?;
    debug!(members = snapshot.len(), modulo = map.modulo, "rehashing sub-record-layout set");
    map.hash_directory = Some(vec![CellAnchor::Empty; map.modulo]);
    map.store_state = StoreState::Regular;
    for stored in snapshot {
        let live = fctx.read_form(&stored)?;
        let key = fctx.extract_key(&live)?;
        insert_regular(host, ctx, rec, props, map, stored, &key, fctx, false, now)?;
    }
    Ok(())
}

/// Find a member by key; the live value is returned only when it passes
/// the caller's filter.
pub(crate) fn find<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    map: &LsetMap,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    if map.store_state == StoreState::Compact {
        let list = compact_list(map)?;
        let Some(i) = find_position(list, key, fctx)? else {
            return Ok(None);
        };
        let live = fctx.read_form(&list[i])?;
        return if fctx.passes_filter(&live)? {
            Ok(Some(live))
        } else {
            Ok(None)
        };
    }
    let index = bucket_for(key, map.modulo, StoreState::Regular)?;
    let dir = map
        .hash_directory
        .as_ref()
        .ok_or_else(|| LdtError::internal("regular set has no hash directory"))?;
    let cell = dir
        .get(index)
        .ok_or_else(|| LdtError::internal("hash directory shorter than modulo"))?;
    cell_find(host, ctx, cell, key, fctx)
}

/// Remove a member by key with swap-with-last; returns the removed live
/// value. A filter veto counts as not found.
pub(crate) fn remove_member<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    map: &mut LsetMap,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    if map.store_state == StoreState::Compact {
        let list = map
            .compact_list
            .as_mut()
            .ok_or_else(|| LdtError::internal("compact set has no compact list"))?;
        let Some(i) = find_position(list, key, fctx)? else {
            return Ok(None);
        };
        let live = fctx.read_form(&list[i])?;
        if !fctx.passes_filter(&live)? {
            return Ok(None);
        }
        list.swap_remove(i);
        return Ok(Some(live));
    }
    let index = bucket_for(key, map.modulo, StoreState::Regular)?;
    let mut dir = take_directory(map)?;
    let result = match dir.get_mut(index) {
        Some(cell) => cell_remove(host, ctx, cell, key, fctx),
        None => Err(LdtError::internal("hash directory shorter than modulo")),
    };
    map.hash_directory = Some(dir);
    result
}

/// All members (untransformed, filtered), cell by cell.
pub(crate) fn scan<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    map: &LsetMap,
    fctx: &FunctionContext<'_>,
) -> Result<Vec<Value>> {
    let mut out = Vec::new();
    if map.store_state == StoreState::Compact {
        for stored in compact_list(map)? {
            if stored.is_null() {
                continue;
            }
            let live = fctx.read_form(stored)?;
            if fctx.passes_filter(&live)? {
                out.push(live);
            }
        }
        return Ok(out);
    }
    let dir = map
        .hash_directory
        .as_ref()
        .ok_or_else(|| LdtError::internal("regular set has no hash directory"))?;
    for cell in dir {
        cell_scan(host, ctx, cell, fctx, &mut out)?;
    }
    Ok(out)
}

/// Tear down sub-record storage: removing the existence sub-record
/// cascades removal of every child through the host.
pub(crate) fn destroy<H: Host>(host: &mut H, props: &PropertyMap) -> Result<()> {
    if let Some(esr) = props.esr_digest {
        host.remove_subrec(&esr)?;
        debug!(bin = %props.bin_name, esr = %esr, "removed existence sub-record");
    }
    Ok(())
}

//! The per-bucket cell state machine of the sub-record layout.
//!
//! Each directory cell moves through:
//!
//! ```text
//! Empty --insert--> List (inline, one member)
//! List  --insert, len < cell_max--> List (append)
//! List  --insert, len = cell_max--> Digest (inline list + new member
//!                                   move into a fresh sub-record)
//! Digest --insert--> Digest (append to the sub-record's list)
//! Digest --overflow--> Tree (reserved; not implemented)
//! ```
//!
//! Values arriving here are already in stored (transformed) form; keys
//! are already extracted. Removal uses swap-with-last in both states: a
//! set is unordered, so membership - not position - is the contract.
//! A List cell that empties collapses back to Empty; a Digest cell that
//! empties keeps its sub-record.

use crate::host::Host;
use crate::search::find_position;
use crate::subrec::{create_data_subrec, SubRecContext};
use largeset_core::descriptor::{CellAnchor, PropertyMap};
use largeset_core::digest::Digest;
use largeset_core::error::{LdtError, Result};
use largeset_core::functions::FunctionContext;
use largeset_core::value::Value;
use tracing::debug;

fn tree_unimplemented() -> LdtError {
    LdtError::internal("tree cell state is not implemented")
}

fn duplicate(key: &Value) -> LdtError {
    LdtError::UniqueKeyViolation {
        key: key.canonical_string(),
    }
}

/// Insert a stored value into a cell, promoting List to Digest at
/// `cell_max`.
///
/// `check_unique` is false only on rehash placement, where members are
/// known unique already.
#[allow(clippy::too_many_arguments)]
pub(crate) fn cell_insert<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    top_digest: Digest,
    props: &mut PropertyMap,
    cell: &mut CellAnchor,
    cell_max: usize,
    stored: Value,
    key: &Value,
    fctx: &FunctionContext<'_>,
    check_unique: bool,
    now: i64,
) -> Result<()> {
    match cell {
        CellAnchor::Empty => {
            *cell = CellAnchor::List(vec![stored]);
            Ok(())
        }
        CellAnchor::List(list) => {
            if check_unique && find_position(list, key, fctx)?.is_some() {
                return Err(duplicate(key));
            }
            if list.len() < cell_max {
                list.push(stored);
                return Ok(());
            }
            // Promotion: the inline list and the incoming value move
            // into a fresh sub-record.
            let mut moved = std::mem::take(list);
            moved.push(stored);
            let item_count = moved.len() as u64;
            let digest = create_data_subrec(host, ctx, top_digest, props, moved, now)?;
            debug!(bin = %props.bin_name, subrec = %digest, item_count, "cell promoted to sub-record");
            *cell = CellAnchor::Digest { digest, item_count };
            Ok(())
        }
        CellAnchor::Digest { digest, item_count } => {
            let rec = ctx.open(host, digest)?;
            {
                let mut sub = rec.borrow_mut();
                if check_unique && find_position(sub.list(), key, fctx)?.is_some() {
                    return Err(duplicate(key));
                }
                sub.list_mut().push(stored);
            }
            ctx.mark_dirty(digest);
            *item_count += 1;
            Ok(())
        }
        CellAnchor::Tree { .. } => Err(tree_unimplemented()),
    }
}

/// Find a member by key; returns the live (untransformed) value if the
/// member exists and passes the caller's filter.
pub(crate) fn cell_find<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    cell: &CellAnchor,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    match cell {
        CellAnchor::Empty => Ok(None),
        CellAnchor::List(list) => match find_position(list, key, fctx)? {
            None => Ok(None),
            Some(i) => filtered_live(&list[i], fctx),
        },
        CellAnchor::Digest { digest, .. } => {
            let rec = ctx.open(host, digest)?;
            let sub = rec.borrow();
            match find_position(sub.list(), key, fctx)? {
                None => Ok(None),
                Some(i) => filtered_live(&sub.list()[i], fctx),
            }
        }
        CellAnchor::Tree { .. } => Err(tree_unimplemented()),
    }
}

/// Remove a member by key; returns the removed live value.
///
/// A caller-supplied filter can veto the removal: a member that fails
/// the filter is treated as not found.
pub(crate) fn cell_remove<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    cell: &mut CellAnchor,
    key: &Value,
    fctx: &FunctionContext<'_>,
) -> Result<Option<Value>> {
    match cell {
        CellAnchor::Empty => Ok(None),
        CellAnchor::List(list) => {
            let Some(i) = find_position(list, key, fctx)? else {
                return Ok(None);
            };
            let live = fctx.read_form(&list[i])?;
            if !fctx.passes_filter(&live)? {
                return Ok(None);
            }
            list.swap_remove(i);
            if list.is_empty() {
                *cell = CellAnchor::Empty;
            }
            Ok(Some(live))
        }
        CellAnchor::Digest { digest, item_count } => {
            let rec = ctx.open(host, digest)?;
            let removed = {
                let mut sub = rec.borrow_mut();
                let Some(i) = find_position(sub.list(), key, fctx)? else {
                    return Ok(None);
                };
                let live = fctx.read_form(&sub.list()[i])?;
                if !fctx.passes_filter(&live)? {
                    return Ok(None);
                }
                sub.list_mut().swap_remove(i);
                live
            };
            ctx.mark_dirty(digest);
            *item_count = item_count.saturating_sub(1);
            // Empty sub-records are not reclaimed; the cell stays in
            // Digest state.
            Ok(Some(removed))
        }
        CellAnchor::Tree { .. } => Err(tree_unimplemented()),
    }
}

/// Append every member of a cell (untransformed, filtered) to `out`.
pub(crate) fn cell_scan<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    cell: &CellAnchor,
    fctx: &FunctionContext<'_>,
    out: &mut Vec<Value>,
) -> Result<()> {
    match cell {
        CellAnchor::Empty => Ok(()),
        CellAnchor::List(list) => append_live(list, fctx, out),
        CellAnchor::Digest { digest, .. } => {
            let rec = ctx.open(host, digest)?;
            let sub = rec.borrow();
            append_live(sub.list(), fctx, out)
        }
        CellAnchor::Tree { .. } => Err(tree_unimplemented()),
    }
}

fn filtered_live(stored: &Value, fctx: &FunctionContext<'_>) -> Result<Option<Value>> {
    let live = fctx.read_form(stored)?;
    if fctx.passes_filter(&live)? {
        Ok(Some(live))
    } else {
        Ok(None)
    }
}

fn append_live(list: &[Value], fctx: &FunctionContext<'_>, out: &mut Vec<Value>) -> Result<()> {
    for stored in list {
        if stored.is_null() {
            continue;
        }
        let live = fctx.read_form(stored)?;
        if fctx.passes_filter(&live)? {
            out.push(live);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    struct Fixture {
        host: MemoryHost,
        ctx: SubRecContext,
        props: PropertyMap,
        top: Digest,
    }

    impl Fixture {
        fn new() -> Self {
            Fixture {
                host: MemoryHost::new(),
                ctx: SubRecContext::new(),
                props: PropertyMap::new_top("b", 0),
                top: Digest::from_bytes([3; 20]),
            }
        }

        fn insert(&mut self, cell: &mut CellAnchor, v: i64, cell_max: usize) -> Result<()> {
            let fctx = FunctionContext::default();
            let value = Value::Int(v);
            cell_insert(
                &mut self.host,
                &mut self.ctx,
                self.top,
                &mut self.props,
                cell,
                cell_max,
                value.clone(),
                &value,
                &fctx,
                true,
                0,
            )
        }
    }

    #[test]
    fn empty_to_list_to_digest() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;

        fx.insert(&mut cell, 1, 2).unwrap();
        assert!(matches!(cell, CellAnchor::List(ref l) if l.len() == 1));

        fx.insert(&mut cell, 2, 2).unwrap();
        assert!(matches!(cell, CellAnchor::List(ref l) if l.len() == 2));

        // Third insert with cell_max = 2 promotes.
        fx.insert(&mut cell, 3, 2).unwrap();
        match &cell {
            CellAnchor::Digest { item_count, .. } => assert_eq!(*item_count, 3),
            other => panic!("expected Digest cell, got {:?}", other),
        }
        assert_eq!(fx.props.subrec_count, 1);
        // ESR plus one data sub-record.
        assert_eq!(fx.host.subrec_count(), 2);
    }

    #[test]
    fn duplicates_rejected_in_both_states() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        fx.insert(&mut cell, 1, 2).unwrap();
        let err = fx.insert(&mut cell, 1, 2).unwrap_err();
        assert_eq!(err.error_code(), "UniqueKeyViolation");

        fx.insert(&mut cell, 2, 2).unwrap();
        fx.insert(&mut cell, 3, 2).unwrap(); // now Digest
        let err = fx.insert(&mut cell, 2, 2).unwrap_err();
        assert_eq!(err.error_code(), "UniqueKeyViolation");
    }

    #[test]
    fn digest_cell_keeps_growing_without_tree() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        for i in 0..20 {
            fx.insert(&mut cell, i, 2).unwrap();
        }
        match &cell {
            CellAnchor::Digest { item_count, .. } => assert_eq!(*item_count, 20),
            other => panic!("expected Digest cell, got {:?}", other),
        }
    }

    #[test]
    fn find_in_list_and_digest() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        for i in 0..5 {
            fx.insert(&mut cell, i, 2).unwrap();
        }
        let fctx = FunctionContext::default();
        let hit = cell_find(&mut fx.host, &mut fx.ctx, &cell, &Value::Int(4), &fctx).unwrap();
        assert_eq!(hit, Some(Value::Int(4)));
        let miss = cell_find(&mut fx.host, &mut fx.ctx, &cell, &Value::Int(99), &fctx).unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn emptied_list_cell_collapses() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        fx.insert(&mut cell, 1, 4).unwrap();

        let fctx = FunctionContext::default();
        let removed =
            cell_remove(&mut fx.host, &mut fx.ctx, &mut cell, &Value::Int(1), &fctx).unwrap();
        assert_eq!(removed, Some(Value::Int(1)));
        assert_eq!(cell, CellAnchor::Empty);
    }

    #[test]
    fn emptied_digest_cell_keeps_its_subrec() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        for i in 0..3 {
            fx.insert(&mut cell, i, 2).unwrap();
        }
        let fctx = FunctionContext::default();
        for i in 0..3 {
            cell_remove(&mut fx.host, &mut fx.ctx, &mut cell, &Value::Int(i), &fctx).unwrap();
        }
        match &cell {
            CellAnchor::Digest { item_count, .. } => assert_eq!(*item_count, 0),
            other => panic!("expected Digest cell, got {:?}", other),
        }
        assert_eq!(fx.host.subrec_count(), 2);
    }

    #[test]
    fn scan_collects_everything() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Empty;
        for i in 0..6 {
            fx.insert(&mut cell, i, 2).unwrap();
        }
        let fctx = FunctionContext::default();
        let mut out = Vec::new();
        cell_scan(&mut fx.host, &mut fx.ctx, &cell, &fctx, &mut out).unwrap();
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn tree_cells_are_refused() {
        let mut fx = Fixture::new();
        let mut cell = CellAnchor::Tree {
            digests: vec![],
            item_count: 0,
        };
        let err = fx.insert(&mut cell, 1, 2).unwrap_err();
        assert_eq!(err.error_code(), "Internal");
    }
}

//! Sub-record lifecycle: the open-handle context and record creation.
//!
//! Every operation that may touch sub-records owns one
//! [`SubRecContext`] for its whole duration. The context caches open
//! handles by digest, tracks dirty state, and is explicitly finished on
//! every exit path: [`SubRecContext::commit`] on success (persist dirty
//! records, close everything), [`SubRecContext::release`] on error
//! (close everything, persist nothing). Contexts never outlive a call.

use crate::host::Host;
use crate::record::SubRecord;
use largeset_core::descriptor::{PropertyMap, RecType};
use largeset_core::digest::Digest;
use largeset_core::error::Result;
use largeset_core::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::debug;

struct OpenSub {
    rec: Rc<RefCell<SubRecord>>,
    dirty: bool,
}

/// Tracker for sub-records opened during one operation.
#[derive(Default)]
pub struct SubRecContext {
    open: HashMap<Digest, OpenSub>,
}

impl SubRecContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a sub-record, reusing the handle if this context already
    /// holds it.
    pub fn open<H: Host>(
        &mut self,
        host: &mut H,
        digest: &Digest,
    ) -> Result<Rc<RefCell<SubRecord>>> {
        if let Some(entry) = self.open.get(digest) {
            return Ok(entry.rec.clone());
        }
        let rec = host.open_subrec(digest)?;
        self.open.insert(
            *digest,
            OpenSub {
                rec: rec.clone(),
                dirty: false,
            },
        );
        Ok(rec)
    }

    /// Create a sub-record under `parent` and track it as dirty.
    pub fn create<H: Host>(
        &mut self,
        host: &mut H,
        parent: &Digest,
    ) -> Result<Rc<RefCell<SubRecord>>> {
        let rec = host.create_subrec(parent)?;
        let digest = rec.borrow().digest();
        self.open.insert(
            digest,
            OpenSub {
                rec: rec.clone(),
                dirty: true,
            },
        );
        Ok(rec)
    }

    /// Mark an open sub-record as needing persistence.
    pub fn mark_dirty(&mut self, digest: &Digest) {
        if let Some(entry) = self.open.get_mut(digest) {
            entry.dirty = true;
        }
    }

    /// Number of handles currently held.
    pub fn open_count(&self) -> usize {
        self.open.len()
    }

    /// Persist every dirty sub-record and close all handles.
    ///
    /// All handles are closed even when a persist fails; the first
    /// failure is reported.
    pub fn commit<H: Host>(&mut self, host: &mut H) -> Result<()> {
        let mut first_err = None;
        for (digest, entry) in self.open.drain() {
            if entry.dirty {
                if let Err(err) = host.update_subrec(&digest) {
                    if first_err.is_none() {
                        first_err = Some(err);
                    }
                }
            }
            let _ = host.close_subrec(&digest);
        }
        match first_err {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }

    /// Close all handles without persisting anything. Used on error
    /// paths.
    pub fn release<H: Host>(&mut self, host: &mut H) {
        for (digest, _) in self.open.drain() {
            let _ = host.close_subrec(&digest);
        }
    }
}

/// The existence sub-record's digest, creating the ESR on first use.
///
/// The ESR ties the lifetime of every data sub-record to the set:
/// removing it cascades removal of all children through the host.
pub fn ensure_esr<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    top_digest: Digest,
    props: &mut PropertyMap,
    now: i64,
) -> Result<Digest> {
    if let Some(digest) = props.esr_digest {
        return Ok(digest);
    }
    let rec = ctx.create(host, &top_digest)?;
    let digest = rec.borrow().digest();
    rec.borrow_mut().set_props(PropertyMap::new_child(
        &props.bin_name,
        RecType::Esr,
        top_digest,
        digest,
        digest,
        now,
    ));
    props.esr_digest = Some(digest);
    debug!(bin = %props.bin_name, esr = %digest, "created existence sub-record");
    Ok(digest)
}

/// Create a data sub-record seeded with `list`, returning its digest.
///
/// The ESR is created first if this is the set's first sub-record.
/// Data sub-records carry a zeroed create time.
pub fn create_data_subrec<H: Host>(
    host: &mut H,
    ctx: &mut SubRecContext,
    top_digest: Digest,
    props: &mut PropertyMap,
    list: Vec<Value>,
    now: i64,
) -> Result<Digest> {
    let esr = ensure_esr(host, ctx, top_digest, props, now)?;
    let rec = ctx.create(host, &top_digest)?;
    let digest = rec.borrow().digest();
    {
        let mut sub = rec.borrow_mut();
        sub.set_props(PropertyMap::new_child(
            &props.bin_name,
            RecType::Sub,
            top_digest,
            digest,
            esr,
            0,
        ));
        *sub.list_mut() = list;
    }
    props.subrec_count += 1;
    debug!(bin = %props.bin_name, subrec = %digest, "created data sub-record");
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn top_props() -> PropertyMap {
        PropertyMap::new_top("b", 1000)
    }

    #[test]
    fn open_caches_handles() {
        let mut host = MemoryHost::new();
        let mut ctx = SubRecContext::new();
        let parent = Digest::from_bytes([1; 20]);

        let rec = ctx.create(&mut host, &parent).unwrap();
        let digest = rec.borrow().digest();
        assert_eq!(ctx.open_count(), 1);

        let again = ctx.open(&mut host, &digest).unwrap();
        assert!(Rc::ptr_eq(&rec, &again));
        assert_eq!(ctx.open_count(), 1);
    }

    #[test]
    fn commit_persists_dirty_records() {
        let mut host = MemoryHost::new();
        let mut ctx = SubRecContext::new();
        let parent = Digest::from_bytes([1; 20]);

        ctx.create(&mut host, &parent).unwrap(); // created dirty
        ctx.commit(&mut host).unwrap();
        assert_eq!(host.subrec_update_count(), 1);
        assert_eq!(ctx.open_count(), 0);
    }

    #[test]
    fn release_persists_nothing() {
        let mut host = MemoryHost::new();
        let mut ctx = SubRecContext::new();
        let parent = Digest::from_bytes([1; 20]);

        ctx.create(&mut host, &parent).unwrap();
        ctx.release(&mut host);
        assert_eq!(host.subrec_update_count(), 0);
        assert_eq!(ctx.open_count(), 0);
    }

    #[test]
    fn esr_is_created_once() {
        let mut host = MemoryHost::new();
        let mut ctx = SubRecContext::new();
        let top = Digest::from_bytes([5; 20]);
        let mut props = top_props();

        let first = ensure_esr(&mut host, &mut ctx, top, &mut props, 7).unwrap();
        let second = ensure_esr(&mut host, &mut ctx, top, &mut props, 7).unwrap();
        assert_eq!(first, second);
        assert_eq!(host.subrec_count(), 1);
        assert_eq!(props.esr_digest, Some(first));
    }

    #[test]
    fn data_subrec_is_stamped_and_counted() {
        let mut host = MemoryHost::new();
        let mut ctx = SubRecContext::new();
        let top = Digest::from_bytes([5; 20]);
        let mut props = top_props();

        let digest = create_data_subrec(
            &mut host,
            &mut ctx,
            top,
            &mut props,
            vec![Value::Int(1), Value::Int(2)],
            7,
        )
        .unwrap();

        assert_eq!(props.subrec_count, 1);
        let esr = props.esr_digest.unwrap();

        let rec = ctx.open(&mut host, &digest).unwrap();
        let sub = rec.borrow();
        let sp = sub.props().unwrap();
        assert_eq!(sp.rec_type, RecType::Sub);
        assert_eq!(sp.parent_digest, Some(top));
        assert_eq!(sp.self_digest, Some(digest));
        assert_eq!(sp.esr_digest, Some(esr));
        assert_eq!(sp.create_time, 0);
        assert_eq!(sub.list().len(), 2);
    }
}

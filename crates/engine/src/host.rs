//! The host seam: the database runtime the engine runs inside.
//!
//! The engine is a guest. Record durability, sub-record lifecycle and
//! wall-clock time belong to the host, reached exclusively through this
//! trait. Within one call the engine performs all sub-record opens
//! before the final `update`, so the host observes a single atomic
//! write set; on error the engine releases what it opened and never
//! calls `update`.
//!
//! [`MemoryHost`] is the in-process implementation used by tests, the
//! facade crate and embedders that do not need durability.

use crate::record::{SubRecord, TopRecord};
use largeset_core::descriptor::RecType;
use largeset_core::digest::{Digest, DIGEST_LEN};
use largeset_core::error::{LdtError, Result};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Host contract consumed by the engine.
///
/// Sub-record handles are shared (`Rc<RefCell<_>>`): the engine mutates
/// them through a [`crate::SubRecContext`] and the host sees the
/// mutations at `update_subrec` time. The engine is single-threaded
/// within a call, so shared single-threaded handles are sufficient.
pub trait Host {
    /// Current wall-clock time in epoch milliseconds.
    fn now(&self) -> i64;

    /// Commit the top record.
    fn update(&mut self, rec: &mut TopRecord) -> Result<()>;

    /// Remove the top record from storage.
    fn remove(&mut self, rec: &mut TopRecord) -> Result<()>;

    /// Create a child record under the given parent digest.
    fn create_subrec(&mut self, parent: &Digest) -> Result<Rc<RefCell<SubRecord>>>;

    /// Open an existing child record.
    fn open_subrec(&mut self, digest: &Digest) -> Result<Rc<RefCell<SubRecord>>>;

    /// Persist a child record's current state.
    fn update_subrec(&mut self, digest: &Digest) -> Result<()>;

    /// Release a child record handle.
    fn close_subrec(&mut self, digest: &Digest) -> Result<()>;

    /// Remove a child record. Removing an existence sub-record cascades
    /// to every child sharing its digest as their ESR.
    fn remove_subrec(&mut self, digest: &Digest) -> Result<()>;
}

/// In-process host keeping everything in memory.
#[derive(Default)]
pub struct MemoryHost {
    subrecs: HashMap<Digest, Rc<RefCell<SubRecord>>>,
    counter: u32,
    commits: u64,
    subrec_updates: u64,
}

impl MemoryHost {
    /// A fresh, empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new, never-committed top record.
    pub fn new_record(&mut self) -> TopRecord {
        let digest = self.fresh_digest();
        TopRecord::new(digest)
    }

    /// Number of live sub-records, the existence sub-record included.
    pub fn subrec_count(&self) -> usize {
        self.subrecs.len()
    }

    /// Whether a sub-record with this digest is live.
    pub fn contains_subrec(&self, digest: &Digest) -> bool {
        self.subrecs.contains_key(digest)
    }

    /// Number of top-record commits observed.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }

    /// Number of sub-record persists observed.
    pub fn subrec_update_count(&self) -> u64 {
        self.subrec_updates
    }

    fn fresh_digest(&mut self) -> Digest {
        self.counter += 1;
        let mut bytes = [0u8; DIGEST_LEN];
        bytes[..16].copy_from_slice(uuid::Uuid::new_v4().as_bytes());
        bytes[16..].copy_from_slice(&self.counter.to_be_bytes());
        Digest::from_bytes(bytes)
    }
}

impl Host for MemoryHost {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn update(&mut self, rec: &mut TopRecord) -> Result<()> {
        rec.set_stored(true);
        self.commits += 1;
        Ok(())
    }

    fn remove(&mut self, rec: &mut TopRecord) -> Result<()> {
        rec.set_stored(false);
        Ok(())
    }

    fn create_subrec(&mut self, _parent: &Digest) -> Result<Rc<RefCell<SubRecord>>> {
        let digest = self.fresh_digest();
        let rec = Rc::new(RefCell::new(SubRecord::new(digest)));
        self.subrecs.insert(digest, rec.clone());
        Ok(rec)
    }

    fn open_subrec(&mut self, digest: &Digest) -> Result<Rc<RefCell<SubRecord>>> {
        self.subrecs
            .get(digest)
            .cloned()
            .ok_or_else(|| LdtError::SubRecOpen {
                digest: digest.to_hex(),
            })
    }

    fn update_subrec(&mut self, digest: &Digest) -> Result<()> {
        if !self.subrecs.contains_key(digest) {
            return Err(LdtError::SubRecOpen {
                digest: digest.to_hex(),
            });
        }
        self.subrec_updates += 1;
        Ok(())
    }

    fn close_subrec(&mut self, _digest: &Digest) -> Result<()> {
        Ok(())
    }

    fn remove_subrec(&mut self, digest: &Digest) -> Result<()> {
        let Some(target) = self.subrecs.remove(digest) else {
            return Err(LdtError::SubRecDelete {
                digest: digest.to_hex(),
            });
        };
        let is_esr = target
            .borrow()
            .props()
            .map(|p| p.rec_type == RecType::Esr)
            .unwrap_or(false);
        if is_esr {
            // Every child tied to this ESR goes with it.
            self.subrecs.retain(|_, rec| {
                rec.borrow()
                    .props()
                    .and_then(|p| p.esr_digest)
                    .map(|esr| esr != *digest)
                    .unwrap_or(true)
            });
        }
        Ok(())
    }
}

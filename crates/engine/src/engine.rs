//! The operation surface of the engine.
//!
//! [`Engine`] borrows a host and a function registry for the duration of
//! a batch of calls and exposes the full set API: `create`, `add`,
//! `add_all`, `get`, `exists`, `scan`, `remove`, `destroy`, `size`,
//! `config`, `get_capacity`, `set_capacity` and `dump`.
//!
//! Every entry point follows the same shape: validate the bin name, open
//! and validate the descriptor, resolve the function context, run the
//! layout driver, then either commit (re-encode descriptor, re-assert
//! flags, persist dirty sub-records, update the top record) or release
//! everything and surface the error. Read-only operations skip the
//! top-record update.
//!
//! Operations that may touch sub-records come in two forms, in the
//! spirit of progressive disclosure: the plain form owns a
//! [`SubRecContext`] for the single call, while the `*_in` form uses a
//! caller-owned context so several calls of one logical operation share
//! open handles. A caller using `*_in` finishes the context itself:
//! [`SubRecContext::commit`] after success, [`SubRecContext::release`]
//! after an error.

use crate::host::Host;
use crate::record::{self, BinFlags, TopRecord};
use crate::subrec::SubRecContext;
use crate::validate::{open_existing, open_optional, validate_bin_name};
use crate::{sub_layout, top_layout};
use largeset_core::descriptor::{CellAnchor, LsetDescriptor, SetTypeStore, StoreState};
use largeset_core::error::{LdtError, Result};
use largeset_core::functions::{FilterSpec, FunctionContext, UserModuleRegistry};
use largeset_core::settings::apply_create_spec;
use largeset_core::value::Value;
use std::fmt::Write as _;
use tracing::{debug, info};

/// The large-set engine, bound to a host and a function registry.
pub struct Engine<'a, H: Host> {
    host: &'a mut H,
    registry: &'a UserModuleRegistry,
}

impl<'a, H: Host> Engine<'a, H> {
    /// Bind an engine to a host and a registry.
    pub fn new(host: &'a mut H, registry: &'a UserModuleRegistry) -> Self {
        Engine { host, registry }
    }

    /// Create an empty set in `bin`.
    ///
    /// `spec` is an optional create spec: a user-module name or an
    /// option map (see the settings module).
    pub fn create(&mut self, rec: &mut TopRecord, bin: &str, spec: Option<&Value>) -> Result<()> {
        validate_bin_name(bin)?;
        let desc = self.materialize(rec, bin, spec)?;
        self.host.update(rec)?;
        info!(bin, layout = ?desc.map.set_type_store, "created set");
        Ok(())
    }

    /// Add one member; creates the set on first use.
    ///
    /// Raises `UniqueKeyViolation` when the member's key is already
    /// present.
    pub fn add(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        value: Value,
        spec: Option<&Value>,
    ) -> Result<()> {
        let mut ctx = SubRecContext::new();
        match self.add_in(rec, bin, value, spec, &mut ctx) {
            Ok(()) => ctx.commit(self.host),
            Err(err) => {
                ctx.release(self.host);
                Err(err)
            }
        }
    }

    /// [`Engine::add`] with a caller-owned sub-record context.
    pub fn add_in(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        value: Value,
        spec: Option<&Value>,
        ctx: &mut SubRecContext,
    ) -> Result<()> {
        validate_bin_name(bin)?;
        let mut desc = match open_optional(rec, bin)? {
            Some(desc) => desc,
            None => self.materialize(rec, bin, spec)?,
        };
        let fctx = FunctionContext::resolve(self.registry, &desc.map, None)?;
        self.insert_one(rec, &mut desc, &value, &fctx, ctx)?;
        self.write_descriptor(rec, &desc);
        self.host.update(rec)?;
        Ok(())
    }

    /// Add several members; the first failure aborts the rest.
    ///
    /// Members added before the failure stay in the set. The failing
    /// element's index is recorded in the error diagnostic. The whole
    /// batch shares one sub-record context.
    pub fn add_all(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        values: &[Value],
        spec: Option<&Value>,
    ) -> Result<()> {
        let mut ctx = SubRecContext::new();
        for (index, value) in values.iter().enumerate() {
            if let Err(err) = self.add_in(rec, bin, value.clone(), spec, &mut ctx) {
                // The prefix is already committed to the top record;
                // persist its sub-record writes before surfacing the
                // failure.
                let _ = ctx.commit(self.host);
                return Err(match err {
                    LdtError::UniqueKeyViolation { key } => LdtError::UniqueKeyViolation {
                        key: format!("{} (element {})", key, index),
                    },
                    other => other,
                });
            }
        }
        ctx.commit(self.host)
    }

    /// Fetch the member matching `key_source`.
    ///
    /// `key_source` may be the member itself or its key; key extraction
    /// applies either way. Raises `NotFound` on a miss or a filter veto.
    pub fn get(
        &mut self,
        rec: &TopRecord,
        bin: &str,
        key_source: &Value,
        filter: Option<&FilterSpec>,
    ) -> Result<Value> {
        let mut ctx = SubRecContext::new();
        match self.get_in(rec, bin, key_source, filter, &mut ctx) {
            Ok(live) => {
                ctx.commit(self.host)?;
                Ok(live)
            }
            Err(err) => {
                ctx.release(self.host);
                Err(err)
            }
        }
    }

    /// [`Engine::get`] with a caller-owned sub-record context.
    pub fn get_in(
        &mut self,
        rec: &TopRecord,
        bin: &str,
        key_source: &Value,
        filter: Option<&FilterSpec>,
        ctx: &mut SubRecContext,
    ) -> Result<Value> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        let fctx = FunctionContext::resolve(self.registry, &desc.map, filter)?;
        let key = fctx.extract_key(key_source)?;
        match self.find_member(rec, &desc, &key, &fctx, ctx)? {
            Some(live) => Ok(live),
            None => Err(LdtError::NotFound {
                key: key.canonical_string(),
            }),
        }
    }

    /// Whether a member with this key exists. Never raises on a miss.
    pub fn exists(&mut self, rec: &TopRecord, bin: &str, key_source: &Value) -> Result<bool> {
        let mut ctx = SubRecContext::new();
        match self.exists_in(rec, bin, key_source, &mut ctx) {
            Ok(hit) => {
                ctx.commit(self.host)?;
                Ok(hit)
            }
            Err(err) => {
                ctx.release(self.host);
                Err(err)
            }
        }
    }

    /// [`Engine::exists`] with a caller-owned sub-record context.
    pub fn exists_in(
        &mut self,
        rec: &TopRecord,
        bin: &str,
        key_source: &Value,
        ctx: &mut SubRecContext,
    ) -> Result<bool> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        let fctx = FunctionContext::resolve(self.registry, &desc.map, None)?;
        let key = fctx.extract_key(key_source)?;
        Ok(self.find_member(rec, &desc, &key, &fctx, ctx)?.is_some())
    }

    /// All members, untransformed, optionally filtered. Order is
    /// unspecified.
    pub fn scan(
        &mut self,
        rec: &TopRecord,
        bin: &str,
        filter: Option<&FilterSpec>,
    ) -> Result<Vec<Value>> {
        let mut ctx = SubRecContext::new();
        match self.scan_in(rec, bin, filter, &mut ctx) {
            Ok(members) => {
                ctx.commit(self.host)?;
                Ok(members)
            }
            Err(err) => {
                ctx.release(self.host);
                Err(err)
            }
        }
    }

    /// [`Engine::scan`] with a caller-owned sub-record context.
    pub fn scan_in(
        &mut self,
        rec: &TopRecord,
        bin: &str,
        filter: Option<&FilterSpec>,
        ctx: &mut SubRecContext,
    ) -> Result<Vec<Value>> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        let fctx = FunctionContext::resolve(self.registry, &desc.map, filter)?;
        match desc.map.set_type_store {
            SetTypeStore::Record => top_layout::scan(rec, &desc.map, &fctx),
            SetTypeStore::SubRecord => sub_layout::scan(self.host, ctx, &desc.map, &fctx),
        }
    }

    /// Remove the member matching `key_source`.
    ///
    /// Returns the removed live value when `return_value` is set. Raises
    /// `NotFound` on a miss or a filter veto.
    pub fn remove(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        key_source: &Value,
        filter: Option<&FilterSpec>,
        return_value: bool,
    ) -> Result<Option<Value>> {
        let mut ctx = SubRecContext::new();
        match self.remove_in(rec, bin, key_source, filter, return_value, &mut ctx) {
            Ok(removed) => {
                ctx.commit(self.host)?;
                Ok(removed)
            }
            Err(err) => {
                ctx.release(self.host);
                Err(err)
            }
        }
    }

    /// [`Engine::remove`] with a caller-owned sub-record context.
    pub fn remove_in(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        key_source: &Value,
        filter: Option<&FilterSpec>,
        return_value: bool,
        ctx: &mut SubRecContext,
    ) -> Result<Option<Value>> {
        validate_bin_name(bin)?;
        let mut desc = open_existing(rec, bin)?;
        let fctx = FunctionContext::resolve(self.registry, &desc.map, filter)?;
        let key = fctx.extract_key(key_source)?;
        let removed = match desc.map.set_type_store {
            SetTypeStore::Record => top_layout::remove_member(rec, &desc.map, &key, &fctx)?,
            SetTypeStore::SubRecord => {
                sub_layout::remove_member(self.host, ctx, &mut desc.map, &key, &fctx)?
            }
        };
        match removed {
            Some(live) => {
                desc.props.item_count = desc.props.item_count.saturating_sub(1);
                self.write_descriptor(rec, &desc);
                self.host.update(rec)?;
                Ok(return_value.then_some(live))
            }
            None => Err(LdtError::NotFound {
                key: key.canonical_string(),
            }),
        }
    }

    /// Remove the set: bucket bins nulled, the existence sub-record
    /// removed (cascading every data sub-record), the user bin dropped.
    pub fn destroy(&mut self, rec: &mut TopRecord, bin: &str) -> Result<()> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        match desc.map.set_type_store {
            SetTypeStore::Record => top_layout::destroy(rec),
            SetTypeStore::SubRecord => sub_layout::destroy(self.host, &desc.props)?,
        }
        rec.remove_bin(bin);
        record::drop_ldt_count(rec)?;
        self.host.update(rec)?;
        info!(bin, "destroyed set");
        Ok(())
    }

    /// Number of members.
    pub fn size(&mut self, rec: &TopRecord, bin: &str) -> Result<u64> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        Ok(desc.props.item_count)
    }

    /// The set's settings and counters as a map.
    pub fn config(&mut self, rec: &TopRecord, bin: &str) -> Result<Value> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        Ok(desc.config_value())
    }

    /// The advisory capacity ceiling; zero means unlimited.
    pub fn get_capacity(&mut self, rec: &TopRecord, bin: &str) -> Result<u64> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        Ok(desc.map.store_limit)
    }

    /// Set the advisory capacity ceiling. Capacity is stored, not yet
    /// enforced.
    pub fn set_capacity(&mut self, rec: &mut TopRecord, bin: &str, capacity: u64) -> Result<()> {
        validate_bin_name(bin)?;
        if capacity == 0 {
            return Err(LdtError::InputParam {
                reason: "capacity must be positive".to_string(),
            });
        }
        let mut desc = open_existing(rec, bin)?;
        desc.map.store_limit = capacity;
        self.write_descriptor(rec, &desc);
        self.host.update(rec)?;
        Ok(())
    }

    /// Multi-line diagnostic rendering of the set's control state.
    pub fn dump(&mut self, rec: &TopRecord, bin: &str) -> Result<String> {
        validate_bin_name(bin)?;
        let desc = open_existing(rec, bin)?;
        let mut out = String::new();
        let _ = writeln!(out, "LSET '{}' @ {}", bin, rec.digest());
        let _ = writeln!(
            out,
            "  props: items={} subrecs={} version={} created={}",
            desc.props.item_count,
            desc.props.subrec_count,
            desc.props.version,
            desc.props.create_time
        );
        let _ = writeln!(
            out,
            "  map: layout={:?} state={:?} modulo={} threshold={} cell_max={} total={} limit={}",
            desc.map.set_type_store,
            desc.map.store_state,
            desc.map.modulo,
            desc.map.threshold,
            desc.map.cell_max_list,
            desc.map.total_count,
            desc.map.store_limit
        );
        if let Some(esr) = &desc.props.esr_digest {
            let _ = writeln!(out, "  esr: {}", esr);
        }
        match desc.map.set_type_store {
            SetTypeStore::Record => {
                let sizes = top_layout::bucket_sizes(rec, &desc.map)?;
                for (i, len) in sizes.iter().enumerate() {
                    if *len > 0 {
                        let _ = writeln!(out, "  bucket[{}]: {} members", i, len);
                    }
                }
            }
            SetTypeStore::SubRecord => match desc.map.store_state {
                StoreState::Compact => {
                    let len = desc.map.compact_list.as_ref().map(Vec::len).unwrap_or(0);
                    let _ = writeln!(out, "  compact: {} members", len);
                }
                StoreState::Regular => {
                    if let Some(dir) = &desc.map.hash_directory {
                        for (i, cell) in dir.iter().enumerate() {
                            match cell {
                                CellAnchor::Empty => {}
                                CellAnchor::List(list) => {
                                    let _ =
                                        writeln!(out, "  cell[{}]: L {} members", i, list.len());
                                }
                                CellAnchor::Digest { digest, item_count } => {
                                    let _ = writeln!(
                                        out,
                                        "  cell[{}]: D {} members @ {:.8}",
                                        i,
                                        item_count,
                                        digest.to_hex()
                                    );
                                }
                                CellAnchor::Tree { digests, item_count } => {
                                    let _ = writeln!(
                                        out,
                                        "  cell[{}]: T {} members over {} sub-records",
                                        i,
                                        item_count,
                                        digests.len()
                                    );
                                }
                            }
                        }
                    }
                }
            },
        }
        Ok(out)
    }

    /// Build a descriptor, lay out the empty set and account for it in
    /// the record properties. Everything except the final commit.
    fn materialize(
        &mut self,
        rec: &mut TopRecord,
        bin: &str,
        spec: Option<&Value>,
    ) -> Result<LsetDescriptor> {
        if rec.bin(bin).is_some() {
            return Err(LdtError::BinExists {
                bin: bin.to_string(),
            });
        }
        let mut desc = LsetDescriptor::new(bin, self.host.now());
        if let Some(spec) = spec {
            apply_create_spec(&mut desc.map, spec, self.registry)?;
        }
        match desc.map.set_type_store {
            SetTypeStore::Record => {
                if top_layout::has_bucket_bins(rec) {
                    return Err(LdtError::BinExists {
                        bin: bin.to_string(),
                    });
                }
                desc.map.compact_list = None;
                top_layout::init_compact(rec);
            }
            SetTypeStore::SubRecord => {
                if desc.map.compact_list.is_none() {
                    desc.map.compact_list = Some(Vec::new());
                }
            }
        }
        record::bump_ldt_count(rec)?;
        self.write_descriptor(rec, &desc);
        debug!(bin, "materialized descriptor");
        Ok(desc)
    }

    fn insert_one(
        &mut self,
        rec: &mut TopRecord,
        desc: &mut LsetDescriptor,
        value: &Value,
        fctx: &FunctionContext<'_>,
        ctx: &mut SubRecContext,
    ) -> Result<()> {
        let key = fctx.extract_key(value)?;
        let stored = fctx.write_form(value.clone())?;
        match desc.map.set_type_store {
            SetTypeStore::Record => {
                top_layout::insert(rec, &mut desc.map, stored, &key, fctx)?;
            }
            SetTypeStore::SubRecord => {
                let now = self.host.now();
                sub_layout::insert(
                    self.host,
                    ctx,
                    rec,
                    &mut desc.props,
                    &mut desc.map,
                    stored,
                    &key,
                    fctx,
                    now,
                )?;
            }
        }
        desc.props.item_count += 1;
        desc.map.total_count += 1;
        Ok(())
    }

    fn find_member(
        &mut self,
        rec: &TopRecord,
        desc: &LsetDescriptor,
        key: &Value,
        fctx: &FunctionContext<'_>,
        ctx: &mut SubRecContext,
    ) -> Result<Option<Value>> {
        match desc.map.set_type_store {
            SetTypeStore::Record => top_layout::find(rec, &desc.map, key, fctx),
            SetTypeStore::SubRecord => sub_layout::find(self.host, ctx, &desc.map, key, fctx),
        }
    }

    /// Write the descriptor into its bin and re-assert the flags the
    /// host forgets on assignment.
    fn write_descriptor(&self, rec: &mut TopRecord, desc: &LsetDescriptor) {
        rec.set_bin(&desc.props.bin_name, desc.to_value());
        rec.set_bin_flags(&desc.props.bin_name, BinFlags::ldt_bin());
        rec.set_ldt_record();
    }
}

//! The owned-set facade.
//!
//! [`LargeSet`] bundles an in-memory host, one top record and a user
//! module registry into a self-contained set with a direct API. It is
//! the quick-start surface; embedders running inside a real database
//! runtime use [`largeset_engine::Engine`] against their own
//! [`largeset_engine::Host`] implementation instead.

use crate::error::{Error, Result};
use largeset_core::settings;
use largeset_core::{FilterSpec, UserModule, UserModuleRegistry, Value};
use largeset_engine::{Engine, MemoryHost, TopRecord};
use std::collections::HashMap;

/// An owned large set backed by the in-memory host.
///
/// Created via [`LargeSet::create`] or [`LargeSet::builder`].
pub struct LargeSet {
    host: MemoryHost,
    registry: UserModuleRegistry,
    record: TopRecord,
    bin: String,
}

impl std::fmt::Debug for LargeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LargeSet")
            .field("record", &self.record)
            .field("bin", &self.bin)
            .finish_non_exhaustive()
    }
}

impl LargeSet {
    /// Create a set with default settings.
    pub fn create(bin: &str) -> Result<Self> {
        Self::builder().create(bin)
    }

    /// A builder for tuned sets.
    pub fn builder() -> LargeSetBuilder {
        LargeSetBuilder::new()
    }

    /// Add one member. Rejects duplicates.
    pub fn add(&mut self, value: impl Into<Value>) -> Result<()> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.add(&mut self.record, &self.bin, value.into(), None)
            .map_err(Error::from)
    }

    /// Add several members; the first failure aborts the rest, keeping
    /// the members added before it.
    pub fn add_all<I, V>(&mut self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.add_all(&mut self.record, &self.bin, &values, None)
            .map_err(Error::from)
    }

    /// Fetch the member matching a key. Errors with
    /// [`Error::NotFound`] on a miss.
    pub fn get(&mut self, key: impl Into<Value>) -> Result<Value> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.get(&self.record, &self.bin, &key.into(), None)
            .map_err(Error::from)
    }

    /// Fetch the member matching a key, subject to a registered filter.
    pub fn get_filtered(&mut self, key: impl Into<Value>, filter: &FilterSpec) -> Result<Value> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.get(&self.record, &self.bin, &key.into(), Some(filter))
            .map_err(Error::from)
    }

    /// Whether a member with this key exists. Never errors on a miss.
    pub fn exists(&mut self, key: impl Into<Value>) -> Result<bool> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.exists(&self.record, &self.bin, &key.into())
            .map_err(Error::from)
    }

    /// All members, in unspecified order.
    pub fn scan(&mut self) -> Result<Vec<Value>> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.scan(&self.record, &self.bin, None).map_err(Error::from)
    }

    /// All members passing a registered filter.
    pub fn scan_filtered(&mut self, filter: &FilterSpec) -> Result<Vec<Value>> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.scan(&self.record, &self.bin, Some(filter))
            .map_err(Error::from)
    }

    /// Remove the member matching a key. Errors with
    /// [`Error::NotFound`] on a miss.
    pub fn remove(&mut self, key: impl Into<Value>) -> Result<()> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.remove(&mut self.record, &self.bin, &key.into(), None, false)
            .map_err(Error::from)?;
        Ok(())
    }

    /// Remove the member matching a key and return it.
    pub fn take(&mut self, key: impl Into<Value>) -> Result<Value> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        let removed = eng
            .remove(&mut self.record, &self.bin, &key.into(), None, true)
            .map_err(Error::from)?;
        removed.ok_or_else(|| Error::Internal("remove returned no value".to_string()))
    }

    /// Number of members.
    pub fn len(&mut self) -> Result<u64> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.size(&self.record, &self.bin).map_err(Error::from)
    }

    /// Whether the set has no members.
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The advisory capacity ceiling; zero means unlimited.
    pub fn capacity(&mut self) -> Result<u64> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.get_capacity(&self.record, &self.bin).map_err(Error::from)
    }

    /// Set the advisory capacity ceiling.
    pub fn set_capacity(&mut self, capacity: u64) -> Result<()> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.set_capacity(&mut self.record, &self.bin, capacity)
            .map_err(Error::from)
    }

    /// Settings and counters as a map.
    pub fn config(&mut self) -> Result<Value> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.config(&self.record, &self.bin).map_err(Error::from)
    }

    /// Multi-line diagnostic rendering of the control state.
    pub fn dump(&mut self) -> Result<String> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.dump(&self.record, &self.bin).map_err(Error::from)
    }

    /// Destroy the set, removing every sub-record. Consumes the handle.
    pub fn destroy(mut self) -> Result<()> {
        let mut eng = Engine::new(&mut self.host, &self.registry);
        eng.destroy(&mut self.record, &self.bin).map_err(Error::from)
    }
}

/// Builder for a tuned [`LargeSet`].
///
/// ```
/// use largeset::prelude::*;
///
/// # fn main() -> largeset::Result<()> {
/// let set = LargeSet::builder()
///     .modulo(31)
///     .threshold(8)
///     .hash_cell_max(2)
///     .create("tuned")?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct LargeSetBuilder {
    registry: UserModuleRegistry,
    options: HashMap<String, Value>,
}

impl LargeSetBuilder {
    /// An empty builder (all defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket count for the regular phase. A prime is recommended.
    pub fn modulo(mut self, modulo: usize) -> Self {
        self.options
            .insert(settings::OPT_MODULO.into(), Value::Int(modulo as i64));
        self
    }

    /// Member count at which the set rehashes from compact to regular.
    pub fn threshold(mut self, threshold: usize) -> Self {
        self.options
            .insert(settings::OPT_THRESHOLD.into(), Value::Int(threshold as i64));
        self
    }

    /// Inline-list size at which a cell promotes into a sub-record.
    pub fn hash_cell_max(mut self, max: usize) -> Self {
        self.options.insert(
            settings::OPT_HASH_CELL_MAX_LIST.into(),
            Value::Int(max as i64),
        );
        self
    }

    /// Keep all buckets in bins of the record itself (bounded
    /// capacity).
    pub fn record_layout(mut self) -> Self {
        self.options.insert(
            settings::OPT_SET_TYPE_STORE.into(),
            Value::String("record".into()),
        );
        self
    }

    /// Overflow buckets into digest-keyed sub-records (unbounded
    /// capacity). This is the default.
    pub fn sub_record_layout(mut self) -> Self {
        self.options.insert(
            settings::OPT_SET_TYPE_STORE.into(),
            Value::String("subrecord".into()),
        );
        self
    }

    /// Advisory capacity ceiling.
    pub fn store_limit(mut self, limit: u64) -> Self {
        self.options
            .insert(settings::OPT_STORE_LIMIT.into(), Value::Int(limit as i64));
        self
    }

    /// Apply a packaged settings preset by name.
    pub fn package(mut self, name: &str) -> Self {
        self.options
            .insert(settings::OPT_PACKAGE.into(), Value::String(name.into()));
        self
    }

    /// Register a user module and bind the set to it.
    pub fn module(mut self, name: &str, module: UserModule) -> Self {
        self.registry.register(name, module);
        self.options
            .insert(settings::OPT_USER_MODULE.into(), Value::String(name.into()));
        self
    }

    /// Name of the key-extraction function in the bound module.
    pub fn key_function(mut self, name: &str) -> Self {
        self.options
            .insert(settings::OPT_KEY_FUNCTION.into(), Value::String(name.into()));
        self
    }

    /// Names of the write-side transform and read-side untransform in
    /// the bound module.
    pub fn transform_pair(mut self, transform: &str, untransform: &str) -> Self {
        self.options.insert(
            settings::OPT_TRANSFORM.into(),
            Value::String(transform.into()),
        );
        self.options.insert(
            settings::OPT_UNTRANSFORM.into(),
            Value::String(untransform.into()),
        );
        self
    }

    /// Create the set in a fresh in-memory host.
    pub fn create(self, bin: &str) -> Result<LargeSet> {
        let LargeSetBuilder { registry, options } = self;
        let mut host = MemoryHost::new();
        let record = host.new_record();
        let mut set = LargeSet {
            host,
            registry,
            record,
            bin: bin.to_string(),
        };
        let spec = if options.is_empty() {
            None
        } else {
            Some(Value::Object(options))
        };
        {
            let mut eng = Engine::new(&mut set.host, &set.registry);
            eng.create(&mut set.record, bin, spec.as_ref())
                .map_err(Error::from)?;
        }
        Ok(set)
    }
}

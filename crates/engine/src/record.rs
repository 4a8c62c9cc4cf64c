//! Record model: the top record, its bins and flags, and sub-records.
//!
//! The engine never talks to storage directly. It mutates a
//! [`TopRecord`] (an in-memory image of the user's primary record) and
//! [`SubRecord`]s obtained through the host, then asks the host to
//! commit. Bin flags are part of the record image because the host does
//! not persist them across value replacement: every write helper here
//! re-asserts the flags after assignment.

use largeset_core::descriptor::{PropertyMap, MAGIC};
use largeset_core::digest::Digest;
use largeset_core::error::{LdtError, Result};
use largeset_core::value::Value;
use std::collections::HashMap;

/// Hidden bin carrying record-level large-data-type properties, shared
/// by every collection in the record.
pub const REC_PROP_BIN: &str = "LDTCONTROLBIN";

/// Sub-record bin holding the property map.
pub const SUBREC_PROP_BIN: &str = "SR_PROP_BIN";

/// Sub-record control bin. Reserved.
pub const LDR_CTRL_BIN: &str = "LdrControlBin";

/// Sub-record bin holding the value-list segment.
pub const LDR_LIST_BIN: &str = "LdrListBin";

/// Per-bin attribute flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BinFlags {
    /// Bin is invisible to ordinary reads.
    pub hidden: bool,
    /// Bin cannot be written through the ordinary record API.
    pub restricted: bool,
    /// Bin holds an engine control structure.
    pub control: bool,
}

impl BinFlags {
    /// Flags for the user-visible bin holding a set descriptor.
    pub fn ldt_bin() -> Self {
        BinFlags {
            hidden: false,
            restricted: true,
            control: true,
        }
    }

    /// Flags for hidden engine bins (bucket bins, the record property
    /// bin).
    pub fn hidden_bin() -> Self {
        BinFlags {
            hidden: true,
            restricted: true,
            control: true,
        }
    }
}

/// In-memory image of the user's primary record.
///
/// The host owns durability; `exists` reflects whether the record has
/// ever been committed. Mutations made during a failed call are the
/// caller's to discard, mirroring host-level rollback.
#[derive(Debug, Clone)]
pub struct TopRecord {
    digest: Digest,
    stored: bool,
    ldt_record: bool,
    bins: HashMap<String, Value>,
    flags: HashMap<String, BinFlags>,
}

impl TopRecord {
    /// A fresh, never-committed record with the given digest.
    pub fn new(digest: Digest) -> Self {
        TopRecord {
            digest,
            stored: false,
            ldt_record: false,
            bins: HashMap::new(),
            flags: HashMap::new(),
        }
    }

    /// The record's digest.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// Whether the record exists in storage.
    pub fn exists(&self) -> bool {
        self.stored
    }

    pub(crate) fn set_stored(&mut self, stored: bool) {
        self.stored = stored;
    }

    /// Read a bin.
    pub fn bin(&self, name: &str) -> Option<&Value> {
        self.bins.get(name)
    }

    /// Write a bin. Flags are cleared by the write and must be
    /// re-asserted by the caller.
    pub fn set_bin(&mut self, name: &str, value: Value) {
        self.bins.insert(name.to_string(), value);
        self.flags.remove(name);
    }

    /// Delete a bin and its flags.
    pub fn remove_bin(&mut self, name: &str) {
        self.bins.remove(name);
        self.flags.remove(name);
    }

    /// Names of all present bins.
    pub fn bin_names(&self) -> impl Iterator<Item = &str> {
        self.bins.keys().map(String::as_str)
    }

    /// Whether the record carries the large-data-type record flag.
    pub fn is_ldt_record(&self) -> bool {
        self.ldt_record
    }

    /// Flag the record as carrying large-data-type bins.
    pub fn set_ldt_record(&mut self) {
        self.ldt_record = true;
    }

    /// The flags of a bin; default (no flags) when never set.
    pub fn bin_flags(&self, name: &str) -> BinFlags {
        self.flags.get(name).copied().unwrap_or_default()
    }

    /// Assert flags on a present bin.
    pub fn set_bin_flags(&mut self, name: &str, flags: BinFlags) {
        if self.bins.contains_key(name) {
            self.flags.insert(name.to_string(), flags);
        }
    }
}

/// A child record carrying one overflow segment of a set (or the
/// existence sub-record).
#[derive(Debug, Clone)]
pub struct SubRecord {
    digest: Digest,
    props: Option<PropertyMap>,
    list: Vec<Value>,
}

impl SubRecord {
    /// A blank sub-record; the engine stamps its property map right
    /// after creation.
    pub fn new(digest: Digest) -> Self {
        SubRecord {
            digest,
            props: None,
            list: Vec::new(),
        }
    }

    /// The sub-record's digest.
    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// The property map, if stamped.
    pub fn props(&self) -> Option<&PropertyMap> {
        self.props.as_ref()
    }

    /// Stamp the property map.
    pub fn set_props(&mut self, props: PropertyMap) {
        self.props = Some(props);
    }

    /// The value-list segment.
    pub fn list(&self) -> &[Value] {
        &self.list
    }

    /// Mutable access to the value-list segment.
    pub fn list_mut(&mut self) -> &mut Vec<Value> {
        &mut self.list
    }
}

mod rp {
    pub const LDT_COUNT: &str = "C";
    pub const VINFO: &str = "V";
    pub const MAGIC: &str = "Z";
    pub const SELF_DIGEST: &str = "D";
}

fn read_props_bin(rec: &TopRecord) -> Result<Option<u64>> {
    let Some(v) = rec.bin(REC_PROP_BIN) else {
        return Ok(None);
    };
    let m = v
        .as_object()
        .ok_or_else(|| LdtError::damaged(REC_PROP_BIN, "record properties are not an object"))?;
    match m.get(rp::MAGIC).and_then(Value::as_str) {
        Some(s) if s == MAGIC => {}
        _ => return Err(LdtError::damaged(REC_PROP_BIN, "magic mismatch")),
    }
    let count = m
        .get(rp::LDT_COUNT)
        .and_then(Value::as_int)
        .ok_or_else(|| LdtError::damaged(REC_PROP_BIN, "missing collection count"))?;
    Ok(Some(count.max(0) as u64))
}

fn write_props_bin(rec: &mut TopRecord, count: u64) {
    let mut m = HashMap::new();
    m.insert(rp::LDT_COUNT.to_string(), Value::Int(count as i64));
    m.insert(rp::VINFO.to_string(), Value::Int(0));
    m.insert(rp::MAGIC.to_string(), Value::String(MAGIC.to_string()));
    m.insert(rp::SELF_DIGEST.to_string(), rec.digest().to_value());
    rec.set_bin(REC_PROP_BIN, Value::Object(m));
    rec.set_bin_flags(REC_PROP_BIN, BinFlags::hidden_bin());
}

/// Number of large-data-type bins the record currently hosts.
pub fn ldt_count(rec: &TopRecord) -> Result<u64> {
    Ok(read_props_bin(rec)?.unwrap_or(0))
}

/// Account for a newly created collection bin, creating the record
/// property bin on first use.
pub fn bump_ldt_count(rec: &mut TopRecord) -> Result<()> {
    let count = read_props_bin(rec)?.unwrap_or(0);
    write_props_bin(rec, count + 1);
    Ok(())
}

/// Account for a destroyed collection bin; the record property bin is
/// dropped when the last collection goes.
pub fn drop_ldt_count(rec: &mut TopRecord) -> Result<()> {
    let count = read_props_bin(rec)?.unwrap_or(0);
    let count = count.saturating_sub(1);
    if count == 0 {
        rec.remove_bin(REC_PROP_BIN);
    } else {
        write_props_bin(rec, count);
    }
    Ok(())
}

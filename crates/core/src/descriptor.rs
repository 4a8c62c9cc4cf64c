//! The LSET control descriptor and its on-disk encoding.
//!
//! A live set is described by a pair of maps stored as the value of the
//! user-named bin: a [`PropertyMap`] (fields common to every large data
//! type) and an [`LsetMap`] (set-specific state). Both persist as
//! letter-keyed `Value::Object`s inside a two-element `Value::Array`.
//!
//! ## On-disk letter table
//!
//! Keys are single letters to keep records compact. The table is frozen;
//! changing a letter breaks every record written before the change.
//!
//! PropertyMap:
//!
//! | letter | field |
//! |--------|-------|
//! | `I` | item_count |
//! | `S` | subrec_count |
//! | `V` | version |
//! | `T` | ldt_type |
//! | `Z` | magic |
//! | `B` | bin_name |
//! | `R` | rec_type |
//! | `E` | esr_digest |
//! | `P` | parent_digest |
//! | `D` | self_digest |
//! | `C` | create_time |
//!
//! LsetMap:
//!
//! | letter | field |
//! |--------|-------|
//! | `T` | set_type_store |
//! | `S` | store_state |
//! | `M` | store_mode |
//! | `K` | key_type |
//! | `O` | modulo |
//! | `H` | threshold |
//! | `X` | cell_max_list |
//! | `L` | compact_list |
//! | `W` | hash_directory |
//! | `U` | user_module |
//! | `F` | key_function |
//! | `f` | transform |
//! | `u` | untransform |
//! | `N` | total_count |
//! | `C` | store_limit |
//! | `E` | ldr_entry_count_max |
//! | `B` | ldr_byte_entry_size |
//! | `Y` | ldr_byte_count_max |
//! | `Z` | binary_store_size |
//!
//! CellAnchor: `S` state, `C` item_count, `R` subrec_count, `L` list,
//! `D` digest list.

use crate::digest::Digest;
use crate::error::{LdtError, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Sentinel stored in every property map; a mismatch means the bin value
/// was not written by this engine.
pub const MAGIC: &str = "MAGIC";

/// Discriminator stored in every descriptor of this collection kind.
pub const LDT_TYPE: &str = "LSET";

/// On-disk schema version written by this engine. Descriptors with a
/// newer stored version are refused.
pub const LDT_VERSION: i64 = 2;

/// Maximum bin name length the host accepts.
pub const BIN_NAME_MAX: usize = 14;

/// Default bucket count for the regular phase. A prime is recommended.
pub const DEFAULT_MODULO: usize = 128;

/// Default compact-to-regular rehash trigger.
pub const DEFAULT_THRESHOLD: usize = 101;

/// Default inline-list size at which a cell promotes into a sub-record.
pub const DEFAULT_CELL_MAX_LIST: usize = 4;

/// Default sub-record entry-count sizing hint.
pub const DEFAULT_LDR_ENTRY_COUNT_MAX: usize = 100;

mod pm {
    pub const ITEM_COUNT: &str = "I";
    pub const SUBREC_COUNT: &str = "S";
    pub const VERSION: &str = "V";
    pub const LDT_TYPE: &str = "T";
    pub const MAGIC: &str = "Z";
    pub const BIN_NAME: &str = "B";
    pub const REC_TYPE: &str = "R";
    pub const ESR_DIGEST: &str = "E";
    pub const PARENT_DIGEST: &str = "P";
    pub const SELF_DIGEST: &str = "D";
    pub const CREATE_TIME: &str = "C";
}

mod lm {
    pub const SET_TYPE_STORE: &str = "T";
    pub const STORE_STATE: &str = "S";
    pub const STORE_MODE: &str = "M";
    pub const KEY_TYPE: &str = "K";
    pub const MODULO: &str = "O";
    pub const THRESHOLD: &str = "H";
    pub const CELL_MAX_LIST: &str = "X";
    pub const COMPACT_LIST: &str = "L";
    pub const HASH_DIRECTORY: &str = "W";
    pub const USER_MODULE: &str = "U";
    pub const KEY_FUNCTION: &str = "F";
    pub const TRANSFORM: &str = "f";
    pub const UNTRANSFORM: &str = "u";
    pub const TOTAL_COUNT: &str = "N";
    pub const STORE_LIMIT: &str = "C";
    pub const LDR_ENTRY_COUNT_MAX: &str = "E";
    pub const LDR_BYTE_ENTRY_SIZE: &str = "B";
    pub const LDR_BYTE_COUNT_MAX: &str = "Y";
    pub const BINARY_STORE_SIZE: &str = "Z";
}

mod ca {
    pub const STATE: &str = "S";
    pub const ITEM_COUNT: &str = "C";
    pub const SUBREC_COUNT: &str = "R";
    pub const LIST: &str = "L";
    pub const DIGESTS: &str = "D";
}

/// Which persistence layout the set was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTypeStore {
    /// All buckets live in numbered bins of the top record.
    Record,
    /// Hash directory in the top record, overflow in sub-records.
    SubRecord,
}

/// Storage phase of the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// All members in one list; no hashing yet.
    Compact,
    /// Members hashed across `modulo` buckets.
    Regular,
}

/// How bucket payloads are encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Value lists. The only implemented mode.
    List,
    /// Packed binary segments. Declared but unimplemented; refused at
    /// create time.
    Binary,
}

/// Whether member keys are scalars or need extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Members are their own keys (Int / Float / String).
    Atomic,
    /// Members are structured; keys come from a key function or the
    /// canonical rendering.
    Complex,
}

/// Role of a record in the large-data-type family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecType {
    /// The user's primary record holding the descriptor.
    Top,
    /// A child record carrying an overflow value list.
    Sub,
    /// The existence sub-record tying child lifetimes to the parent.
    Esr,
}

impl SetTypeStore {
    fn code(self) -> &'static str {
        match self {
            SetTypeStore::Record => "R",
            SetTypeStore::SubRecord => "S",
        }
    }

    fn from_code(c: &str) -> Option<Self> {
        match c {
            "R" => Some(SetTypeStore::Record),
            "S" => Some(SetTypeStore::SubRecord),
            _ => None,
        }
    }
}

impl StoreState {
    fn code(self) -> &'static str {
        match self {
            StoreState::Compact => "C",
            StoreState::Regular => "R",
        }
    }

    fn from_code(c: &str) -> Option<Self> {
        match c {
            "C" => Some(StoreState::Compact),
            "R" => Some(StoreState::Regular),
            _ => None,
        }
    }
}

impl StoreMode {
    fn code(self) -> &'static str {
        match self {
            StoreMode::List => "L",
            StoreMode::Binary => "B",
        }
    }

    fn from_code(c: &str) -> Option<Self> {
        match c {
            "L" => Some(StoreMode::List),
            "B" => Some(StoreMode::Binary),
            _ => None,
        }
    }
}

impl KeyType {
    fn code(self) -> &'static str {
        match self {
            KeyType::Atomic => "A",
            KeyType::Complex => "C",
        }
    }

    fn from_code(c: &str) -> Option<Self> {
        match c {
            "A" => Some(KeyType::Atomic),
            "C" => Some(KeyType::Complex),
            _ => None,
        }
    }
}

impl RecType {
    fn code(self) -> &'static str {
        match self {
            RecType::Top => "T",
            RecType::Sub => "S",
            RecType::Esr => "E",
        }
    }

    fn from_code(c: &str) -> Option<Self> {
        match c {
            "T" => Some(RecType::Top),
            "S" => Some(RecType::Sub),
            "E" => Some(RecType::Esr),
            _ => None,
        }
    }
}

/// Fields common to every large-data-type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap {
    /// Logical number of members.
    pub item_count: u64,
    /// Number of live data sub-records (the ESR is not counted).
    pub subrec_count: u64,
    /// On-disk schema version the descriptor was written with.
    pub version: i64,
    /// Name of the bin holding the descriptor.
    pub bin_name: String,
    /// Role of the record carrying this map.
    pub rec_type: RecType,
    /// Digest of the existence sub-record; `None` until the first
    /// sub-record is created.
    pub esr_digest: Option<Digest>,
    /// Digest of the top record (sub-records only).
    pub parent_digest: Option<Digest>,
    /// Own digest (sub-records only).
    pub self_digest: Option<Digest>,
    /// Creation timestamp in epoch milliseconds. Zero on data
    /// sub-records.
    pub create_time: i64,
}

impl PropertyMap {
    /// A fresh top-record property map.
    pub fn new_top(bin_name: &str, create_time: i64) -> Self {
        PropertyMap {
            item_count: 0,
            subrec_count: 0,
            version: LDT_VERSION,
            bin_name: bin_name.to_string(),
            rec_type: RecType::Top,
            esr_digest: None,
            parent_digest: None,
            self_digest: None,
            create_time,
        }
    }

    /// A property map for a child record.
    pub fn new_child(
        bin_name: &str,
        rec_type: RecType,
        parent: Digest,
        own: Digest,
        esr: Digest,
        create_time: i64,
    ) -> Self {
        PropertyMap {
            item_count: 0,
            subrec_count: 0,
            version: LDT_VERSION,
            bin_name: bin_name.to_string(),
            rec_type,
            esr_digest: Some(esr),
            parent_digest: Some(parent),
            self_digest: Some(own),
            create_time,
        }
    }

    /// Encode as a letter-keyed object, magic and type discriminator
    /// included.
    pub fn to_value(&self) -> Value {
        let mut m = HashMap::new();
        m.insert(pm::ITEM_COUNT.into(), Value::Int(self.item_count as i64));
        m.insert(pm::SUBREC_COUNT.into(), Value::Int(self.subrec_count as i64));
        m.insert(pm::VERSION.into(), Value::Int(self.version));
        m.insert(pm::LDT_TYPE.into(), Value::String(LDT_TYPE.into()));
        m.insert(pm::MAGIC.into(), Value::String(MAGIC.into()));
        m.insert(pm::BIN_NAME.into(), Value::String(self.bin_name.clone()));
        m.insert(pm::REC_TYPE.into(), Value::String(self.rec_type.code().into()));
        if let Some(d) = &self.esr_digest {
            m.insert(pm::ESR_DIGEST.into(), d.to_value());
        }
        if let Some(d) = &self.parent_digest {
            m.insert(pm::PARENT_DIGEST.into(), d.to_value());
        }
        if let Some(d) = &self.self_digest {
            m.insert(pm::SELF_DIGEST.into(), d.to_value());
        }
        m.insert(pm::CREATE_TIME.into(), Value::Int(self.create_time));
        Value::Object(m)
    }

    /// Decode and validate a letter-keyed object.
    ///
    /// `bin` is only used for error context.
    pub fn from_value(bin: &str, v: &Value) -> Result<Self> {
        let m = v
            .as_object()
            .ok_or_else(|| LdtError::damaged(bin, "property map is not an object"))?;

        let magic = get_str(m, pm::MAGIC)
            .ok_or_else(|| LdtError::damaged(bin, "property map has no magic"))?;
        if magic != MAGIC {
            return Err(LdtError::damaged(bin, "magic mismatch"));
        }
        let ldt_type = get_str(m, pm::LDT_TYPE)
            .ok_or_else(|| LdtError::damaged(bin, "property map has no type"))?;
        if ldt_type != LDT_TYPE {
            return Err(LdtError::damaged(
                bin,
                format!("wrong collection type '{}'", ldt_type),
            ));
        }
        let version = get_int(m, pm::VERSION)
            .ok_or_else(|| LdtError::damaged(bin, "property map has no version"))?;
        if version > LDT_VERSION {
            return Err(LdtError::VersionMismatch {
                stored: version,
                engine: LDT_VERSION,
            });
        }

        let rec_type_code = get_str(m, pm::REC_TYPE)
            .ok_or_else(|| LdtError::damaged(bin, "property map has no record type"))?;
        let rec_type = RecType::from_code(rec_type_code)
            .ok_or_else(|| LdtError::damaged(bin, "unknown record type"))?;

        Ok(PropertyMap {
            item_count: get_int(m, pm::ITEM_COUNT).unwrap_or(0).max(0) as u64,
            subrec_count: get_int(m, pm::SUBREC_COUNT).unwrap_or(0).max(0) as u64,
            version,
            bin_name: get_str(m, pm::BIN_NAME)
                .ok_or_else(|| LdtError::damaged(bin, "property map has no bin name"))?
                .to_string(),
            rec_type,
            esr_digest: get_digest(m, pm::ESR_DIGEST)?,
            parent_digest: get_digest(m, pm::PARENT_DIGEST)?,
            self_digest: get_digest(m, pm::SELF_DIGEST)?,
            create_time: get_int(m, pm::CREATE_TIME).unwrap_or(0),
        })
    }
}

/// Set-specific descriptor state.
#[derive(Debug, Clone, PartialEq)]
pub struct LsetMap {
    /// Persistence layout, fixed at create time.
    pub set_type_store: SetTypeStore,
    /// Compact or regular phase.
    pub store_state: StoreState,
    /// Bucket payload encoding.
    pub store_mode: StoreMode,
    /// Scalar or structured member keys.
    pub key_type: KeyType,
    /// Bucket count for the regular phase.
    pub modulo: usize,
    /// Total-count trigger for the compact-to-regular rehash.
    pub threshold: usize,
    /// Inline-list size at which a cell promotes into a sub-record.
    pub cell_max_list: usize,
    /// Members during the compact phase of the sub-record layout.
    pub compact_list: Option<Vec<Value>>,
    /// Cell anchors during the regular phase of the sub-record layout;
    /// exactly `modulo` entries.
    pub hash_directory: Option<Vec<CellAnchor>>,
    /// Registered user module name.
    pub user_module: Option<String>,
    /// Registered key-extraction function name.
    pub key_function: Option<String>,
    /// Registered write-side transform name.
    pub transform: Option<String>,
    /// Registered read-side untransform name.
    pub untransform: Option<String>,
    /// Insertions performed over the set's lifetime, rehashes included.
    pub total_count: u64,
    /// Advisory capacity ceiling; zero means unlimited. Stored but not
    /// enforced.
    pub store_limit: u64,
    /// Sub-record entry-count sizing hint.
    pub ldr_entry_count_max: usize,
    /// Byte size per entry in binary mode. Reserved.
    pub ldr_byte_entry_size: usize,
    /// Byte capacity per sub-record in binary mode. Reserved.
    pub ldr_byte_count_max: usize,
    /// Byte capacity of an inline binary bucket. Reserved.
    pub binary_store_size: usize,
}

impl Default for LsetMap {
    fn default() -> Self {
        LsetMap {
            set_type_store: SetTypeStore::SubRecord,
            store_state: StoreState::Compact,
            store_mode: StoreMode::List,
            key_type: KeyType::Atomic,
            modulo: DEFAULT_MODULO,
            threshold: DEFAULT_THRESHOLD,
            cell_max_list: DEFAULT_CELL_MAX_LIST,
            compact_list: Some(Vec::new()),
            hash_directory: None,
            user_module: None,
            key_function: None,
            transform: None,
            untransform: None,
            total_count: 0,
            store_limit: 0,
            ldr_entry_count_max: DEFAULT_LDR_ENTRY_COUNT_MAX,
            ldr_byte_entry_size: 0,
            ldr_byte_count_max: 0,
            binary_store_size: 0,
        }
    }
}

impl LsetMap {
    /// Encode as a letter-keyed object.
    pub fn to_value(&self) -> Value {
        let mut m = HashMap::new();
        m.insert(
            lm::SET_TYPE_STORE.into(),
            Value::String(self.set_type_store.code().into()),
        );
        m.insert(
            lm::STORE_STATE.into(),
            Value::String(self.store_state.code().into()),
        );
        m.insert(
            lm::STORE_MODE.into(),
            Value::String(self.store_mode.code().into()),
        );
        m.insert(lm::KEY_TYPE.into(), Value::String(self.key_type.code().into()));
        m.insert(lm::MODULO.into(), Value::Int(self.modulo as i64));
        m.insert(lm::THRESHOLD.into(), Value::Int(self.threshold as i64));
        m.insert(lm::CELL_MAX_LIST.into(), Value::Int(self.cell_max_list as i64));
        if let Some(list) = &self.compact_list {
            m.insert(lm::COMPACT_LIST.into(), Value::Array(list.clone()));
        }
        if let Some(dir) = &self.hash_directory {
            m.insert(
                lm::HASH_DIRECTORY.into(),
                Value::Array(dir.iter().map(CellAnchor::to_value).collect()),
            );
        }
        if let Some(s) = &self.user_module {
            m.insert(lm::USER_MODULE.into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.key_function {
            m.insert(lm::KEY_FUNCTION.into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.transform {
            m.insert(lm::TRANSFORM.into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.untransform {
            m.insert(lm::UNTRANSFORM.into(), Value::String(s.clone()));
        }
        m.insert(lm::TOTAL_COUNT.into(), Value::Int(self.total_count as i64));
        m.insert(lm::STORE_LIMIT.into(), Value::Int(self.store_limit as i64));
        m.insert(
            lm::LDR_ENTRY_COUNT_MAX.into(),
            Value::Int(self.ldr_entry_count_max as i64),
        );
        m.insert(
            lm::LDR_BYTE_ENTRY_SIZE.into(),
            Value::Int(self.ldr_byte_entry_size as i64),
        );
        m.insert(
            lm::LDR_BYTE_COUNT_MAX.into(),
            Value::Int(self.ldr_byte_count_max as i64),
        );
        m.insert(
            lm::BINARY_STORE_SIZE.into(),
            Value::Int(self.binary_store_size as i64),
        );
        Value::Object(m)
    }

    /// Decode a letter-keyed object.
    pub fn from_value(bin: &str, v: &Value) -> Result<Self> {
        let m = v
            .as_object()
            .ok_or_else(|| LdtError::damaged(bin, "set map is not an object"))?;

        let set_type_store = get_str(m, lm::SET_TYPE_STORE)
            .and_then(SetTypeStore::from_code)
            .ok_or_else(|| LdtError::damaged(bin, "bad layout code"))?;
        let store_state = get_str(m, lm::STORE_STATE)
            .and_then(StoreState::from_code)
            .ok_or_else(|| LdtError::damaged(bin, "bad store state"))?;
        let store_mode = get_str(m, lm::STORE_MODE)
            .and_then(StoreMode::from_code)
            .ok_or_else(|| LdtError::damaged(bin, "bad store mode"))?;
        let key_type = get_str(m, lm::KEY_TYPE)
            .and_then(KeyType::from_code)
            .ok_or_else(|| LdtError::damaged(bin, "bad key type"))?;

        let compact_list = match m.get(lm::COMPACT_LIST) {
            None => None,
            Some(Value::Array(a)) => Some(a.clone()),
            Some(_) => return Err(LdtError::damaged(bin, "compact list is not an array")),
        };
        let hash_directory = match m.get(lm::HASH_DIRECTORY) {
            None => None,
            Some(Value::Array(a)) => Some(
                a.iter()
                    .map(|c| CellAnchor::from_value(bin, c))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Some(_) => return Err(LdtError::damaged(bin, "hash directory is not an array")),
        };

        Ok(LsetMap {
            set_type_store,
            store_state,
            store_mode,
            key_type,
            modulo: get_usize(m, lm::MODULO).unwrap_or(DEFAULT_MODULO),
            threshold: get_usize(m, lm::THRESHOLD).unwrap_or(DEFAULT_THRESHOLD),
            cell_max_list: get_usize(m, lm::CELL_MAX_LIST).unwrap_or(DEFAULT_CELL_MAX_LIST),
            compact_list,
            hash_directory,
            user_module: get_str(m, lm::USER_MODULE).map(str::to_string),
            key_function: get_str(m, lm::KEY_FUNCTION).map(str::to_string),
            transform: get_str(m, lm::TRANSFORM).map(str::to_string),
            untransform: get_str(m, lm::UNTRANSFORM).map(str::to_string),
            total_count: get_int(m, lm::TOTAL_COUNT).unwrap_or(0).max(0) as u64,
            store_limit: get_int(m, lm::STORE_LIMIT).unwrap_or(0).max(0) as u64,
            ldr_entry_count_max: get_usize(m, lm::LDR_ENTRY_COUNT_MAX)
                .unwrap_or(DEFAULT_LDR_ENTRY_COUNT_MAX),
            ldr_byte_entry_size: get_usize(m, lm::LDR_BYTE_ENTRY_SIZE).unwrap_or(0),
            ldr_byte_count_max: get_usize(m, lm::LDR_BYTE_COUNT_MAX).unwrap_or(0),
            binary_store_size: get_usize(m, lm::BINARY_STORE_SIZE).unwrap_or(0),
        })
    }
}

/// Per-bucket control structure of the sub-record layout's hash
/// directory.
///
/// A cell moves through its states in one direction:
///
/// ```text
/// Empty -> List -> Digest -> Tree (reserved)
/// ```
///
/// `Tree` decodes for forward compatibility, but every operational path
/// that meets one reports an internal error.
#[derive(Debug, Clone, PartialEq)]
pub enum CellAnchor {
    /// No members hash to this bucket.
    Empty,
    /// Members held inline, at most `cell_max_list` of them.
    List(Vec<Value>),
    /// Members overflowed into a single sub-record.
    Digest {
        /// The sub-record holding this bucket's members.
        digest: Digest,
        /// Cached length of the sub-record's list.
        item_count: u64,
    },
    /// Reserved: members spread over several sub-records by secondary
    /// hashing.
    Tree {
        /// The sub-records of this bucket.
        digests: Vec<Digest>,
        /// Cached total member count.
        item_count: u64,
    },
}

impl CellAnchor {
    /// Members accounted to this cell.
    pub fn item_count(&self) -> u64 {
        match self {
            CellAnchor::Empty => 0,
            CellAnchor::List(list) => list.len() as u64,
            CellAnchor::Digest { item_count, .. } => *item_count,
            CellAnchor::Tree { item_count, .. } => *item_count,
        }
    }

    /// Sub-records owned by this cell.
    pub fn subrec_count(&self) -> u64 {
        match self {
            CellAnchor::Empty | CellAnchor::List(_) => 0,
            CellAnchor::Digest { .. } => 1,
            CellAnchor::Tree { digests, .. } => digests.len() as u64,
        }
    }

    /// One-letter state code, used on disk and in dumps.
    pub fn state_code(&self) -> &'static str {
        match self {
            CellAnchor::Empty => "E",
            CellAnchor::List(_) => "L",
            CellAnchor::Digest { .. } => "D",
            CellAnchor::Tree { .. } => "T",
        }
    }

    /// Encode as a letter-keyed object.
    pub fn to_value(&self) -> Value {
        let mut m = HashMap::new();
        m.insert(ca::STATE.into(), Value::String(self.state_code().into()));
        m.insert(ca::ITEM_COUNT.into(), Value::Int(self.item_count() as i64));
        m.insert(ca::SUBREC_COUNT.into(), Value::Int(self.subrec_count() as i64));
        match self {
            CellAnchor::Empty => {}
            CellAnchor::List(list) => {
                m.insert(ca::LIST.into(), Value::Array(list.clone()));
            }
            CellAnchor::Digest { digest, .. } => {
                m.insert(ca::DIGESTS.into(), Value::Array(vec![digest.to_value()]));
            }
            CellAnchor::Tree { digests, .. } => {
                m.insert(
                    ca::DIGESTS.into(),
                    Value::Array(digests.iter().map(Digest::to_value).collect()),
                );
            }
        }
        Value::Object(m)
    }

    /// Decode a letter-keyed object.
    pub fn from_value(bin: &str, v: &Value) -> Result<Self> {
        let m = v
            .as_object()
            .ok_or_else(|| LdtError::damaged(bin, "cell anchor is not an object"))?;
        let state = get_str(m, ca::STATE)
            .ok_or_else(|| LdtError::damaged(bin, "cell anchor has no state"))?;
        match state {
            "E" => Ok(CellAnchor::Empty),
            "L" => match m.get(ca::LIST) {
                Some(Value::Array(a)) => Ok(CellAnchor::List(a.clone())),
                _ => Err(LdtError::damaged(bin, "list cell has no list")),
            },
            "D" => {
                let digests = get_digest_list(bin, m)?;
                match digests.as_slice() {
                    [d] => Ok(CellAnchor::Digest {
                        digest: *d,
                        item_count: get_int(m, ca::ITEM_COUNT).unwrap_or(0).max(0) as u64,
                    }),
                    _ => Err(LdtError::damaged(bin, "digest cell needs exactly one digest")),
                }
            }
            "T" => Ok(CellAnchor::Tree {
                digests: get_digest_list(bin, m)?,
                item_count: get_int(m, ca::ITEM_COUNT).unwrap_or(0).max(0) as u64,
            }),
            other => Err(LdtError::damaged(bin, format!("unknown cell state '{}'", other))),
        }
    }
}

/// The full control descriptor: property map plus set map.
#[derive(Debug, Clone, PartialEq)]
pub struct LsetDescriptor {
    /// Common large-data-type fields.
    pub props: PropertyMap,
    /// Set-specific fields.
    pub map: LsetMap,
}

impl LsetDescriptor {
    /// A fresh descriptor with default settings.
    pub fn new(bin_name: &str, create_time: i64) -> Self {
        LsetDescriptor {
            props: PropertyMap::new_top(bin_name, create_time),
            map: LsetMap::default(),
        }
    }

    /// Encode as the bin value: a two-element array of letter-keyed
    /// objects.
    pub fn to_value(&self) -> Value {
        Value::Array(vec![self.props.to_value(), self.map.to_value()])
    }

    /// Decode and validate a bin value.
    pub fn from_value(bin: &str, v: &Value) -> Result<Self> {
        let parts = v
            .as_array()
            .ok_or_else(|| LdtError::damaged(bin, "bin value is not a two-map list"))?;
        let [props, map] = parts else {
            return Err(LdtError::damaged(bin, "bin value is not a two-map list"));
        };
        Ok(LsetDescriptor {
            props: PropertyMap::from_value(bin, props)?,
            map: LsetMap::from_value(bin, map)?,
        })
    }

    /// Human-readable settings and counters, the payload of the `config`
    /// operation.
    pub fn config_value(&self) -> Value {
        let mut m = HashMap::new();
        m.insert("BinName".into(), Value::String(self.props.bin_name.clone()));
        m.insert("ItemCount".into(), Value::Int(self.props.item_count as i64));
        m.insert("SubRecCount".into(), Value::Int(self.props.subrec_count as i64));
        m.insert("Version".into(), Value::Int(self.props.version));
        m.insert(
            "SetTypeStore".into(),
            Value::String(
                match self.map.set_type_store {
                    SetTypeStore::Record => "record",
                    SetTypeStore::SubRecord => "subrecord",
                }
                .into(),
            ),
        );
        m.insert(
            "StoreState".into(),
            Value::String(
                match self.map.store_state {
                    StoreState::Compact => "compact",
                    StoreState::Regular => "regular",
                }
                .into(),
            ),
        );
        m.insert(
            "KeyType".into(),
            Value::String(
                match self.map.key_type {
                    KeyType::Atomic => "atomic",
                    KeyType::Complex => "complex",
                }
                .into(),
            ),
        );
        m.insert("Modulo".into(), Value::Int(self.map.modulo as i64));
        m.insert("Threshold".into(), Value::Int(self.map.threshold as i64));
        m.insert(
            "HashCellMaxList".into(),
            Value::Int(self.map.cell_max_list as i64),
        );
        m.insert("TotalCount".into(), Value::Int(self.map.total_count as i64));
        m.insert("StoreLimit".into(), Value::Int(self.map.store_limit as i64));
        if let Some(s) = &self.map.user_module {
            m.insert("UserModule".into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.map.key_function {
            m.insert("KeyFunction".into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.map.transform {
            m.insert("Transform".into(), Value::String(s.clone()));
        }
        if let Some(s) = &self.map.untransform {
            m.insert("UnTransform".into(), Value::String(s.clone()));
        }
        Value::Object(m)
    }
}

fn get_str<'a>(m: &'a HashMap<String, Value>, key: &str) -> Option<&'a str> {
    m.get(key).and_then(Value::as_str)
}

fn get_int(m: &HashMap<String, Value>, key: &str) -> Option<i64> {
    m.get(key).and_then(Value::as_int)
}

fn get_usize(m: &HashMap<String, Value>, key: &str) -> Option<usize> {
    get_int(m, key).and_then(|i| usize::try_from(i).ok())
}

fn get_digest(m: &HashMap<String, Value>, key: &str) -> Result<Option<Digest>> {
    match m.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => Digest::from_value(v).map(Some),
    }
}

fn get_digest_list(bin: &str, m: &HashMap<String, Value>) -> Result<Vec<Digest>> {
    match m.get(ca::DIGESTS) {
        Some(Value::Array(a)) => a.iter().map(Digest::from_value).collect(),
        _ => Err(LdtError::damaged(bin, "cell anchor has no digest list")),
    }
}

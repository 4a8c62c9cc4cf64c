//! # largeset-core
//!
//! Core types for the largeset engine.
//!
//! This crate defines the data model shared by the engine and the public
//! facade:
//!
//! - [`Value`] - the canonical value type for set members and keys
//! - [`LdtError`] - the structured error taxonomy
//! - [`Digest`] - content digests identifying sub-records
//! - [`descriptor`] - the two-map control descriptor persisted in the
//!   user bin, with its on-disk letter encoding
//! - [`settings`] - create-time configuration and packaged presets
//! - [`functions`] - user function registry and the per-call
//!   [`FunctionContext`]
//!
//! The engine itself (records, hosts, layout drivers) lives in
//! `largeset-engine`; this crate stays dependency-light so both the
//! engine and embedders can share one vocabulary.

#![warn(missing_docs)]

pub mod descriptor;
pub mod digest;
pub mod error;
pub mod functions;
pub mod settings;
pub mod value;

pub use descriptor::{
    CellAnchor, KeyType, LsetDescriptor, LsetMap, PropertyMap, RecType, SetTypeStore, StoreMode,
    StoreState, BIN_NAME_MAX, DEFAULT_CELL_MAX_LIST, DEFAULT_MODULO, DEFAULT_THRESHOLD,
    LDT_TYPE, LDT_VERSION, MAGIC,
};
pub use digest::Digest;
pub use error::{LdtError, Result};
pub use functions::{FilterSpec, FunctionContext, UserModule, UserModuleRegistry};
pub use value::Value;

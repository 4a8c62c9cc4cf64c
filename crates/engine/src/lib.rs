//! # largeset-engine
//!
//! The large-set engine: a persistent, unique-membership set embedded in
//! one bin of a key-value record.
//!
//! A set starts life *compact* - every member in a single list - and is
//! rehashed across `modulo` buckets once it crosses a threshold. Where
//! those buckets live is fixed at create time:
//!
//! - **record layout** - buckets are numbered hidden bins of the top
//!   record itself; total capacity is bounded by record size;
//! - **sub-record layout** - a directory of cell anchors in the
//!   descriptor, with per-cell overflow into digest-keyed child records,
//!   for effectively unbounded capacity.
//!
//! The engine runs single-threaded inside one host-provided call; the
//! host serializes writes per record. All storage side effects flow
//! through the [`Host`] trait, and every operation either commits via
//! `Host::update` or raises an error having released any sub-records it
//! opened.
//!
//! Entry points live on [`Engine`]; [`MemoryHost`] provides an
//! in-process host for tests and embedding.

#![warn(missing_docs)]

mod cell;
mod hash;
mod search;

pub mod engine;
pub mod host;
pub mod record;
pub mod subrec;
pub mod validate;

mod sub_layout;
mod top_layout;

pub use engine::Engine;
pub use host::{Host, MemoryHost};
pub use record::{BinFlags, SubRecord, TopRecord};
pub use subrec::SubRecContext;

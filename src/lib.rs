//! # largeset
//!
//! An embedded large-set data structure: unique membership over typed
//! values, persisted inside a single bin of a key-value record.
//!
//! A set starts compact (one inline list) and rehashes across a bucket
//! table as it grows. Buckets live either in hidden bins of the record
//! itself (bounded by record size) or in digest-keyed sub-records
//! (effectively unbounded), chosen at create time.
//!
//! ## Quick Start
//!
//! ```
//! use largeset::prelude::*;
//!
//! # fn main() -> largeset::Result<()> {
//! let mut set = LargeSet::create("colors")?;
//!
//! set.add("red")?;
//! set.add("green")?;
//! assert!(set.exists("red")?);
//! assert_eq!(set.len()?, 2);
//!
//! // Duplicates are rejected.
//! assert!(set.add("red").is_err());
//!
//! set.remove("green")?;
//! assert_eq!(set.len()?, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Tuning
//!
//! ```
//! use largeset::prelude::*;
//!
//! # fn main() -> largeset::Result<()> {
//! let mut set = LargeSet::builder()
//!     .modulo(31)
//!     .threshold(16)
//!     .record_layout()
//!     .create("scores")?;
//! for i in 0..100 {
//!     set.add(i)?;
//! }
//! assert_eq!(set.len()?, 100);
//! # Ok(())
//! # }
//! ```
//!
//! ## Layers
//!
//! - This crate - an owned, in-process set with a simple API.
//! - [`largeset_engine`](https://docs.rs/largeset-engine) - the engine
//!   behind it, generic over a [`Host`] so it can run inside a real
//!   database runtime.
//! - `largeset-core` - the shared vocabulary: [`Value`], errors, the
//!   control descriptor.

#![warn(missing_docs)]

mod error;
mod set;

pub mod prelude;

pub use error::{Error, Result};
pub use set::{LargeSet, LargeSetBuilder};

// Core vocabulary
pub use largeset_core::{FilterSpec, LdtError, UserModule, UserModuleRegistry, Value};

// Engine surface for embedders
pub use largeset_engine::{Engine, Host, MemoryHost, SubRecContext, TopRecord};

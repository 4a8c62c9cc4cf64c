//! Convenient imports.
//!
//! ```
//! use largeset::prelude::*;
//!
//! # fn main() -> largeset::Result<()> {
//! let mut set = LargeSet::create("tags")?;
//! set.add("alpha")?;
//! set.add(json!({"id": "x", "weight": 3}))?;
//! # Ok(())
//! # }
//! ```

// Main entry point
pub use crate::set::{LargeSet, LargeSetBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use largeset_core::{FilterSpec, UserModule, UserModuleRegistry, Value};

// Engine surface for embedders
pub use largeset_engine::{Engine, Host, MemoryHost, TopRecord};

// Re-export serde_json's json! for ergonomic structured members;
// `Value` converts from `serde_json::Value`.
pub use serde_json::json;

//! Entry-point validation: bin names and descriptor integrity.
//!
//! Every operation starts here. The rules:
//!
//! | check | failure |
//! |-------|---------|
//! | bin name non-empty | `BinNameEmpty` |
//! | bin name within 14 characters | `BinNameTooLong` |
//! | top record exists (when required) | `TopRecNotFound` |
//! | bin present (when required) | `BinNotFound` |
//! | bin value is the two-map descriptor | `BinDamaged` |
//! | magic and collection type match | `BinDamaged` |
//! | stored version not newer than engine | `VersionMismatch` |
//!
//! A present-but-corrupt descriptor is rejected even on paths that
//! tolerate an absent bin.

use crate::record::TopRecord;
use largeset_core::descriptor::{LsetDescriptor, BIN_NAME_MAX};
use largeset_core::error::{LdtError, Result};

/// Check bin-name rules.
pub fn validate_bin_name(bin: &str) -> Result<()> {
    if bin.trim().is_empty() {
        return Err(LdtError::BinNameEmpty);
    }
    let len = bin.chars().count();
    if len > BIN_NAME_MAX {
        return Err(LdtError::BinNameTooLong {
            name: bin.to_string(),
            len,
        });
    }
    Ok(())
}

/// Open and validate a descriptor that must exist.
pub fn open_existing(rec: &TopRecord, bin: &str) -> Result<LsetDescriptor> {
    if !rec.exists() {
        return Err(LdtError::TopRecNotFound);
    }
    let value = rec.bin(bin).ok_or_else(|| LdtError::BinNotFound {
        bin: bin.to_string(),
    })?;
    let desc = LsetDescriptor::from_value(bin, value)?;
    if desc.props.bin_name != bin {
        return Err(LdtError::damaged(bin, "descriptor names a different bin"));
    }
    Ok(desc)
}

/// Open a descriptor that may be absent (the create-on-first-use path).
pub fn open_optional(rec: &TopRecord, bin: &str) -> Result<Option<LsetDescriptor>> {
    match rec.bin(bin) {
        None => Ok(None),
        Some(value) => {
            let desc = LsetDescriptor::from_value(bin, value)?;
            if desc.props.bin_name != bin {
                return Err(LdtError::damaged(bin, "descriptor names a different bin"));
            }
            Ok(Some(desc))
        }
    }
}

//! Bucket selection.
//!
//! A key maps to a bucket index via `CRC32(key) mod modulo`. Only atomic
//! keys (Int / Float / String) reach this point: structured members have
//! already been reduced to an atomic key by extraction, so a non-atomic
//! key here is an engine bug, not a user error.

use largeset_core::descriptor::StoreState;
use largeset_core::error::{LdtError, Result};
use largeset_core::value::Value;

/// Bucket index for a key.
///
/// In the compact phase there is only one bucket; everything hashes to
/// zero.
pub fn bucket_for(key: &Value, modulo: usize, state: StoreState) -> Result<usize> {
    if state == StoreState::Compact {
        return Ok(0);
    }
    let modulo = modulo.max(1);
    let hash = match key {
        Value::String(s) => crc32fast::hash(s.as_bytes()),
        Value::Int(i) => crc32fast::hash(i.to_string().as_bytes()),
        Value::Float(f) => crc32fast::hash(f.to_string().as_bytes()),
        other => {
            return Err(LdtError::internal(format!(
                "non-atomic key of type {} reached bucket selection",
                other.type_name()
            )))
        }
    };
    Ok(hash as usize % modulo)
}

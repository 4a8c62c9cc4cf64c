//! Content digests identifying sub-records.
//!
//! A digest is the host-generated 20-byte identifier of a child record.
//! The engine treats digests as opaque: it stores them in cell anchors
//! and descriptor fields and hands them back to the host to open, update
//! or remove the record they name.

use crate::error::{LdtError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Width of a digest in bytes.
pub const DIGEST_LEN: usize = 20;

/// A 20-byte content digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// Wrap raw digest bytes.
    pub fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Digest(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex rendering, used in diagnostics and error messages.
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(DIGEST_LEN * 2);
        for b in self.0 {
            out.push_str(&format!("{:02x}", b));
        }
        out
    }

    /// Encode as a persistable [`Value`].
    pub fn to_value(&self) -> Value {
        Value::Bytes(self.0.to_vec())
    }

    /// Decode from a persisted [`Value`].
    ///
    /// Anything other than a 20-byte `Bytes` value is a damaged
    /// descriptor, reported as `Internal` here and wrapped with bin
    /// context by the caller.
    pub fn from_value(v: &Value) -> Result<Self> {
        match v {
            Value::Bytes(b) if b.len() == DIGEST_LEN => {
                let mut bytes = [0u8; DIGEST_LEN];
                bytes.copy_from_slice(b);
                Ok(Digest(bytes))
            }
            other => Err(LdtError::internal(format!(
                "expected {}-byte digest, got {}",
                DIGEST_LEN,
                other.type_name()
            ))),
        }
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

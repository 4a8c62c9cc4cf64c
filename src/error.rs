//! Public error type for the facade API.
//!
//! The engine's structured [`LdtError`] taxonomy is folded into a small
//! number of user-facing categories. Embedders that need the precise
//! kind can use the engine API directly, which surfaces `LdtError`
//! itself.

use largeset_core::LdtError;
use thiserror::Error;

/// All facade errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// Member, set or record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Insert of a member whose key is already present.
    #[error("duplicate member: {0}")]
    Duplicate(String),

    /// Malformed argument or configuration.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stored control structure failed validation.
    #[error("corrupt set: {0}")]
    Corrupt(String),

    /// The storage layer failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// Bug or invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for the miss outcome of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for a duplicate-insert rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::Duplicate(_))
    }
}

impl From<LdtError> for Error {
    fn from(e: LdtError) -> Self {
        match e {
            LdtError::NotFound { key } => Error::NotFound(key),
            LdtError::TopRecNotFound => Error::NotFound("top record".to_string()),
            LdtError::BinNotFound { bin } => Error::NotFound(format!("set '{}'", bin)),

            LdtError::UniqueKeyViolation { key } => Error::Duplicate(key),

            LdtError::BinNameEmpty
            | LdtError::BinNameTooLong { .. }
            | LdtError::BinExists { .. }
            | LdtError::InputParam { .. }
            | LdtError::UserModuleNotFound { .. }
            | LdtError::UserModuleBad { .. } => Error::InvalidInput(e.to_string()),

            LdtError::BinDamaged { .. } | LdtError::VersionMismatch { .. } => {
                Error::Corrupt(e.to_string())
            }

            LdtError::SubRecOpen { .. }
            | LdtError::SubRecDelete { .. }
            | LdtError::TopRecUpdate { .. } => Error::Storage(e.to_string()),

            LdtError::Internal { message } => Error::Internal(message),
        }
    }
}

/// Result type for facade operations.
pub type Result<T> = std::result::Result<T, Error>;

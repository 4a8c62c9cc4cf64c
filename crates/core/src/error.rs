//! Error taxonomy for the largeset engine.
//!
//! `LdtError` is the canonical error type for everything below the public
//! facade. Each variant maps to one stable error code (see
//! [`LdtError::error_code`]); codes are frozen and must not change.
//!
//! ## Error Codes
//!
//! | Code | Raised when |
//! |------|-------------|
//! | BinNameEmpty | bin name is empty or blank |
//! | BinNameTooLong | bin name exceeds 14 characters |
//! | TopRecNotFound | top record does not exist |
//! | BinNotFound | operation requires a set that is not there |
//! | BinExists | create over an existing bin, or a second top-record-layout set in one record |
//! | BinDamaged | bin value fails the magic / type / shape check |
//! | VersionMismatch | stored descriptor version is newer than the engine |
//! | UniqueKeyViolation | insert of a key already in the set |
//! | NotFound | search / remove miss |
//! | InputParam | malformed argument (bad capacity, bad option type, …) |
//! | UserModuleNotFound | named user module is not registered |
//! | UserModuleBad | user module or packaged settings reference is invalid |
//! | SubRecOpen | host failed to open a sub-record |
//! | SubRecDelete | host failed to remove a sub-record |
//! | TopRecUpdate | host failed to commit the top record |
//! | Internal | invariant violation (should be unreachable) |
//!
//! Errors are non-recoverable inside the engine: every error aborts the
//! call, open sub-records are released, and the top record is not
//! committed.

use thiserror::Error;

/// All engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LdtError {
    /// Bin name is empty or blank.
    #[error("bin name is empty")]
    BinNameEmpty,

    /// Bin name exceeds the host's 14-character limit.
    #[error("bin name '{name}' is {len} characters, limit is 14")]
    BinNameTooLong {
        /// The offending name.
        name: String,
        /// Its character count.
        len: usize,
    },

    /// The top record does not exist in storage.
    #[error("top record not found")]
    TopRecNotFound,

    /// The named bin holds no set.
    #[error("bin '{bin}' does not exist")]
    BinNotFound {
        /// The bin that was expected to hold a set.
        bin: String,
    },

    /// The named bin is already taken.
    #[error("bin '{bin}' already exists")]
    BinExists {
        /// The bin that is already occupied.
        bin: String,
    },

    /// The bin value failed descriptor validation.
    #[error("bin '{bin}' is damaged: {reason}")]
    BinDamaged {
        /// The bin holding the damaged descriptor.
        bin: String,
        /// What the validation found.
        reason: String,
    },

    /// The stored descriptor was written by a newer engine.
    #[error("descriptor version {stored} is newer than engine version {engine}")]
    VersionMismatch {
        /// Version found on disk.
        stored: i64,
        /// This engine's version.
        engine: i64,
    },

    /// Insert of a key that is already a member.
    #[error("unique key violation: {key}")]
    UniqueKeyViolation {
        /// Rendering of the duplicate key.
        key: String,
    },

    /// Search, get or remove missed.
    #[error("not found: {key}")]
    NotFound {
        /// Rendering of the key that missed.
        key: String,
    },

    /// Malformed input argument.
    #[error("invalid input: {reason}")]
    InputParam {
        /// What was wrong with the argument.
        reason: String,
    },

    /// A named user module is not registered.
    #[error("user module '{module}' not found")]
    UserModuleNotFound {
        /// The missing module name.
        module: String,
    },

    /// A user module or packaged settings reference is unusable.
    #[error("user module '{module}' is invalid: {reason}")]
    UserModuleBad {
        /// The offending module or package name.
        module: String,
        /// Why it is unusable.
        reason: String,
    },

    /// The host failed to open a sub-record.
    #[error("cannot open sub-record {digest}")]
    SubRecOpen {
        /// Hex rendering of the digest that failed to open.
        digest: String,
    },

    /// The host failed to remove a sub-record.
    #[error("cannot remove sub-record {digest}")]
    SubRecDelete {
        /// Hex rendering of the digest that failed to remove.
        digest: String,
    },

    /// The host failed to commit the top record.
    #[error("top record update failed: {reason}")]
    TopRecUpdate {
        /// Host-reported failure.
        reason: String,
    },

    /// Invariant violation. Reaching this is a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the violated invariant.
        message: String,
    },
}

impl LdtError {
    /// The canonical, frozen code string for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            LdtError::BinNameEmpty => "BinNameEmpty",
            LdtError::BinNameTooLong { .. } => "BinNameTooLong",
            LdtError::TopRecNotFound => "TopRecNotFound",
            LdtError::BinNotFound { .. } => "BinNotFound",
            LdtError::BinExists { .. } => "BinExists",
            LdtError::BinDamaged { .. } => "BinDamaged",
            LdtError::VersionMismatch { .. } => "VersionMismatch",
            LdtError::UniqueKeyViolation { .. } => "UniqueKeyViolation",
            LdtError::NotFound { .. } => "NotFound",
            LdtError::InputParam { .. } => "InputParam",
            LdtError::UserModuleNotFound { .. } => "UserModuleNotFound",
            LdtError::UserModuleBad { .. } => "UserModuleBad",
            LdtError::SubRecOpen { .. } => "SubRecOpen",
            LdtError::SubRecDelete { .. } => "SubRecDelete",
            LdtError::TopRecUpdate { .. } => "TopRecUpdate",
            LdtError::Internal { .. } => "Internal",
        }
    }

    /// Shorthand for an internal invariant violation.
    pub fn internal(message: impl Into<String>) -> Self {
        LdtError::Internal {
            message: message.into(),
        }
    }

    /// Shorthand for a damaged-bin error.
    pub fn damaged(bin: impl Into<String>, reason: impl Into<String>) -> Self {
        LdtError::BinDamaged {
            bin: bin.into(),
            reason: reason.into(),
        }
    }

    /// True for the miss outcome of a lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(self, LdtError::NotFound { .. })
    }

    /// True for a duplicate-insert rejection.
    pub fn is_unique_key_violation(&self) -> bool {
        matches!(self, LdtError::UniqueKeyViolation { .. })
    }
}

/// Result alias used throughout the core and engine crates.
pub type Result<T> = std::result::Result<T, LdtError>;

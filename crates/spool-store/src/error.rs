use std::path::PathBuf;

use spool_types::{StorageAddress, TypeError};

/// Errors from envelope store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A persisted envelope could not be decoded.
    #[error("corrupt envelope {address}: {reason}")]
    Corrupt {
        address: StorageAddress,
        reason: String,
    },

    /// The envelope could not be serialized or addressed.
    #[error("envelope error: {0}")]
    Envelope(#[from] TypeError),

    /// The storage root exists but is not a directory.
    #[error("storage root {0} is not a directory")]
    NotADirectory(PathBuf),

    /// The storage root does not exist.
    #[error("storage root {0} does not exist")]
    Missing(PathBuf),
}

impl StoreError {
    /// Whether the envelope lacks the field its address is derived from.
    pub fn is_identity_missing(&self) -> bool {
        matches!(self, Self::Envelope(TypeError::IdentityMissing(_)))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

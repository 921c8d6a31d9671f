use thiserror::Error;

/// Errors produced by envelope parsing and address derivation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("item header has no string \"type\" field")]
    MissingItemType,

    #[error("truncated item payload: expected {expected} bytes, {actual} remaining")]
    Truncated { expected: u64, actual: u64 },

    #[error("{0} unexpected bytes after the last item")]
    TrailingData(usize),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// The address scheme needs a header the envelope does not carry.
    #[error("envelope has no {0} to derive a storage address from")]
    IdentityMissing(&'static str),

    #[error("invalid storage address {0:?}")]
    InvalidAddress(String),
}

/// Result alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;

use thiserror::Error;

/// Failure reported by the underlying [`Sender`](crate::Sender).
///
/// Returned to the caller of `deliver` exactly as the sender produced it.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("server responded with status {0}")]
    Status(u16),

    #[error("send failed: {0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("store error: {0}")]
    Store(#[from] spool_store::StoreError),

    #[error("worker error: {0}")]
    Worker(#[from] spool_worker::WorkerError),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

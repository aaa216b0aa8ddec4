use trellis_types::PayloadHash;

/// Errors from payload store operations.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Stored bytes no longer match their hash (data corruption).
    #[error("hash mismatch for payload {0}")]
    HashMismatch(PayloadHash),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend is read-only or otherwise unavailable.
    #[error("payload store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for payload store operations.
pub type PayloadResult<T> = Result<T, PayloadError>;

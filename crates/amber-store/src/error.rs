use amber_types::Oid;

/// Errors from backing-store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store has no object under this OID.
    #[error("unknown oid: {0}")]
    UnknownOid(Oid),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored bytes for an object are malformed.
    #[error("corrupt object {oid}: {reason}")]
    Corrupt { oid: Oid, reason: String },

    /// Backend-specific failure that is neither I/O nor corruption.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result alias for backing-store operations.
pub type StoreResult<T> = Result<T, StoreError>;

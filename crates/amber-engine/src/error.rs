use amber_store::StoreError;
use amber_types::Oid;

use crate::codec::CodecError;

/// Errors produced by lifecycle-engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// An operation requiring an OID was invoked on a transient object.
    #[error("object is not persistent")]
    NotPersistent,

    /// `make_persistent` was invoked on an object already owned by a
    /// different storage handle.
    #[error("object is already persistent in a different storage")]
    AlreadyPersistentElsewhere,

    /// No object exists under this OID: never allocated, or deallocated and
    /// now reachable only through a dangling link.
    #[error("unknown oid: {0}")]
    UnknownOid(Oid),

    /// The object's field data is not materialized and cannot be loaded
    /// (e.g. a raw stub deallocated before it was ever loaded).
    #[error("object body is not materialized")]
    Unmaterialized,

    /// Typed accessor downcast failed.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    /// The owning storage handle has been dropped.
    #[error("owning storage has been dropped")]
    StorageGone,

    /// Backing-store failure, propagated unchanged. A failed load leaves the
    /// object raw; a failed commit leaves all pending objects modified.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Encode/decode failure. Same retry semantics as store failures.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

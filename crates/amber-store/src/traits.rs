use amber_types::Oid;

use crate::error::StoreResult;

/// OID-keyed byte storage consumed by the lifecycle engine.
///
/// All implementations must satisfy these invariants:
/// - `allocate_oid` is monotonic: an OID handed out once is never handed out
///   again while the store is open, even after `free_oid`.
/// - `write_bytes` fully replaces the previous bytes for an OID; after a
///   successful return the new bytes are what `read_bytes` observes.
/// - `read_bytes` of an OID that was never written fails with `UnknownOid`.
/// - `free_oid` of an OID with no written bytes is a no-op; an object can be
///   deallocated before it was ever committed.
/// - All I/O errors are propagated, never silently ignored.
///
/// The store never interprets object bytes. Framing, type tags, and reference
/// encoding are the codec's concern, one layer up.
pub trait BackingStore: Send + Sync {
    /// Allocate a fresh, never-before-issued OID.
    fn allocate_oid(&self) -> StoreResult<Oid>;

    /// Release an OID. Its bytes (if any) are removed; the OID itself is
    /// retired and will not be reissued.
    fn free_oid(&self, oid: Oid) -> StoreResult<()>;

    /// Read the bytes last written for `oid`.
    ///
    /// Returns `UnknownOid` if nothing was ever written under this OID.
    fn read_bytes(&self, oid: Oid) -> StoreResult<Vec<u8>>;

    /// Write (or overwrite) the bytes for `oid`.
    ///
    /// Durability: once this returns `Ok` the bytes must survive a crash,
    /// to whatever degree the backend promises (the file backend writes to
    /// a temporary file and renames into place).
    fn write_bytes(&self, oid: Oid, bytes: &[u8]) -> StoreResult<()>;

    /// Check whether bytes exist for `oid`.
    fn contains(&self, oid: Oid) -> StoreResult<bool>;
}

// A shared store is still a store. Lets several storage sessions (or a
// session and a test harness) hold the same backend.
impl<S: BackingStore + ?Sized> BackingStore for std::sync::Arc<S> {
    fn allocate_oid(&self) -> StoreResult<Oid> {
        (**self).allocate_oid()
    }

    fn free_oid(&self, oid: Oid) -> StoreResult<()> {
        (**self).free_oid(oid)
    }

    fn read_bytes(&self, oid: Oid) -> StoreResult<Vec<u8>> {
        (**self).read_bytes(oid)
    }

    fn write_bytes(&self, oid: Oid, bytes: &[u8]) -> StoreResult<()> {
        (**self).write_bytes(oid, bytes)
    }

    fn contains(&self, oid: Oid) -> StoreResult<bool> {
        (**self).contains(oid)
    }
}

//! Fault-injecting store wrapper for failure-path tests.

use std::sync::atomic::{AtomicI64, Ordering};

use amber_types::Oid;

use crate::error::{StoreError, StoreResult};
use crate::traits::BackingStore;

/// Wraps another [`BackingStore`] and fails writes on demand.
///
/// `fail_write_after(n)` arms the store to let `n` writes succeed and then
/// fail every subsequent write with an I/O error until [`clear_faults`] is
/// called. Reads and allocation are never failed. Used to exercise the
/// all-or-nothing commit contract.
///
/// [`clear_faults`]: FailingStore::clear_faults
pub struct FailingStore<S> {
    inner: S,
    /// Writes remaining before injected failure; negative means disarmed.
    writes_until_failure: AtomicI64,
}

impl<S: BackingStore> FailingStore<S> {
    /// Wrap `inner` with fault injection disarmed.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            writes_until_failure: AtomicI64::new(-1),
        }
    }

    /// Let `n` more writes succeed, then fail every write.
    pub fn fail_write_after(&self, n: u64) {
        self.writes_until_failure
            .store(n as i64, Ordering::SeqCst);
    }

    /// Disarm fault injection; writes succeed again.
    pub fn clear_faults(&self) {
        self.writes_until_failure.store(-1, Ordering::SeqCst);
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BackingStore> BackingStore for FailingStore<S> {
    fn allocate_oid(&self) -> StoreResult<Oid> {
        self.inner.allocate_oid()
    }

    fn free_oid(&self, oid: Oid) -> StoreResult<()> {
        self.inner.free_oid(oid)
    }

    fn read_bytes(&self, oid: Oid) -> StoreResult<Vec<u8>> {
        self.inner.read_bytes(oid)
    }

    fn write_bytes(&self, oid: Oid, bytes: &[u8]) -> StoreResult<()> {
        let remaining = self.writes_until_failure.load(Ordering::SeqCst);
        if remaining >= 0 {
            if remaining == 0 {
                return Err(StoreError::Io(std::io::Error::other(
                    "injected write failure",
                )));
            }
            self.writes_until_failure
                .store(remaining - 1, Ordering::SeqCst);
        }
        self.inner.write_bytes(oid, bytes)
    }

    fn contains(&self, oid: Oid) -> StoreResult<bool> {
        self.inner.contains(oid)
    }
}

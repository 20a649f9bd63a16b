use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use amber_types::Oid;

use crate::error::{StoreError, StoreResult};
use crate::traits::BackingStore;

/// In-memory, HashMap-based backing store.
///
/// Intended for tests and embedding. All object bytes are held in memory
/// behind a `RwLock`; OID allocation is a monotonic atomic counter starting
/// at 1 (0 is the reserved null OID).
pub struct InMemoryBackingStore {
    objects: RwLock<HashMap<Oid, Vec<u8>>>,
    next_oid: AtomicU64,
}

impl InMemoryBackingStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            next_oid: AtomicU64::new(1),
        }
    }

    /// Number of objects with stored bytes.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if no object bytes are stored.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored objects.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Return a sorted list of all OIDs with stored bytes.
    pub fn all_oids(&self) -> Vec<Oid> {
        let map = self.objects.read().expect("lock poisoned");
        let mut oids: Vec<Oid> = map.keys().copied().collect();
        oids.sort();
        oids
    }
}

impl Default for InMemoryBackingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BackingStore for InMemoryBackingStore {
    fn allocate_oid(&self) -> StoreResult<Oid> {
        let raw = self.next_oid.fetch_add(1, Ordering::SeqCst);
        Ok(Oid::new(raw))
    }

    fn free_oid(&self, oid: Oid) -> StoreResult<()> {
        if oid.is_null() {
            return Err(StoreError::UnknownOid(oid));
        }
        // The counter is never rewound, so the OID is retired for good.
        self.objects.write().expect("lock poisoned").remove(&oid);
        Ok(())
    }

    fn read_bytes(&self, oid: Oid) -> StoreResult<Vec<u8>> {
        let map = self.objects.read().expect("lock poisoned");
        map.get(&oid)
            .cloned()
            .ok_or(StoreError::UnknownOid(oid))
    }

    fn write_bytes(&self, oid: Oid, bytes: &[u8]) -> StoreResult<()> {
        if oid.is_null() {
            return Err(StoreError::UnknownOid(oid));
        }
        let mut map = self.objects.write().expect("lock poisoned");
        map.insert(oid, bytes.to_vec());
        Ok(())
    }

    fn contains(&self, oid: Oid) -> StoreResult<bool> {
        let map = self.objects.read().expect("lock poisoned");
        Ok(map.contains_key(&oid))
    }
}

impl std::fmt::Debug for InMemoryBackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBackingStore")
            .field("object_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_is_monotonic() {
        let store = InMemoryBackingStore::new();
        let a = store.allocate_oid().unwrap();
        let b = store.allocate_oid().unwrap();
        let c = store.allocate_oid().unwrap();
        assert!(a < b && b < c);
        assert!(!a.is_null());
    }

    #[test]
    fn freed_oids_are_not_reissued() {
        let store = InMemoryBackingStore::new();
        let a = store.allocate_oid().unwrap();
        store.free_oid(a).unwrap();
        let b = store.allocate_oid().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn write_then_read() {
        let store = InMemoryBackingStore::new();
        let oid = store.allocate_oid().unwrap();
        store.write_bytes(oid, b"hello").unwrap();
        assert_eq!(store.read_bytes(oid).unwrap(), b"hello");
        assert!(store.contains(oid).unwrap());
    }

    #[test]
    fn overwrite_replaces_bytes() {
        let store = InMemoryBackingStore::new();
        let oid = store.allocate_oid().unwrap();
        store.write_bytes(oid, b"first").unwrap();
        store.write_bytes(oid, b"second").unwrap();
        assert_eq!(store.read_bytes(oid).unwrap(), b"second");
    }

    #[test]
    fn read_unknown_oid_fails() {
        let store = InMemoryBackingStore::new();
        let err = store.read_bytes(Oid::new(99)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownOid(_)));
    }

    #[test]
    fn free_without_bytes_is_ok() {
        let store = InMemoryBackingStore::new();
        let oid = store.allocate_oid().unwrap();
        // Never written: the object was deallocated before its first commit.
        store.free_oid(oid).unwrap();
        assert!(!store.contains(oid).unwrap());
    }

    #[test]
    fn free_removes_bytes() {
        let store = InMemoryBackingStore::new();
        let oid = store.allocate_oid().unwrap();
        store.write_bytes(oid, b"data").unwrap();
        store.free_oid(oid).unwrap();
        assert!(!store.contains(oid).unwrap());
        assert!(store.read_bytes(oid).is_err());
    }

    #[test]
    fn null_oid_is_rejected() {
        let store = InMemoryBackingStore::new();
        assert!(store.write_bytes(Oid::NULL, b"x").is_err());
        assert!(store.free_oid(Oid::NULL).is_err());
    }

    #[test]
    fn accounting_helpers() {
        let store = InMemoryBackingStore::new();
        assert!(store.is_empty());
        let a = store.allocate_oid().unwrap();
        let b = store.allocate_oid().unwrap();
        store.write_bytes(a, b"aa").unwrap();
        store.write_bytes(b, b"bbb").unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.total_bytes(), 5);
        assert_eq!(store.all_oids(), vec![a, b]);
    }
}

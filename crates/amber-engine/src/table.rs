use std::collections::{BTreeSet, HashMap};

use amber_types::Oid;

use crate::cell::ObjHandle;

/// The authoritative index of every object known to one storage handle,
/// plus the dirty set pending the next commit.
///
/// The table owns the objects (it holds the strong handles); links between
/// objects carry OIDs resolved through this table, which is what keeps
/// cyclic object graphs from owning each other.
pub(crate) struct ObjectTable {
    entries: HashMap<Oid, ObjHandle>,
    /// OIDs of modified objects, ordered for deterministic commit.
    dirty: BTreeSet<Oid>,
}

impl ObjectTable {
    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub(crate) fn get(&self, oid: Oid) -> Option<ObjHandle> {
        self.entries.get(&oid).cloned()
    }

    pub(crate) fn insert(&mut self, oid: Oid, handle: ObjHandle) {
        self.entries.insert(oid, handle);
    }

    /// Drop an object from the table and the dirty set.
    pub(crate) fn remove(&mut self, oid: Oid) -> Option<ObjHandle> {
        self.dirty.remove(&oid);
        self.entries.remove(&oid)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn mark_dirty(&mut self, oid: Oid) {
        self.dirty.insert(oid);
    }

    pub(crate) fn clear_dirty(&mut self, oid: Oid) {
        self.dirty.remove(&oid);
    }

    pub(crate) fn dirty_len(&self) -> usize {
        self.dirty.len()
    }

    pub(crate) fn clear_all_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Handles of all dirty objects, in ascending OID order.
    pub(crate) fn dirty_handles(&self) -> Vec<ObjHandle> {
        self.dirty
            .iter()
            .filter_map(|oid| self.entries.get(oid).cloned())
            .collect()
    }
}

use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use amber_store::BackingStore;
use amber_types::{ObjectState, Oid};

use crate::cell::ObjHandle;
use crate::codec::{BincodeCodec, ObjectCodec};
use crate::commit;
use crate::error::{EngineError, EngineResult};
use crate::link::Link;
use crate::registry::TypeRegistry;
use crate::table::ObjectTable;

/// One open persistence session: the root authority for OID allocation,
/// object resolution, and commit execution.
///
/// A `Storage` owns its object table exclusively; an object is persistent in
/// exactly one storage. Clones share the same session. Internal locking
/// keeps the table consistent, but logical transactions must still be
/// serialized externally: at most one caller mutates a given storage at a
/// time (concurrent read-only `resolve`/`load` is the maximum safe
/// concurrency without additional protocol).
#[derive(Clone)]
pub struct Storage {
    core: Arc<StorageCore>,
}

impl Storage {
    /// Open a session over `backing` with the default bincode codec.
    pub fn open(backing: impl BackingStore + 'static, registry: TypeRegistry) -> Self {
        Self::open_with_codec(backing, BincodeCodec, registry)
    }

    /// Open a session with an explicit codec.
    pub fn open_with_codec(
        backing: impl BackingStore + 'static,
        codec: impl ObjectCodec + 'static,
        registry: TypeRegistry,
    ) -> Self {
        info!(types = registry.len(), "storage session opened");
        Self {
            core: Arc::new(StorageCore {
                backing: Box::new(backing),
                codec: Box::new(codec),
                registry,
                table: Mutex::new(ObjectTable::new()),
            }),
        }
    }

    pub(crate) fn from_core(core: Arc<StorageCore>) -> Self {
        Self { core }
    }

    pub(crate) fn core(&self) -> &Arc<StorageCore> {
        &self.core
    }

    /// Look up an object by OID.
    ///
    /// Returns the in-memory object if this session already materialized it,
    /// otherwise registers and returns a raw stub — no bytes are read until
    /// the object is loaded. Fails with `UnknownOid` if the backing store
    /// has no such object.
    pub fn resolve(&self, oid: Oid) -> EngineResult<ObjHandle> {
        StorageCore::resolve(&self.core, oid)
    }

    /// Explicitly make `handle` persistent in this storage.
    /// See [`ObjHandle::make_persistent`].
    pub fn make_persistent(&self, handle: &ObjHandle) -> EngineResult<Oid> {
        StorageCore::make_persistent(&self.core, handle)
    }

    /// Remove `handle` from this storage. See [`ObjHandle::deallocate`].
    pub fn deallocate(&self, handle: &ObjHandle) -> EngineResult<()> {
        if !handle.is_persistent() {
            return Err(EngineError::NotPersistent);
        }
        match handle.storage_core() {
            Some(core) if Arc::ptr_eq(&core, &self.core) => self.core.deallocate(handle),
            Some(_) => Err(EngineError::AlreadyPersistentElsewhere),
            None => Err(EngineError::StorageGone),
        }
    }

    /// Commit every modified object (and everything reachable from one) to
    /// the backing store. Returns the number of objects written.
    ///
    /// All-or-nothing: if any encode or write fails, no object leaves the
    /// modified state and the commit can be retried.
    pub fn commit(&self) -> EngineResult<usize> {
        commit::commit(&self.core)
    }

    /// Number of objects in the table.
    pub fn object_count(&self) -> usize {
        self.core.table.lock().expect("lock poisoned").len()
    }

    /// Number of objects pending the next commit.
    pub fn dirty_count(&self) -> usize {
        self.core.table.lock().expect("lock poisoned").dirty_len()
    }

    /// Returns `true` if both handles refer to the same session.
    pub fn same_storage(&self, other: &Storage) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("objects", &self.object_count())
            .field("dirty", &self.dirty_count())
            .finish()
    }
}

/// Shared session state behind [`Storage`]. Objects hold a weak reference
/// back to this; dropping the last `Storage` clone orphans its objects
/// (operations on them fail with `StorageGone`).
pub(crate) struct StorageCore {
    pub(crate) backing: Box<dyn BackingStore>,
    pub(crate) codec: Box<dyn ObjectCodec>,
    pub(crate) registry: TypeRegistry,
    pub(crate) table: Mutex<ObjectTable>,
}

impl StorageCore {
    pub(crate) fn resolve(core: &Arc<Self>, oid: Oid) -> EngineResult<ObjHandle> {
        if oid.is_null() {
            return Err(EngineError::UnknownOid(oid));
        }
        {
            let table = core.table.lock().expect("lock poisoned");
            if let Some(handle) = table.get(oid) {
                return Ok(handle);
            }
        }
        if !core.backing.contains(oid)? {
            return Err(EngineError::UnknownOid(oid));
        }
        let mut table = core.table.lock().expect("lock poisoned");
        // Lost a race with another resolver: keep the first stub.
        if let Some(handle) = table.get(oid) {
            return Ok(handle);
        }
        let handle = ObjHandle::raw_stub(oid, core);
        table.insert(oid, handle.clone());
        debug!(%oid, "registered raw stub");
        Ok(handle)
    }

    pub(crate) fn make_persistent(core: &Arc<Self>, handle: &ObjHandle) -> EngineResult<Oid> {
        let mut meta = handle.cell.meta.lock().expect("lock poisoned");
        if meta.state != ObjectState::Transient {
            return match meta.storage.upgrade() {
                Some(owner) if Arc::ptr_eq(&owner, core) => Ok(meta.oid),
                _ => Err(EngineError::AlreadyPersistentElsewhere),
            };
        }
        let oid = core.backing.allocate_oid()?;
        meta.oid = oid;
        meta.state = ObjectState::Modified;
        meta.storage = Arc::downgrade(core);
        drop(meta);

        let mut table = core.table.lock().expect("lock poisoned");
        table.insert(oid, handle.clone());
        table.mark_dirty(oid);
        debug!(%oid, "object made persistent");
        Ok(oid)
    }

    /// Load `root` and, breadth-first, every raw object referenced by a
    /// loaded object whose recursive-loading policy allows it. Explicit
    /// visited-set tracking; cyclic graphs terminate.
    pub(crate) fn load_closure(core: &Arc<Self>, root: &ObjHandle) -> EngineResult<()> {
        let mut queue = VecDeque::from([root.clone()]);
        let mut visited: HashSet<Oid> = HashSet::new();

        while let Some(handle) = queue.pop_front() {
            let oid = handle.oid();
            if !visited.insert(oid) || !handle.is_raw() {
                continue;
            }

            // Failure before install_body leaves the object raw; the caller
            // can retry the load.
            let bytes = core.backing.read_bytes(oid)?;
            let mut body = core.codec.decode(&bytes, &core.registry)?;
            body.on_load();

            let link_oids: Vec<Oid> = if body.recursive_loading() {
                body.links().into_iter().filter_map(Link::oid).collect()
            } else {
                Vec::new()
            };
            handle.install_body(body);
            debug!(%oid, "object loaded");

            for target in link_oids {
                if visited.contains(&target) {
                    continue;
                }
                let target_handle = Self::resolve(core, target)?;
                if target_handle.is_raw() {
                    queue.push_back(target_handle);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn mark_modified(&self, handle: &ObjHandle) {
        let oid = {
            let mut meta = handle.cell.meta.lock().expect("lock poisoned");
            if meta.state == ObjectState::Loaded {
                meta.state = ObjectState::Modified;
            }
            meta.oid
        };
        if !oid.is_null() {
            self.table.lock().expect("lock poisoned").mark_dirty(oid);
        }
    }

    /// Single-object write-through (`ObjHandle::store`). Referenced
    /// transient objects are made persistent first and stay pending for the
    /// next commit; only this object's bytes are written now.
    pub(crate) fn store_one(core: &Arc<Self>, handle: &ObjHandle) -> EngineResult<()> {
        if handle.is_raw() {
            // Nothing in memory newer than the stored bytes.
            return Ok(());
        }
        commit::reachability_closure(core, vec![handle.clone()])?;

        let bytes = {
            let body = handle.cell.body.lock().expect("lock poisoned");
            let obj = body.as_deref().ok_or(EngineError::Unmaterialized)?;
            core.codec.encode(obj)?
        };
        let oid = handle.oid();
        core.backing.write_bytes(oid, &bytes)?;
        handle.set_clean();
        core.table.lock().expect("lock poisoned").clear_dirty(oid);
        debug!(%oid, bytes = bytes.len(), "object stored");
        Ok(())
    }

    pub(crate) fn deallocate(&self, handle: &ObjHandle) -> EngineResult<()> {
        let oid = {
            let mut meta = handle.cell.meta.lock().expect("lock poisoned");
            if meta.oid.is_null() {
                return Err(EngineError::NotPersistent);
            }
            let oid = meta.oid;
            meta.oid = Oid::NULL;
            meta.state = ObjectState::Transient;
            meta.storage = std::sync::Weak::new();
            oid
        };
        self.table.lock().expect("lock poisoned").remove(oid);
        self.backing.free_oid(oid)?;
        debug!(%oid, "object deallocated");
        Ok(())
    }

    pub(crate) fn dirty_handles(&self) -> Vec<ObjHandle> {
        self.table.lock().expect("lock poisoned").dirty_handles()
    }
}

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use amber_types::{ObjectState, Oid};

use crate::error::{EngineError, EngineResult};
use crate::persistable::Persistable;
use crate::storage::{Storage, StorageCore};

/// Identity and lifecycle metadata for one object.
pub(crate) struct ObjMeta {
    pub(crate) oid: Oid,
    pub(crate) state: ObjectState,
    pub(crate) storage: Weak<StorageCore>,
}

/// One managed object: lifecycle metadata plus (optionally materialized)
/// field data. Owned by the object table while persistent; a raw stub has
/// identity but no body.
pub(crate) struct ObjectCell {
    pub(crate) meta: Mutex<ObjMeta>,
    pub(crate) body: Mutex<Option<Box<dyn Persistable>>>,
}

/// Shared handle to a managed object.
///
/// Cheap to clone; all clones refer to the same object. Application code
/// reads and writes fields through [`with`](ObjHandle::with) and
/// [`update`](ObjHandle::update), which enforce the accessor contract: a
/// raw object is loaded before its fields are touched, and a write marks
/// the object modified before it happens.
///
/// Invariant, checked by the engine around every operation: the OID is null
/// exactly while the object is transient.
#[derive(Clone)]
pub struct ObjHandle {
    pub(crate) cell: Arc<ObjectCell>,
}

impl ObjHandle {
    /// Wrap a value in a new transient object.
    pub fn new<T: Persistable>(value: T) -> Self {
        Self {
            cell: Arc::new(ObjectCell {
                meta: Mutex::new(ObjMeta {
                    oid: Oid::NULL,
                    state: ObjectState::Transient,
                    storage: Weak::new(),
                }),
                body: Mutex::new(Some(Box::new(value))),
            }),
        }
    }

    /// Identity-only stub for a persistent object whose bytes have not been
    /// read yet. Created by `Storage::resolve`.
    pub(crate) fn raw_stub(oid: Oid, core: &Arc<StorageCore>) -> Self {
        Self {
            cell: Arc::new(ObjectCell {
                meta: Mutex::new(ObjMeta {
                    oid,
                    state: ObjectState::Raw,
                    storage: Arc::downgrade(core),
                }),
                body: Mutex::new(None),
            }),
        }
    }

    fn meta(&self) -> MutexGuard<'_, ObjMeta> {
        self.cell.meta.lock().expect("lock poisoned")
    }

    /// The object's OID; null while transient.
    pub fn oid(&self) -> Oid {
        self.meta().oid
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ObjectState {
        self.meta().state
    }

    /// Returns `true` if the object is a stub whose field data has not been
    /// loaded from the backing store.
    pub fn is_raw(&self) -> bool {
        self.state() == ObjectState::Raw
    }

    /// Returns `true` if the object is pending write at the next commit.
    pub fn is_modified(&self) -> bool {
        self.state() == ObjectState::Modified
    }

    /// Returns `true` if the object has an assigned OID.
    pub fn is_persistent(&self) -> bool {
        !self.oid().is_null()
    }

    /// The storage this object is persistent in, if any.
    pub fn storage(&self) -> Option<Storage> {
        self.storage_core().map(Storage::from_core)
    }

    pub(crate) fn storage_core(&self) -> Option<Arc<StorageCore>> {
        self.meta().storage.upgrade()
    }

    /// Returns `true` if both handles refer to the same object.
    pub fn same_object(&self, other: &ObjHandle) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }

    /// The object's recursive-loading policy. Raw stubs report the default
    /// (`true`); the engine only consults the policy once the body exists.
    pub fn recursive_loading(&self) -> bool {
        let body = self.cell.body.lock().expect("lock poisoned");
        body.as_deref().map_or(true, |b| b.recursive_loading())
    }

    /// Explicitly make this object persistent in `storage`.
    ///
    /// Usually objects become persistent implicitly, by being reachable from
    /// a modified object at commit. Idempotent when already persistent in
    /// `storage`; fails with `AlreadyPersistentElsewhere` when owned by a
    /// different storage.
    pub fn make_persistent(&self, storage: &Storage) -> EngineResult<Oid> {
        StorageCore::make_persistent(storage.core(), self)
    }

    /// Load field data from the backing store if this object is raw;
    /// otherwise a no-op. Referenced raw objects are loaded along with this
    /// one when its recursive-loading policy allows.
    ///
    /// On failure the object stays raw and the call can be retried.
    pub fn load(&self) -> EngineResult<()> {
        if !self.is_raw() {
            return Ok(());
        }
        let core = self.storage_core().ok_or(EngineError::StorageGone)?;
        StorageCore::load_closure(&core, self)
    }

    /// Mark this object as modified; it will be written at the next commit.
    /// Silent no-op on transient objects — modification tracking only
    /// applies to persistent ones. A raw object is loaded first.
    pub fn modify(&self) -> EngineResult<()> {
        match self.state() {
            ObjectState::Transient | ObjectState::Modified => Ok(()),
            ObjectState::Raw => {
                self.load()?;
                self.mark_modified()
            }
            ObjectState::Loaded => self.mark_modified(),
        }
    }

    fn mark_modified(&self) -> EngineResult<()> {
        let core = self.storage_core().ok_or(EngineError::StorageGone)?;
        core.mark_modified(self);
        Ok(())
    }

    /// Write this object through to the backing store now, without waiting
    /// for commit. Referenced transient objects are made persistent first
    /// (persistence by reachability); they stay pending for the next commit.
    pub fn store(&self) -> EngineResult<()> {
        if !self.is_persistent() {
            return Err(EngineError::NotPersistent);
        }
        let core = self.storage_core().ok_or(EngineError::StorageGone)?;
        StorageCore::store_one(&core, self)
    }

    /// Remove this object from its storage: the table entry is dropped, the
    /// OID is freed, and the object reverts to transient. Links elsewhere
    /// that still carry the old OID fail on their next dereference.
    pub fn deallocate(&self) -> EngineResult<()> {
        if !self.is_persistent() {
            return Err(EngineError::NotPersistent);
        }
        let core = self.storage_core().ok_or(EngineError::StorageGone)?;
        core.deallocate(self)
    }

    /// Read access to the object's fields (loads first if raw).
    pub fn with<T: Persistable, R>(&self, f: impl FnOnce(&T) -> R) -> EngineResult<R> {
        self.load()?;
        let body = self.cell.body.lock().expect("lock poisoned");
        let obj = body.as_deref().ok_or(EngineError::Unmaterialized)?;
        let found = obj.type_tag();
        let typed = obj
            .as_any()
            .downcast_ref::<T>()
            .ok_or(EngineError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })?;
        Ok(f(typed))
    }

    /// Write access to the object's fields. Loads first if raw and marks
    /// the object modified before the closure runs.
    pub fn update<T: Persistable, R>(&self, f: impl FnOnce(&mut T) -> R) -> EngineResult<R> {
        self.load()?;
        self.modify()?;
        let mut body = self.cell.body.lock().expect("lock poisoned");
        let obj = body.as_deref_mut().ok_or(EngineError::Unmaterialized)?;
        let found = obj.type_tag();
        let typed = obj
            .as_any_mut()
            .downcast_mut::<T>()
            .ok_or(EngineError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found,
            })?;
        Ok(f(typed))
    }

    /// Install a freshly decoded body: the raw-to-loaded transition.
    pub(crate) fn install_body(&self, body: Box<dyn Persistable>) {
        {
            let mut meta = self.meta();
            debug_assert_eq!(meta.state, ObjectState::Raw);
            meta.state = ObjectState::Loaded;
        }
        let mut slot = self.cell.body.lock().expect("lock poisoned");
        *slot = Some(body);
    }

    /// Commit-success transition: modified objects become loaded.
    pub(crate) fn set_clean(&self) {
        let mut meta = self.meta();
        if meta.state == ObjectState::Modified {
            meta.state = ObjectState::Loaded;
        }
    }
}

impl fmt::Debug for ObjHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = self.meta();
        f.debug_struct("ObjHandle")
            .field("oid", &meta.oid)
            .field("state", &meta.state)
            .finish()
    }
}

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use amber_types::Oid;

use crate::error::{StoreError, StoreResult};
use crate::traits::BackingStore;

/// Name of the allocator watermark file inside the store root.
const WATERMARK_FILE: &str = "oid.next";

/// Name of the object directory inside the store root.
const OBJECTS_DIR: &str = "objects";

/// Directory-per-object file backing store.
///
/// Layout under the store root:
/// ```text
/// root/
///   oid.next            next OID to issue (decimal, rewritten atomically)
///   objects/
///     0000000000000001  object bytes, one file per OID (hex file name)
///     0000000000000002
/// ```
///
/// Writes go through a temporary file in the same directory followed by an
/// atomic rename, so a crash mid-write leaves the previous bytes intact.
/// The allocator watermark is persisted on every allocation; freed OIDs are
/// never reissued, even across reopen.
pub struct FileBackingStore {
    root: PathBuf,
    objects: PathBuf,
    next_oid: Mutex<u64>,
}

impl FileBackingStore {
    /// Open (or create) a file store rooted at `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let objects = root.join(OBJECTS_DIR);
        fs::create_dir_all(&objects)?;

        let watermark_path = root.join(WATERMARK_FILE);
        let next = match fs::read_to_string(&watermark_path) {
            Ok(text) => text
                .trim()
                .parse::<u64>()
                .map_err(|e| StoreError::Backend(format!("bad watermark file: {e}")))?,
            Err(e) if e.kind() == ErrorKind::NotFound => Self::scan_max_oid(&objects)? + 1,
            Err(e) => return Err(e.into()),
        };

        debug!(root = %root.display(), next_oid = next, "opened file backing store");
        Ok(Self {
            root: root.to_path_buf(),
            objects,
            next_oid: Mutex::new(next.max(1)),
        })
    }

    /// Highest OID found in the object directory (0 if empty). Used when the
    /// watermark file is missing, e.g. a store created by an older version.
    fn scan_max_oid(objects: &Path) -> StoreResult<u64> {
        let mut max = 0u64;
        for entry in fs::read_dir(objects)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some(raw) = name.to_str().and_then(|s| u64::from_str_radix(s, 16).ok()) {
                max = max.max(raw);
            }
        }
        Ok(max)
    }

    fn object_path(&self, oid: Oid) -> PathBuf {
        self.objects.join(format!("{:016x}", oid.as_u64()))
    }

    /// Atomically replace the contents of `path` with `bytes`.
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.objects)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }

    fn persist_watermark(&self, next: u64) -> StoreResult<()> {
        let mut tmp = tempfile::NamedTempFile::new_in(&self.root)?;
        writeln!(tmp, "{next}")?;
        tmp.as_file().sync_all()?;
        tmp.persist(self.root.join(WATERMARK_FILE))
            .map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl BackingStore for FileBackingStore {
    fn allocate_oid(&self) -> StoreResult<Oid> {
        let mut next = self.next_oid.lock().expect("lock poisoned");
        let oid = Oid::new(*next);
        // Persist the watermark before handing the OID out, so a crash after
        // allocation cannot lead to the same OID being issued twice.
        self.persist_watermark(*next + 1)?;
        *next += 1;
        Ok(oid)
    }

    fn free_oid(&self, oid: Oid) -> StoreResult<()> {
        if oid.is_null() {
            return Err(StoreError::UnknownOid(oid));
        }
        match fs::remove_file(self.object_path(oid)) {
            Ok(()) => Ok(()),
            // Deallocated before its first commit: nothing on disk yet.
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn read_bytes(&self, oid: Oid) -> StoreResult<Vec<u8>> {
        match fs::read(self.object_path(oid)) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::UnknownOid(oid)),
            Err(e) => Err(e.into()),
        }
    }

    fn write_bytes(&self, oid: Oid, bytes: &[u8]) -> StoreResult<()> {
        if oid.is_null() {
            return Err(StoreError::UnknownOid(oid));
        }
        self.write_atomic(&self.object_path(oid), bytes)
    }

    fn contains(&self, oid: Oid) -> StoreResult<bool> {
        Ok(self.object_path(oid).exists())
    }
}

impl std::fmt::Debug for FileBackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileBackingStore")
            .field("root", &self.root)
            .finish()
    }
}

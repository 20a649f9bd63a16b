use std::fmt;
use std::sync::Arc;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Error as _, Serialize, Serializer};

use amber_types::Oid;

use crate::cell::ObjHandle;
use crate::error::EngineResult;
use crate::storage::{Storage, StorageCore};

/// A reference field between persistent objects.
///
/// A link is either null, an OID resolved lazily through the owning
/// storage's object table, or a direct reference to a still-transient
/// object. The commit coordinator rewrites direct references to their OID
/// form once assigned, so long-lived persistent graphs hold only OID
/// references — the table owns the objects, links do not, and reference
/// cycles cannot leak.
///
/// Serialization encodes the assigned OID (null links encode as the null
/// OID). Serializing a link whose target has no OID yet is an error: the
/// reachability closure runs before any object is encoded.
#[derive(Clone, Default)]
pub struct Link {
    target: LinkTarget,
}

#[derive(Clone, Default)]
enum LinkTarget {
    #[default]
    Null,
    Persistent(Oid),
    Direct(ObjHandle),
}

impl Link {
    /// The null link.
    pub fn null() -> Self {
        Self::default()
    }

    /// Link to an object. Persistent targets are referenced by OID; a
    /// transient target is held directly until commit assigns it one.
    pub fn to(handle: &ObjHandle) -> Self {
        let oid = handle.oid();
        let target = if oid.is_null() {
            LinkTarget::Direct(handle.clone())
        } else {
            LinkTarget::Persistent(oid)
        };
        Self { target }
    }

    /// Link to an already-persistent object by OID.
    pub fn from_oid(oid: Oid) -> Self {
        let target = if oid.is_null() {
            LinkTarget::Null
        } else {
            LinkTarget::Persistent(oid)
        };
        Self { target }
    }

    /// Returns `true` if this link references nothing.
    pub fn is_null(&self) -> bool {
        matches!(self.target, LinkTarget::Null)
    }

    /// The target's OID, if it has one. A direct link to a transient object
    /// has no OID yet.
    pub fn oid(&self) -> Option<Oid> {
        match &self.target {
            LinkTarget::Null => None,
            LinkTarget::Persistent(oid) => Some(*oid),
            LinkTarget::Direct(handle) => {
                let oid = handle.oid();
                (!oid.is_null()).then_some(oid)
            }
        }
    }

    /// Point this link at another object.
    pub fn set(&mut self, handle: &ObjHandle) {
        *self = Self::to(handle);
    }

    /// Reset to the null link.
    pub fn clear(&mut self) {
        self.target = LinkTarget::Null;
    }

    /// Resolve and load the target (the accessor contract: a raw target is
    /// loaded before it is handed back). Returns `Ok(None)` for null links.
    ///
    /// Dereferencing a link whose target was deallocated fails with
    /// [`UnknownOid`](crate::error::EngineError::UnknownOid).
    pub fn get(&self, storage: &Storage) -> EngineResult<Option<ObjHandle>> {
        match self.get_raw(storage)? {
            Some(handle) => {
                handle.load()?;
                Ok(Some(handle))
            }
            None => Ok(None),
        }
    }

    /// Resolve the target without loading it. The returned handle may be a
    /// raw stub, usable only for identity queries until loaded.
    pub fn get_raw(&self, storage: &Storage) -> EngineResult<Option<ObjHandle>> {
        match &self.target {
            LinkTarget::Null => Ok(None),
            LinkTarget::Persistent(oid) => storage.resolve(*oid).map(Some),
            LinkTarget::Direct(handle) => Ok(Some(handle.clone())),
        }
    }

    /// Commit-time normalization: make a directly-referenced target
    /// persistent (idempotent for already-persistent targets) and rewrite
    /// this link to its OID form. Returns the target handle if it was
    /// transient before this call, so the caller can continue the closure
    /// through it.
    pub(crate) fn ensure_persistent(
        &mut self,
        core: &Arc<StorageCore>,
    ) -> EngineResult<Option<ObjHandle>> {
        match &self.target {
            LinkTarget::Direct(handle) => {
                let handle = handle.clone();
                let was_transient = !handle.is_persistent();
                let oid = StorageCore::make_persistent(core, &handle)?;
                self.target = LinkTarget::Persistent(oid);
                Ok(was_transient.then_some(handle))
            }
            _ => Ok(None),
        }
    }
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            LinkTarget::Null => write!(f, "Link(null)"),
            LinkTarget::Persistent(oid) => write!(f, "Link({oid})"),
            LinkTarget::Direct(handle) => write!(f, "Link(direct, {:?})", handle),
        }
    }
}

impl Serialize for Link {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let oid = match &self.target {
            LinkTarget::Null => Oid::NULL,
            LinkTarget::Persistent(oid) => *oid,
            LinkTarget::Direct(handle) => {
                let oid = handle.oid();
                if oid.is_null() {
                    return Err(S::Error::custom(
                        "link to a transient object cannot be serialized before commit",
                    ));
                }
                oid
            }
        };
        oid.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Link {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let oid = Oid::deserialize(deserializer)?;
        Ok(Link::from_oid(oid))
    }
}

/// An ordered one-to-many embedded relation: a sequence of [`Link`]s stored
/// inside the owning object's fields.
///
/// Element targets participate in recursive loading and persistence by
/// reachability exactly like single links, provided the owner exposes them
/// through `links`/`links_mut` (see [`LinkVec::links`]).
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct LinkVec {
    items: Vec<Link>,
}

impl LinkVec {
    /// Create an empty relation.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of linked objects.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the relation is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a link to an object.
    pub fn push(&mut self, handle: &ObjHandle) {
        self.items.push(Link::to(handle));
    }

    /// Append a pre-built link.
    pub fn push_link(&mut self, link: Link) {
        self.items.push(link);
    }

    /// The i-th link, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<&Link> {
        self.items.get(index)
    }

    /// Replace the i-th element.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn set(&mut self, index: usize, handle: &ObjHandle) {
        self.items[index] = Link::to(handle);
    }

    /// Insert at position `index`, shifting later elements.
    ///
    /// # Panics
    /// Panics if `index > len`.
    pub fn insert(&mut self, index: usize, handle: &ObjHandle) {
        self.items.insert(index, Link::to(handle));
    }

    /// Remove and return the i-th link.
    ///
    /// # Panics
    /// Panics if `index` is out of bounds.
    pub fn remove(&mut self, index: usize) -> Link {
        self.items.remove(index)
    }

    /// Remove all elements.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Iterate over the links.
    pub fn iter(&self) -> std::slice::Iter<'_, Link> {
        self.items.iter()
    }

    /// Returns `true` if any element currently carries this OID.
    pub fn contains_oid(&self, oid: Oid) -> bool {
        self.items.iter().any(|l| l.oid() == Some(oid))
    }

    /// Borrow every element link; convenience for `Persistable::links`.
    pub fn links(&self) -> Vec<&Link> {
        self.items.iter().collect()
    }

    /// Mutably borrow every element link; convenience for
    /// `Persistable::links_mut`.
    pub fn links_mut(&mut self) -> Vec<&mut Link> {
        self.items.iter_mut().collect()
    }
}

impl<'a> IntoIterator for &'a LinkVec {
    type Item = &'a Link;
    type IntoIter = std::slice::Iter<'a, Link>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_link_has_no_oid() {
        let link = Link::null();
        assert!(link.is_null());
        assert_eq!(link.oid(), None);
    }

    #[test]
    fn from_oid_null_collapses_to_null_link() {
        let link = Link::from_oid(Oid::NULL);
        assert!(link.is_null());
    }

    #[test]
    fn oid_link_roundtrips_through_serde() {
        let link = Link::from_oid(Oid::new(17));
        let bytes = bincode::serialize(&link).unwrap();
        let back: Link = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.oid(), Some(Oid::new(17)));
    }

    #[test]
    fn null_link_roundtrips_through_serde() {
        let bytes = bincode::serialize(&Link::null()).unwrap();
        let back: Link = bincode::deserialize(&bytes).unwrap();
        assert!(back.is_null());
    }

    #[test]
    fn clear_resets_to_null() {
        let mut link = Link::from_oid(Oid::new(3));
        link.clear();
        assert!(link.is_null());
    }

    #[test]
    fn link_vec_basics() {
        let mut vec = LinkVec::new();
        assert!(vec.is_empty());
        vec.push_link(Link::from_oid(Oid::new(1)));
        vec.push_link(Link::from_oid(Oid::new(2)));
        assert_eq!(vec.len(), 2);
        assert_eq!(vec.get(0).unwrap().oid(), Some(Oid::new(1)));
        assert!(vec.contains_oid(Oid::new(2)));
        assert!(!vec.contains_oid(Oid::new(9)));

        let removed = vec.remove(0);
        assert_eq!(removed.oid(), Some(Oid::new(1)));
        assert_eq!(vec.len(), 1);

        vec.clear();
        assert!(vec.is_empty());
    }

    #[test]
    fn link_vec_serde_roundtrip() {
        let mut vec = LinkVec::new();
        vec.push_link(Link::from_oid(Oid::new(5)));
        vec.push_link(Link::null());
        let bytes = bincode::serialize(&vec).unwrap();
        let back: LinkVec = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get(0).unwrap().oid(), Some(Oid::new(5)));
        assert!(back.get(1).unwrap().is_null());
    }
}

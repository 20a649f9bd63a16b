use std::any::Any;

use crate::codec::CodecResult;
use crate::link::Link;

/// The capability set every persistable value must implement.
///
/// A type implementing `Persistable` can be wrapped in an
/// [`ObjHandle`](crate::cell::ObjHandle), made persistent in a
/// [`Storage`](crate::storage::Storage), lazily loaded, and committed. The
/// trait covers four concerns:
///
/// - **Serialization**: `type_tag` + `encode_payload` produce the stored
///   representation; decoding goes through the
///   [`TypeRegistry`](crate::registry::TypeRegistry).
/// - **Graph shape**: `links`/`links_mut` expose every [`Link`] (and every
///   element of every [`LinkVec`](crate::link::LinkVec)) in the object's
///   fields. The engine walks these for recursive loading and for
///   persistence by reachability; an unexposed link escapes both.
/// - **Loading policy**: `recursive_loading` is a fixed per-type answer,
///   queried once at the moment this object is loaded and applied to this
///   object's own references.
/// - **Downcasting**: `as_any`/`as_any_mut` back the typed accessors on
///   `ObjHandle`.
pub trait Persistable: Any + Send {
    /// Stable tag identifying the concrete type in the stored bytes.
    fn type_tag(&self) -> &'static str;

    /// Encode this object's fields to the payload representation.
    ///
    /// Most implementations derive `Serialize` and call
    /// [`to_payload`](crate::codec::to_payload).
    fn encode_payload(&self) -> CodecResult<Vec<u8>>;

    /// Every link in this object's fields. Default: no links.
    fn links(&self) -> Vec<&Link> {
        Vec::new()
    }

    /// Mutable view of every link in this object's fields.
    ///
    /// Must cover the same set as `links`; the commit coordinator rewrites
    /// these when it assigns OIDs to referenced transient objects.
    fn links_mut(&mut self) -> Vec<&mut Link> {
        Vec::new()
    }

    /// Whether loading this object immediately loads the objects it
    /// references. Default `true`: a whole cluster of referenced objects is
    /// materialized together. Return `false` on container-like types to
    /// bound memory use on large graphs; their references then stay raw
    /// stubs until explicitly loaded.
    fn recursive_loading(&self) -> bool {
        true
    }

    /// Called exactly once per raw-to-loaded transition, after field data is
    /// populated and before the object is handed back. Default: nothing.
    /// Override to reinitialize transient (non-serialized) fields.
    fn on_load(&mut self) {}

    /// Upcast for typed read access.
    fn as_any(&self) -> &dyn Any;

    /// Upcast for typed write access.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl std::fmt::Debug for dyn Persistable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Persistable")
            .field("type_tag", &self.type_tag())
            .finish_non_exhaustive()
    }
}

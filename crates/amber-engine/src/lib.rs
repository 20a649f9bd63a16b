//! Persistent object lifecycle engine for Amber.
//!
//! Application code works with an in-memory graph of objects; this crate
//! transparently and incrementally persists that graph through a
//! [`BackingStore`](amber_store::BackingStore). Four concerns interleave:
//!
//! - **Identity**: every persistent object carries an OID, assigned once by
//!   its owning [`Storage`] and null while transient.
//! - **State**: objects move through transient/raw/loaded/modified; a raw
//!   stub's fields are never exposed before loading.
//! - **Ownership**: the storage's object table owns the objects; links
//!   between objects carry OIDs, resolved lazily through the table.
//! - **Graph traversal**: loading follows links per the loaded object's
//!   recursive-loading policy, and commit makes every reachable transient
//!   object persistent (persistence by reachability).
//!
//! # Example
//!
//! ```
//! use amber_engine::{to_payload, CodecResult, Link, ObjHandle, Persistable, Storage, TypeRegistry};
//! use amber_store::InMemoryBackingStore;
//! use serde::{Deserialize, Serialize};
//! use std::any::Any;
//!
//! #[derive(Serialize, Deserialize)]
//! struct Task {
//!     title: String,
//!     blocked_by: Link,
//! }
//!
//! impl Persistable for Task {
//!     fn type_tag(&self) -> &'static str { "Task" }
//!     fn encode_payload(&self) -> CodecResult<Vec<u8>> { to_payload(self) }
//!     fn links(&self) -> Vec<&Link> { vec![&self.blocked_by] }
//!     fn links_mut(&mut self) -> Vec<&mut Link> { vec![&mut self.blocked_by] }
//!     fn as_any(&self) -> &dyn Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn Any { self }
//! }
//!
//! # fn main() -> Result<(), amber_engine::EngineError> {
//! let mut registry = TypeRegistry::new();
//! registry.register::<Task>("Task");
//! let storage = Storage::open(InMemoryBackingStore::new(), registry);
//!
//! let dep = ObjHandle::new(Task { title: "design".into(), blocked_by: Link::null() });
//! let task = ObjHandle::new(Task { title: "build".into(), blocked_by: Link::to(&dep) });
//! task.make_persistent(&storage)?;
//! storage.commit()?; // `dep` becomes persistent by reachability
//! assert!(dep.is_persistent());
//! # Ok(())
//! # }
//! ```

pub mod cell;
pub mod codec;
mod commit;
pub mod error;
pub mod link;
pub mod persistable;
pub mod registry;
pub mod storage;
mod table;

#[cfg(test)]
mod fixtures;

// Re-export primary types at crate root for ergonomic imports.
pub use cell::ObjHandle;
pub use codec::{from_payload, to_payload, BincodeCodec, CodecError, CodecResult, ObjectCodec};
pub use error::{EngineError, EngineResult};
pub use link::{Link, LinkVec};
pub use persistable::Persistable;
pub use registry::TypeRegistry;
pub use storage::Storage;

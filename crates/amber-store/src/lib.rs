//! Backing-store boundary for the Amber object-persistence engine.
//!
//! This crate defines the byte-level storage contract the lifecycle engine
//! writes through: an OID-keyed byte store with a monotonic OID allocator.
//! The engine never sees pages or files; it sees `read_bytes`/`write_bytes`
//! plus `allocate_oid`/`free_oid`.
//!
//! # Backends
//!
//! All backends implement the [`BackingStore`] trait:
//!
//! - [`InMemoryBackingStore`] — `HashMap`-based store for tests and embedding
//! - [`FileBackingStore`] — one file per object with atomic replace-on-write
//! - [`FailingStore`] — fault-injecting wrapper for failure-path tests
//!
//! # Design Rules
//!
//! 1. OIDs are issued monotonically and never reused, even after `free_oid`.
//! 2. `write_bytes` replaces an object's bytes atomically (no torn reads).
//! 3. The store never interprets object bytes; framing is the codec's job.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod file;
pub mod memory;
pub mod testing;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use file::FileBackingStore;
pub use memory::InMemoryBackingStore;
pub use testing::FailingStore;
pub use traits::BackingStore;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle state of a persistent object.
///
/// The legal transitions are:
///
/// ```text
/// Transient --make_persistent--> Modified --commit/store--> Loaded
/// Transient(resolved) --> Raw --load--> Loaded --modify--> Modified
/// Loaded/Modified --deallocate--> Transient
/// ```
///
/// A `Raw` object is a materialized stub: its identity (OID) is known but its
/// field data has not been deserialized yet. Field data is only valid in the
/// `Loaded` and `Modified` states.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectState {
    /// Not persistent: no OID, no owning storage.
    Transient,
    /// Identity known, field data not yet loaded from the backing store.
    Raw,
    /// Field data materialized and clean.
    Loaded,
    /// Field data materialized and pending write at the next commit.
    Modified,
}

impl ObjectState {
    /// Returns `true` if the object's field data is materialized in memory.
    pub fn has_body(&self) -> bool {
        !matches!(self, Self::Raw)
    }

    /// Returns `true` if the object is pending write at the next commit.
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Modified)
    }
}

impl fmt::Display for ObjectState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient => write!(f, "transient"),
            Self::Raw => write!(f, "raw"),
            Self::Loaded => write!(f, "loaded"),
            Self::Modified => write!(f, "modified"),
        }
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Object identifier: unique integer key for a persistent object within one
/// storage handle.
///
/// OIDs are assigned once, monotonically, by the storage handle at the moment
/// an object first becomes persistent, and are never reused while the owning
/// handle is open. The value `0` is reserved: [`Oid::NULL`] means "not yet
/// persistent".
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Oid(u64);

impl Oid {
    /// The null OID. An object carries this value until it is made persistent.
    pub const NULL: Oid = Oid(0);

    /// Create an `Oid` from a raw value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns `true` if this is the null OID.
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// The raw integer value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.0)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Oid {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<Oid> for u64 {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl FromStr for Oid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(Oid)
            .map_err(|e| TypeError::InvalidOid(format!("{s:?}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn null_is_zero() {
        assert!(Oid::NULL.is_null());
        assert_eq!(Oid::NULL.as_u64(), 0);
        assert_eq!(Oid::new(0), Oid::NULL);
    }

    #[test]
    fn nonzero_is_not_null() {
        assert!(!Oid::new(1).is_null());
        assert!(!Oid::new(u64::MAX).is_null());
    }

    #[test]
    fn display_is_decimal() {
        assert_eq!(format!("{}", Oid::new(42)), "42");
        assert_eq!(format!("{:?}", Oid::new(42)), "Oid(42)");
    }

    #[test]
    fn parse_roundtrip() {
        let oid: Oid = "1234".parse().unwrap();
        assert_eq!(oid, Oid::new(1234));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("abc".parse::<Oid>().is_err());
        assert!("-1".parse::<Oid>().is_err());
        assert!("".parse::<Oid>().is_err());
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(Oid::new(1) < Oid::new(2));
        assert!(Oid::NULL < Oid::new(1));
    }

    #[test]
    fn serde_roundtrip() {
        let oid = Oid::new(7);
        let json = serde_json::to_string(&oid).unwrap();
        let parsed: Oid = serde_json::from_str(&json).unwrap();
        assert_eq!(oid, parsed);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(raw in any::<u64>()) {
            let oid = Oid::new(raw);
            let parsed: Oid = oid.to_string().parse().unwrap();
            prop_assert_eq!(oid, parsed);
        }

        #[test]
        fn null_iff_zero(raw in any::<u64>()) {
            prop_assert_eq!(Oid::new(raw).is_null(), raw == 0);
        }
    }
}

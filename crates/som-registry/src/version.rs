//! Model versions of saved-object types

use crate::error::RegistryError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// `major.minor.patch` version of a type's model
///
/// Ordering is numeric per field, so `10.0.0 > 9.1.0` and `1.10.0 > 1.9.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ModelVersion {
    /// Major
    pub major: u32,
    /// Minor
    pub minor: u32,
    /// Patch
    pub patch: u32,
}

impl ModelVersion {
    /// `0.0.0`, the version of documents that were never migrated
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create version
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for ModelVersion {
    type Err = RegistryError;

    /// Accepts `X`, `X.Y` and `X.Y.Z`; missing fields are zero
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidVersion(s.to_string());
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.is_empty() || parts.len() > 3 {
            return Err(invalid());
        }
        let mut fields = [0u32; 3];
        for (slot, part) in fields.iter_mut().zip(&parts) {
            *slot = part.parse().map_err(|_| invalid())?;
        }
        Ok(Self::new(fields[0], fields[1], fields[2]))
    }
}

impl TryFrom<&str> for ModelVersion {
    type Error = RegistryError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for ModelVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ModelVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_short_forms() {
        assert_eq!("7".parse::<ModelVersion>().unwrap(), ModelVersion::new(7, 0, 0));
        assert_eq!("7.4".parse::<ModelVersion>().unwrap(), ModelVersion::new(7, 4, 0));
        assert_eq!("7.4.2".parse::<ModelVersion>().unwrap(), ModelVersion::new(7, 4, 2));
    }

    #[test]
    fn rejects_garbage() {
        for bad in ["", "a.b", "1.2.3.4", "1..2", "-1"] {
            assert!(bad.parse::<ModelVersion>().is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn numeric_not_lexical() {
        let a: ModelVersion = "1.10.0".parse().unwrap();
        let b: ModelVersion = "1.9.0".parse().unwrap();
        assert!(a > b);
        assert!(ModelVersion::new(10, 0, 0) > ModelVersion::new(9, 1, 0));
    }

    #[test]
    fn serializes_as_string() {
        let v = ModelVersion::new(8, 8, 0);
        assert_eq!(serde_json::to_value(v).unwrap(), serde_json::json!("8.8.0"));
        let back: ModelVersion = serde_json::from_value(serde_json::json!("8.8")).unwrap();
        assert_eq!(back, v);
    }

    proptest! {
        #[test]
        fn ordering_matches_tuple(a in (0u32..50, 0u32..50, 0u32..50), b in (0u32..50, 0u32..50, 0u32..50)) {
            let va = ModelVersion::new(a.0, a.1, a.2);
            let vb = ModelVersion::new(b.0, b.1, b.2);
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }

        #[test]
        fn display_roundtrips(major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000) {
            let v = ModelVersion::new(major, minor, patch);
            prop_assert_eq!(v.to_string().parse::<ModelVersion>().unwrap(), v);
        }
    }
}

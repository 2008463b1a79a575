//! Schema and API versioning
//!
//! WRML documents historically carry a bare integer version (`"version": 3`).
//! Both that form and full semver strings are accepted; integers map to
//! `N.0.0`.

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A document version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion {
    /// Semantic version (e.g., "1.2.3")
    pub version: Version,
}

impl SchemaVersion {
    /// Create a new version
    pub fn new(version: Version) -> Self {
        Self { version }
    }

    /// Version from a bare integer, as found in WRML schema documents
    pub fn from_major(major: u64) -> Self {
        Self::new(Version::new(major, 0, 0))
    }

    /// Create from a version string ("1", "1.2" and "v1.2.3" are accepted)
    pub fn parse(version_str: &str) -> Result<Self, semver::Error> {
        let version_str = version_str.strip_prefix('v').unwrap_or(version_str);
        let padded = match version_str.matches('.').count() {
            0 => format!("{}.0.0", version_str),
            1 => format!("{}.0", version_str),
            _ => version_str.to_string(),
        };
        Ok(Self::new(Version::parse(&padded)?))
    }

    /// Get the version string (e.g., "1.2.3")
    pub fn version_string(&self) -> String {
        self.version.to_string()
    }

    /// Versions sharing a major number are compatible
    pub fn is_compatible_with(&self, other: &SchemaVersion) -> bool {
        self.version.major == other.version.major
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::from_major(1)
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let v = &self.version;
        if v.minor == 0 && v.patch == 0 && v.pre.is_empty() && v.build.is_empty() {
            serializer.serialize_u64(v.major)
        } else {
            serializer.serialize_str(&v.to_string())
        }
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(major) => Ok(Self::from_major(major)),
            Raw::Text(text) => Self::parse(&text).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parsing() {
        let v = SchemaVersion::parse("1.2.3").unwrap();
        assert_eq!(v.version_string(), "1.2.3");
        assert_eq!(SchemaVersion::parse("v2").unwrap().version_string(), "2.0.0");
        assert_eq!(SchemaVersion::parse("2.1").unwrap().version_string(), "2.1.0");
    }

    #[test]
    fn test_integer_round_trip() {
        let v: SchemaVersion = serde_json::from_str("3").unwrap();
        assert_eq!(v, SchemaVersion::from_major(3));
        assert_eq!(serde_json::to_string(&v).unwrap(), "3");

        let v: SchemaVersion = serde_json::from_str("\"1.4.0\"").unwrap();
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"1.4.0\"");
    }

    #[test]
    fn test_ordering_and_compatibility() {
        let one = SchemaVersion::from_major(1);
        let one_two = SchemaVersion::parse("1.2").unwrap();
        let two = SchemaVersion::from_major(2);
        assert!(one < one_two && one_two < two);
        assert!(one.is_compatible_with(&one_two));
        assert!(!one.is_compatible_with(&two));
    }
}

//! VDB identity: versions and version keys.
//!
//! A [`VersionKey`] is the registry's sort and lookup key. Names compare
//! case-insensitively; versions compare numerically component by component.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A dotted numeric VDB version such as `1`, `2.1`, or `1.0.3`.
///
/// Trailing zero components are insignificant, so `1` and `1.0` are equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "VersionRepr", into = "String")]
pub struct Version {
    parts: Vec<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum VersionRepr {
    Number(u32),
    Text(String),
}

impl Version {
    /// Build a version from its components.
    pub fn from_parts(parts: impl Into<Vec<u32>>) -> Self {
        let mut parts = parts.into();
        while parts.len() > 1 && parts.last() == Some(&0) {
            parts.pop();
        }
        if parts.is_empty() {
            parts.push(0);
        }
        Self { parts }
    }

    /// The lowest possible version; used as the start of range scans.
    pub fn lowest() -> Self {
        Self { parts: vec![0] }
    }

    /// Version components, with trailing zeros removed.
    pub fn parts(&self) -> &[u32] {
        &self.parts
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::from(1)
    }
}

impl From<u32> for Version {
    fn from(major: u32) -> Self {
        Self::from_parts(vec![major])
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }
        let parts = trimmed
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidVersion(s.to_string()))?;
        Ok(Self::from_parts(parts))
    }
}

impl TryFrom<VersionRepr> for Version {
    type Error = Error;

    fn try_from(repr: VersionRepr) -> Result<Self, Self::Error> {
        match repr {
            VersionRepr::Number(n) => Ok(Self::from(n)),
            VersionRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

/// Registry key for a deployed VDB.
///
/// Ordering is by case-folded name, then version, so all versions of one VDB
/// are adjacent in the registry and ascend by version.
#[derive(Debug, Clone)]
pub struct VersionKey {
    name: String,
    folded: String,
    version: Version,
}

impl VersionKey {
    /// Create a key; the original name casing is kept for display.
    pub fn new(name: impl Into<String>, version: impl Into<Version>) -> Self {
        let name = name.into();
        Self {
            folded: name.to_lowercase(),
            name,
            version: version.into(),
        }
    }

    /// The lowest key for a name; every version of `name` sorts at or after it.
    pub fn lowest(name: &str) -> Self {
        Self::new(name, Version::lowest())
    }

    /// The VDB name as deployed.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The VDB version.
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Whether this key carries `name`, ignoring case.
    pub fn has_name(&self, name: &str) -> bool {
        self.folded == name.to_lowercase()
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded == other.folded && self.version == other.version
    }
}

impl Eq for VersionKey {}

impl Hash for VersionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.folded.hash(state);
        self.version.hash(state);
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded
            .cmp(&other.folded)
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.name, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v: Version = "1.0.3".parse().unwrap();
        assert_eq!(v.parts(), &[1, 0, 3]);
        assert_eq!(v.to_string(), "1.0.3");

        assert!("".parse::<Version>().is_err());
        assert!("1.x".parse::<Version>().is_err());
    }

    #[test]
    fn test_version_trailing_zeros() {
        let a: Version = "1".parse().unwrap();
        let b: Version = "1.0.0".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_string(), "1");
    }

    #[test]
    fn test_version_ordering() {
        let v = |s: &str| s.parse::<Version>().unwrap();
        assert!(v("1") < v("1.2"));
        assert!(v("1.2") < v("2"));
        assert!(v("1.0.1") < v("1.1"));
        assert!(v("10") > v("9"));
        assert!(Version::lowest() <= v("0"));
    }

    #[test]
    fn test_version_serde() {
        let from_number: Version = serde_json::from_str("2").unwrap();
        let from_text: Version = serde_json::from_str("\"2.0\"").unwrap();
        assert_eq!(from_number, from_text);
        assert_eq!(serde_json::to_string(&from_number).unwrap(), "\"2\"");
    }

    #[test]
    fn test_key_case_insensitive() {
        let a = VersionKey::new("Portfolio", 1);
        let b = VersionKey::new("PORTFOLIO", 1);
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
        assert_eq!(a.to_string(), "Portfolio.1");
        assert!(a.has_name("portfolio"));
    }

    #[test]
    fn test_key_ordering() {
        let mut keys = vec![
            VersionKey::new("b", 1),
            VersionKey::new("A", 2),
            VersionKey::new("a", 1),
        ];
        keys.sort();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["a.1", "A.2", "b.1"]);
        assert!(VersionKey::lowest("a") < VersionKey::new("a", 1));
    }
}

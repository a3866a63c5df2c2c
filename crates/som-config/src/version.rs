//! Stack version, environment and node roles
//!
//! The stack version decides the physical index names the migrator creates
//! (`<alias>_<version>_001`). It is resolved through a [`VersionProvider`]
//! so tests and embedders can pin it without touching global state.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Release version of the running stack (`major.minor.patch[-pre]`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackVersion {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Patch component
    pub patch: u32,
    /// Pre-release label (e.g. `SNAPSHOT`)
    pub pre: Option<String>,
}

impl StackVersion {
    /// Create release version
    #[inline]
    #[must_use]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: None,
        }
    }

    /// Next minor release (`8.18.3` → `8.19.0`)
    #[must_use]
    pub fn next_minor(&self) -> Self {
        Self::new(self.major, self.minor + 1, 0)
    }

    /// Version without pre-release label
    #[must_use]
    pub fn release(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }
}

impl fmt::Display for StackVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.pre {
            write!(f, "-{pre}")?;
        }
        Ok(())
    }
}

impl FromStr for StackVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let (core, pre) = match trimmed.split_once('-') {
            Some((core, pre)) if !pre.is_empty() => (core, Some(pre.to_string())),
            Some(_) => return Err(ConfigError::InvalidVersion(s.to_string())),
            None => (trimmed, None),
        };

        let parts: Vec<&str> = core.split('.').collect();
        if parts.len() != 3 {
            return Err(ConfigError::InvalidVersion(s.to_string()));
        }
        let field = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| ConfigError::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: field(parts[0])?,
            minor: field(parts[1])?,
            patch: field(parts[2])?,
            pre,
        })
    }
}

impl Ord for StackVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.pre, &other.pre) {
                (None, None) => Ordering::Equal,
                // a pre-release sorts before its release
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for StackVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for StackVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StackVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of the stack version
///
/// Implemented for closures returning a [`StackVersion`] and for
/// [`StaticVersion`].
pub trait VersionProvider: Send + Sync {
    /// Current stack version
    fn version(&self) -> StackVersion;

    /// Source branch the version was built from
    fn branch(&self) -> String {
        "main".to_string()
    }
}

impl<F> VersionProvider for F
where
    F: Fn() -> StackVersion + Send + Sync,
{
    fn version(&self) -> StackVersion {
        self()
    }
}

/// Fixed version and branch
#[derive(Debug, Clone)]
pub struct StaticVersion {
    version: StackVersion,
    branch: String,
}

impl StaticVersion {
    /// Create provider
    #[inline]
    #[must_use]
    pub fn new(version: StackVersion, branch: impl Into<String>) -> Self {
        Self {
            version,
            branch: branch.into(),
        }
    }
}

impl VersionProvider for StaticVersion {
    fn version(&self) -> StackVersion {
        self.version.clone()
    }

    fn branch(&self) -> String {
        self.branch.clone()
    }
}

/// Build flavor of the running stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildFlavor {
    /// Self-managed deployment
    #[default]
    Traditional,
    /// Serverless deployment
    Serverless,
}

/// Resolved runtime environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Env {
    /// Stack version
    pub version: StackVersion,
    /// Source branch
    pub branch: String,
    /// Build flavor
    pub build_flavor: BuildFlavor,
}

impl Env {
    /// Resolve environment from a version provider
    #[must_use]
    pub fn from_provider(provider: &dyn VersionProvider) -> Self {
        Self {
            version: provider.version(),
            branch: provider.branch(),
            build_flavor: BuildFlavor::default(),
        }
    }

    /// With build flavor
    #[inline]
    #[must_use]
    pub fn with_build_flavor(mut self, flavor: BuildFlavor) -> Self {
        self.build_flavor = flavor;
        self
    }
}

impl Default for Env {
    fn default() -> Self {
        let version = env!("CARGO_PKG_VERSION")
            .parse()
            .unwrap_or_else(|_| StackVersion::new(0, 0, 0));
        Self::from_provider(&StaticVersion::new(version, "main"))
    }
}

/// Roles this node plays in the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeRoles {
    /// Node may run migrations
    pub migrator: bool,
    /// Node serves the UI
    pub ui: bool,
    /// Node runs background tasks
    pub background_tasks: bool,
}

impl Default for NodeRoles {
    fn default() -> Self {
        Self {
            migrator: true,
            ui: true,
            background_tasks: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parse_release_version() {
        let v: StackVersion = "8.18.0".parse().unwrap();
        assert_eq!(v, StackVersion::new(8, 18, 0));
        assert_eq!(v.to_string(), "8.18.0");
    }

    #[test]
    fn parse_snapshot_version() {
        let v: StackVersion = "9.1.0-SNAPSHOT".parse().unwrap();
        assert_eq!(v.pre.as_deref(), Some("SNAPSHOT"));
        assert!(v < StackVersion::new(9, 1, 0));
        assert_eq!(v.release(), StackVersion::new(9, 1, 0));
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("8.18".parse::<StackVersion>().is_err());
        assert!("8.x.0".parse::<StackVersion>().is_err());
        assert!("8.18.0-".parse::<StackVersion>().is_err());
    }

    #[test]
    fn next_minor_resets_patch() {
        let v = StackVersion::new(8, 18, 3);
        assert_eq!(v.next_minor(), StackVersion::new(8, 19, 0));
    }

    #[test]
    fn closure_provider() {
        let provider = || StackVersion::new(7, 17, 0);
        let env = Env::from_provider(&provider);
        assert_eq!(env.version, StackVersion::new(7, 17, 0));
        assert_eq!(env.branch, "main");
    }

    #[test]
    fn static_provider_branch() {
        let provider = StaticVersion::new(StackVersion::new(8, 0, 0), "8.x");
        let env = Env::from_provider(&provider).with_build_flavor(BuildFlavor::Serverless);
        assert_eq!(env.branch, "8.x");
        assert_eq!(env.build_flavor, BuildFlavor::Serverless);
    }

    #[test]
    fn serde_as_string() {
        let v = StackVersion::new(8, 2, 1);
        let json = serde_json::to_string(&v).unwrap();
        assert_eq!(json, "\"8.2.1\"");
        let back: StackVersion = serde_json::from_str(&json).unwrap();
        assert_eq!(back, v);
    }

    proptest! {
        #[test]
        fn ordering_is_numeric(a in 0u32..200, b in 0u32..200) {
            let va = StackVersion::new(1, a, 0);
            let vb = StackVersion::new(1, b, 0);
            prop_assert_eq!(va.cmp(&vb), a.cmp(&b));
        }
    }
}

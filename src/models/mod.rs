//! Package identity and metadata models.
//!
//! These are plain values shared by the gallery client, the cache, the
//! resolver and the search service:
//!
//! - [`PackageIdentity`]: `(id, version)`; equality, hashing, ordering and the
//!   cache directory name all derive from this pair, with the id compared
//!   ignoring ASCII case.
//! - [`Dependency`]: an unresolved requirement (`id` + [`VersionRange`]).
//! - [`ResolvedPackage`]: gallery metadata for one identity.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version;
use serde::Serialize;

use crate::core::{PackageError, Result};
use crate::version::{VersionRange, parse_version};

/// Longest package id a gallery accepts.
pub const MAX_ID_LENGTH: usize = 100;

/// Validate a package id.
///
/// Ids name cache directories, so anything that could escape or alias a path
/// is rejected along with the characters galleries never issue.
pub fn validate_id(id: &str) -> Result<()> {
    let invalid = |reason: &str| {
        PackageError::invalid_argument(format!("invalid package id '{id}': {reason}"))
    };

    if id.is_empty() {
        return Err(invalid("empty"));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(invalid("too long"));
    }
    if id.starts_with('.') {
        return Err(invalid("must not start with '.'"));
    }
    if !id.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_')) {
        return Err(invalid("only letters, digits, '.', '-' and '_' are allowed"));
    }
    Ok(())
}

/// The `(id, version)` pair that uniquely names a package.
///
/// Two identities with the same id but different versions are different
/// packages. Ids compare, hash and order ignoring ASCII case, as galleries
/// treat them; the spelling given at construction is kept for display and
/// the cache directory name. Identities are validated on construction and
/// immutable after.
///
/// # Examples
///
/// ```rust
/// use subroute_packages::models::PackageIdentity;
///
/// let identity: PackageIdentity = "Newtonsoft.Json@13.0".parse().unwrap();
/// assert_eq!(identity.to_string(), "Newtonsoft.Json@13.0.0");
/// assert_eq!(identity.cache_key(), "Newtonsoft.Json.13.0.0");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct PackageIdentity {
    id: String,
    version: Version,
}

impl PackageIdentity {
    /// Create an identity from an id and a version string.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InvalidArgument`] when the id is empty or
    /// malformed, or the version does not parse.
    pub fn new(id: impl Into<String>, version: &str) -> Result<Self> {
        Self::from_parts(id, parse_version(version)?)
    }

    /// Create an identity from an already parsed version.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InvalidArgument`] when the id is malformed.
    pub fn from_parts(id: impl Into<String>, mut version: Version) -> Result<Self> {
        let id = id.into().trim().to_string();
        validate_id(&id)?;
        version.build = semver::BuildMetadata::EMPTY;
        Ok(Self {
            id,
            version,
        })
    }

    /// Package id as published.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized semantic version.
    #[must_use]
    pub fn version(&self) -> &Version {
        &self.version
    }

    /// Directory name of this package inside the cache: `{id}.{version}`.
    #[must_use]
    pub fn cache_key(&self) -> String {
        format!("{}.{}", self.id, self.version)
    }
}

impl PackageIdentity {
    fn folded_id(&self) -> impl Iterator<Item = u8> + '_ {
        self.id.bytes().map(|b| b.to_ascii_lowercase())
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id.eq_ignore_ascii_case(&other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for b in self.folded_id() {
            state.write_u8(b);
        }
        state.write_u8(0xff);
        self.version.hash(state);
    }
}

impl Ord for PackageIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.folded_id()
            .cmp(other.folded_id())
            .then_with(|| self.version.cmp(&other.version))
    }
}

impl PartialOrd for PackageIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

impl FromStr for PackageIdentity {
    type Err = PackageError;

    /// Parse `id@version`.
    fn from_str(s: &str) -> Result<Self> {
        let (id, version) = s.split_once('@').ok_or_else(|| {
            PackageError::invalid_argument(format!("expected 'id@version', got '{s}'"))
        })?;
        Self::new(id, version)
    }
}

/// A requirement declared by a package: some version of `id` within a range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Dependency {
    id: String,
    version_spec: VersionRange,
}

impl Dependency {
    /// Create a dependency, validating the id.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InvalidArgument`] for a malformed id.
    pub fn new(id: impl Into<String>, version_spec: VersionRange) -> Result<Self> {
        let id = id.into().trim().to_string();
        validate_id(&id)?;
        Ok(Self {
            id,
            version_spec,
        })
    }

    /// Id of the required package.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Acceptable versions.
    #[must_use]
    pub fn version_spec(&self) -> &VersionRange {
        &self.version_spec
    }

    /// The identity this dependency pins, when its range is exact.
    #[must_use]
    pub fn exact_identity(&self) -> Option<PackageIdentity> {
        self.version_spec.exact_version().map(|version| PackageIdentity {
            id: self.id.clone(),
            version: version.clone(),
        })
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.version_spec)
    }
}

/// Gallery metadata for one concrete package.
///
/// Created once per identity during a resolution run (or per search hit) and
/// never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    identity: PackageIdentity,
    title: String,
    description: String,
    dependencies: Vec<Dependency>,
}

impl ResolvedPackage {
    /// Assemble package metadata. An empty title falls back to the package id.
    #[must_use]
    pub fn new(
        identity: PackageIdentity,
        title: impl Into<String>,
        description: impl Into<String>,
        dependencies: Vec<Dependency>,
    ) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            identity.id().to_string()
        } else {
            title
        };
        Self {
            identity,
            title,
            description: description.into(),
            dependencies,
        }
    }

    /// Identity of the package.
    #[must_use]
    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    /// Human readable title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Package description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Declared dependencies, in metadata order.
    #[must_use]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }
}

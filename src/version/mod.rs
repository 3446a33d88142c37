//! Version parsing and NuGet version ranges.
//!
//! Versions are [`semver::Version`] values, but galleries and package metadata
//! routinely use NuGet's shorter legacy forms. [`parse_version`] accepts those
//! and normalizes them:
//!
//! | Input | Parsed as |
//! |---|---|
//! | `1` | `1.0.0` |
//! | `1.2` | `1.2.0` |
//! | `1.2.3.0` | `1.2.3` |
//! | `1.2.3-beta.1+sha.abc` | `1.2.3-beta.1` (build metadata dropped) |
//!
//! A fourth segment other than `0` is rejected: it cannot be represented as a
//! semantic version without changing ordering.
//!
//! [`VersionRange`] implements NuGet interval notation:
//!
//! | Range | Meaning |
//! |---|---|
//! | `1.0` | `>= 1.0.0` |
//! | `[1.0]` | `== 1.0.0` |
//! | `[1.0,2.0)` | `>= 1.0.0, < 2.0.0` |
//! | `(1.0,)` | `> 1.0.0` |
//! | `(,2.0]` | `<= 2.0.0` |
//! | `*` or empty | any version |

use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::{PackageError, Result};

/// Parse a version string, accepting NuGet's short and four-part forms.
///
/// # Errors
///
/// Returns [`PackageError::InvalidArgument`] when the string is not a valid
/// (possibly abbreviated) semantic version.
///
/// # Examples
///
/// ```rust
/// use subroute_packages::version::parse_version;
///
/// assert_eq!(parse_version("1.0").unwrap().to_string(), "1.0.0");
/// assert!(parse_version("not-a-version").is_err());
/// ```
pub fn parse_version(input: &str) -> Result<Version> {
    let invalid = |reason: &str| {
        PackageError::invalid_argument(format!("invalid version '{input}': {reason}"))
    };

    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("empty"));
    }

    // Build metadata never participates in identity or ordering.
    let without_build = trimmed.split_once('+').map_or(trimmed, |(head, _)| head);
    let (core, pre) = match without_build.split_once('-') {
        Some((core, pre)) => (core, Some(pre)),
        None => (without_build, None),
    };

    let mut numbers = Vec::with_capacity(4);
    for part in core.split('.') {
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid("numeric segments expected"));
        }
        let value = part.parse::<u64>().map_err(|_| invalid("segment out of range"))?;
        numbers.push(value);
    }

    match numbers.len() {
        1..=3 => {}
        4 if numbers[3] == 0 => {}
        4 => return Err(invalid("a non-zero fourth segment is not supported")),
        _ => return Err(invalid("too many segments")),
    }

    let mut version = Version::new(
        numbers[0],
        numbers.get(1).copied().unwrap_or(0),
        numbers.get(2).copied().unwrap_or(0),
    );
    if let Some(pre) = pre {
        if pre.is_empty() {
            return Err(invalid("empty prerelease label"));
        }
        version.pre = Prerelease::new(pre).map_err(|e| invalid(&e.to_string()))?;
    }
    version.build = BuildMetadata::EMPTY;
    Ok(version)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RangeBound {
    version: Version,
    inclusive: bool,
}

/// A NuGet version range in interval notation.
///
/// Ranges come from package metadata (a dependency's `range` field) and are
/// resolved to one concrete version by the gallery's best-match policy: the
/// highest version satisfying the range.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<RangeBound>,
    max: Option<RangeBound>,
}

impl VersionRange {
    /// A range that every version satisfies.
    #[must_use]
    pub fn any() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// A range satisfied by exactly one version.
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(RangeBound {
                version: version.clone(),
                inclusive: true,
            }),
            max: Some(RangeBound {
                version,
                inclusive: true,
            }),
        }
    }

    /// A range satisfied by `version` and everything above it.
    #[must_use]
    pub fn at_least(version: Version) -> Self {
        Self {
            min: Some(RangeBound {
                version,
                inclusive: true,
            }),
            max: None,
        }
    }

    /// Parse interval notation.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::InvalidArgument`] for malformed brackets,
    /// unparseable bounds, or an empty interval such as `[2.0,1.0]`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| {
            PackageError::invalid_argument(format!("invalid version range '{input}': {reason}"))
        };

        let trimmed = input.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        let first = trimmed.chars().next().unwrap_or_default();
        if first != '[' && first != '(' {
            return Ok(Self::at_least(parse_version(trimmed)?));
        }

        let last = trimmed.chars().last().unwrap_or_default();
        if last != ']' && last != ')' {
            return Err(invalid("missing closing bracket"));
        }
        if trimmed.len() < 2 {
            return Err(invalid("missing closing bracket"));
        }
        let inner = &trimmed[1..trimmed.len() - 1];

        let Some((low, high)) = inner.split_once(',') else {
            if first == '[' && last == ']' {
                return Ok(Self::exact(parse_version(inner)?));
            }
            return Err(invalid("a single version must use inclusive brackets"));
        };
        if high.contains(',') {
            return Err(invalid("too many bounds"));
        }

        let bound = |text: &str, inclusive: bool| -> Result<Option<RangeBound>> {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            Ok(Some(RangeBound {
                version: parse_version(text)?,
                inclusive,
            }))
        };

        let range = Self {
            min: bound(low, first == '[')?,
            max: bound(high, last == ']')?,
        };

        if let (Some(min), Some(max)) = (&range.min, &range.max) {
            let empty = min.version > max.version
                || (min.version == max.version && !(min.inclusive && max.inclusive));
            if empty {
                return Err(invalid("the interval is empty"));
            }
        }
        Ok(range)
    }

    /// The single version this range pins, if it is exact.
    #[must_use]
    pub fn exact_version(&self) -> Option<&Version> {
        match (&self.min, &self.max) {
            (Some(min), Some(max)) if min.inclusive && max.inclusive && min.version == max.version => {
                Some(&min.version)
            }
            _ => None,
        }
    }

    /// Whether `version` lies inside the range.
    #[must_use]
    pub fn satisfies(&self, version: &Version) -> bool {
        let above_min = match &self.min {
            None => true,
            Some(b) if b.inclusive => version >= &b.version,
            Some(b) => version > &b.version,
        };
        let below_max = match &self.max {
            None => true,
            Some(b) if b.inclusive => version <= &b.version,
            Some(b) => version < &b.version,
        };
        above_min && below_max
    }

    /// Prerelease candidates are only eligible when a bound names a prerelease.
    #[must_use]
    pub fn allows_prerelease(&self) -> bool {
        [&self.min, &self.max]
            .into_iter()
            .flatten()
            .any(|b| !b.version.pre.is_empty())
    }

    /// Pick the highest candidate satisfying the range.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use subroute_packages::version::{VersionRange, parse_version};
    ///
    /// let range = VersionRange::parse("[1.0,2.0)").unwrap();
    /// let candidates = ["0.9", "1.0", "1.5", "2.0"].map(|v| parse_version(v).unwrap());
    /// assert_eq!(range.best_match(&candidates).unwrap().to_string(), "1.5.0");
    /// ```
    pub fn best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let allow_pre = self.allows_prerelease();
        candidates
            .into_iter()
            .filter(|v| (allow_pre || v.pre.is_empty()) && self.satisfies(v))
            .max()
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(exact) = self.exact_version() {
            return write!(f, "[{exact}]");
        }
        match (&self.min, &self.max) {
            (None, None) => write!(f, "*"),
            (min, max) => {
                let open = match min {
                    Some(b) if b.inclusive => '[',
                    _ => '(',
                };
                let close = match max {
                    Some(b) if b.inclusive => ']',
                    _ => ')',
                };
                let low = min.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
                let high = max.as_ref().map(|b| b.version.to_string()).unwrap_or_default();
                write!(f, "{open}{low}, {high}{close}")
            }
        }
    }
}

impl FromStr for VersionRange {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

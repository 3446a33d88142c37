//! Path validation for package archive entries.
//!
//! Archive entry names come from the gallery and are untrusted. Before
//! anything is written to disk the name is turned into a relative path that
//! provably stays inside the extraction root.

use std::path::{Component, Path, PathBuf};

use crate::core::{PackageError, Result};

/// Convert an archive entry name into a safe relative path.
///
/// Backslashes are treated as separators (archives produced on Windows use
/// them). `.` components are dropped. Returns an empty path for entries that
/// name the root itself.
///
/// # Errors
///
/// Returns [`PackageError::InvalidArgument`] if the entry is absolute, carries
/// a drive prefix, or contains a `..` component.
pub fn archive_entry_path(name: &str) -> Result<PathBuf> {
    let normalized = name.replace('\\', "/");
    let path = Path::new(&normalized);
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Normal(segment) => out.push(segment),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(PackageError::invalid_argument(format!(
                    "archive entry contains parent directory reference (..): {name}"
                )));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PackageError::invalid_argument(format!(
                    "archive entry is absolute: {name}"
                )));
            }
        }
    }
    Ok(out)
}

/// Whether `path` is lexically inside `boundary`.
///
/// Both paths are expected to be free of `..` (see [`archive_entry_path`]);
/// no canonicalization is performed because the target may not exist yet.
#[must_use]
pub fn is_within_directory(path: &Path, boundary: &Path) -> bool {
    path.starts_with(boundary)
}

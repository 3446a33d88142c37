//! Package archive extraction.
//!
//! Runs synchronously; callers move it onto a blocking thread. Every entry is
//! checked before it touches disk: its name must map to a path inside the
//! destination, and the number of bytes written must equal the size declared
//! in the archive. The zip reader itself rejects CRC mismatches while the
//! entry is being copied.

use std::ffi::OsStr;
use std::fs;
use std::io::{self, Cursor};
use std::path::Path;

use zip::ZipArchive;

use super::MARKER_FILE;
use crate::core::{PackageError, Result};
use crate::models::PackageIdentity;
use crate::utils::{archive_entry_path, is_within_directory};

/// Packaging metadata written by NuGet clients; not part of the payload.
const PACKAGING_ENTRIES: &[&str] = &["[Content_Types].xml", "_rels", "package"];

/// Extract a package archive into `dst`, returning the number of files written.
///
/// # Errors
///
/// Returns [`PackageError::ExtractionFailed`] for unreadable archives, unsafe
/// entry names, short writes, checksum mismatches and I/O failures.
pub(super) fn extract_archive(
    bytes: &[u8],
    dst: &Path,
    identity: &PackageIdentity,
) -> Result<usize> {
    let fail = |message: String| PackageError::extraction_failed(identity, message);

    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| fail(format!("invalid package archive: {e}")))?;
    let mut files = 0;

    for index in 0..archive.len() {
        let mut entry =
            archive.by_index(index).map_err(|e| fail(format!("unreadable entry #{index}: {e}")))?;
        let name = entry.name().to_string();
        let rel = archive_entry_path(&name).map_err(|e| fail(e.to_string()))?;
        if rel.as_os_str().is_empty() || is_packaging_entry(&rel) {
            continue;
        }

        let out = dst.join(&rel);
        if !is_within_directory(&out, dst) {
            return Err(fail(format!("entry escapes the package directory: {name}")));
        }

        if entry.is_dir() {
            fs::create_dir_all(&out).map_err(|e| fail(format!("creating {}: {e}", out.display())))?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| fail(format!("creating {}: {e}", parent.display())))?;
        }

        let mut file =
            fs::File::create(&out).map_err(|e| fail(format!("creating {}: {e}", out.display())))?;
        let written = io::copy(&mut entry, &mut file).map_err(|e| fail(format!("{name}: {e}")))?;
        if written != entry.size() {
            return Err(fail(format!(
                "{name}: wrote {written} bytes, archive declares {}",
                entry.size()
            )));
        }
        files += 1;
    }

    Ok(files)
}

fn is_packaging_entry(rel: &Path) -> bool {
    if rel == Path::new(MARKER_FILE) {
        return true;
    }
    let first = rel.components().next().map(|c| c.as_os_str());
    first.is_some_and(|first| PACKAGING_ENTRIES.iter().any(|p| first == OsStr::new(p)))
}

//! Identity-keyed on-disk package cache.
//!
//! Each package lives in its own directory under the cache root, named
//! deterministically from its identity. A directory only counts as present
//! once it carries the completion marker, and the marker is written before
//! the directory becomes visible under its final name.
//!
//! # Cache Directory Structure
//!
//! ```text
//! ~/.cache/subroute/packages/
//! ├── Newtonsoft.Json.13.0.3/      # {id}.{version}
//! │   ├── .subroute-package        # completion marker, holds "id@version"
//! │   ├── Newtonsoft.Json.nuspec
//! │   └── lib/net45/Newtonsoft.Json.dll
//! └── .staging-a1B2c3/             # in-progress extraction, never read
//! ```
//!
//! # Materialization
//!
//! 1. Present entries are returned without calling the content provider.
//! 2. The archive is extracted into a fresh staging directory inside the root
//!    on a blocking thread, verified, and stamped with the marker.
//! 3. The staging directory is renamed onto the final path. The rename is the
//!    only transition from absent to present.
//!
//! Two concurrent materializations of the same identity may both extract;
//! the loser's rename fails against the winner's complete directory and the
//! loser returns the winner's path. Staging directories are owned by a
//! [`tempfile::TempDir`] guard, so failed or cancelled attempts leave nothing
//! behind.
//!
//! # Examples
//!
//! ```rust,no_run
//! use subroute_packages::cache::LocalCache;
//! use subroute_packages::config::Config;
//! use subroute_packages::diagnostics::TracingDiagnostics;
//! use subroute_packages::gallery::{Gallery, NugetGallery};
//! use subroute_packages::models::PackageIdentity;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let diagnostics = TracingDiagnostics::shared();
//! let gallery = NugetGallery::from_config(&Config::default(), diagnostics.clone())?;
//! let cache = LocalCache::new("/tmp/packages", diagnostics);
//! let identity: PackageIdentity = "Newtonsoft.Json@13.0.3".parse()?;
//!
//! let path = cache.materialize(&identity, || gallery.download(&identity)).await?;
//! assert_eq!(cache.path_of(&identity), Some(path));
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs as async_fs;

use crate::core::{PackageError, Result};
use crate::diagnostics::SharedDiagnostics;
use crate::models::PackageIdentity;

mod extract;

/// Completion marker inside every cache entry. Holds the entry's identity.
pub const MARKER_FILE: &str = ".subroute-package";

const STAGING_PREFIX: &str = ".staging-";

/// Local package cache rooted at one directory.
///
/// Cloning is cheap; clones share the same root.
#[derive(Clone)]
pub struct LocalCache {
    root: PathBuf,
    diagnostics: SharedDiagnostics,
}

impl LocalCache {
    /// Cache rooted at `root`. Nothing is created until the first
    /// materialization.
    pub fn new(root: impl Into<PathBuf>, diagnostics: SharedDiagnostics) -> Self {
        Self {
            root: root.into(),
            diagnostics,
        }
    }

    /// The cache root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic entry path for an identity, whether present or not.
    #[must_use]
    pub fn entry_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.root.join(identity.cache_key())
    }

    /// Whether a complete entry exists for `identity`. Never touches the
    /// network.
    #[must_use]
    pub fn has(&self, identity: &PackageIdentity) -> bool {
        self.entry_path(identity).join(MARKER_FILE).is_file()
    }

    /// Path of the complete entry for `identity`, if present.
    #[must_use]
    pub fn path_of(&self, identity: &PackageIdentity) -> Option<PathBuf> {
        self.has(identity).then(|| self.entry_path(identity))
    }

    /// Create the cache root if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn ensure_root(&self) -> io::Result<()> {
        if !self.root.exists() {
            async_fs::create_dir_all(&self.root).await?;
        }
        Ok(())
    }

    /// Ensure `identity` is extracted in the cache and return its directory.
    ///
    /// `provider` is only called when the entry is absent. Its errors are
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// - whatever `provider` returns
    /// - [`PackageError::ExtractionFailed`] if the archive cannot be extracted,
    ///   verified or promoted; the entry stays absent
    pub async fn materialize<F, Fut>(
        &self,
        identity: &PackageIdentity,
        provider: F,
    ) -> Result<PathBuf>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes>>,
    {
        let target = self.entry_path(identity);
        if self.has(identity) {
            self.diagnostics.debug(&format!("{identity} already cached at {}", target.display()));
            return Ok(target);
        }

        let bytes = provider().await?;
        self.install(identity, bytes, target).await.inspect_err(|e| {
            self.diagnostics.error(&e.to_string());
        })
    }

    async fn install(
        &self,
        identity: &PackageIdentity,
        bytes: Bytes,
        target: PathBuf,
    ) -> Result<PathBuf> {
        let fail = |message: String| PackageError::extraction_failed(identity, message);

        self.ensure_root()
            .await
            .map_err(|e| fail(format!("creating cache root {}: {e}", self.root.display())))?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&self.root)
            .map_err(|e| fail(format!("creating staging directory: {e}")))?;

        let owned = identity.clone();
        let (staging, files) = tokio::task::spawn_blocking(move || {
            let files = extract::extract_archive(&bytes, staging.path(), &owned)?;
            std::fs::write(staging.path().join(MARKER_FILE), owned.to_string())
                .map_err(|e| PackageError::extraction_failed(&owned, format!("writing marker: {e}")))?;
            Ok::<_, PackageError>((staging, files))
        })
        .await
        .map_err(|e| fail(format!("extraction task failed: {e}")))??;

        self.diagnostics.debug(&format!("extracted {files} files for {identity}"));

        if target.exists() {
            if self.has(identity) {
                self.diagnostics.debug(&format!("{identity} was cached concurrently"));
                return Ok(target);
            }
            self.discard_incomplete(identity, &target)
                .await
                .map_err(|e| fail(format!("removing incomplete entry: {e}")))?;
        }

        // The staging guard is dropped after the rename; its cleanup then
        // finds nothing to delete.
        match async_fs::rename(staging.path(), &target).await {
            Ok(()) => {
                self.diagnostics.verbose(&format!("cached {identity} at {}", target.display()));
                Ok(target)
            }
            Err(_) if self.has(identity) => {
                self.diagnostics.debug(&format!("{identity} was cached concurrently"));
                Ok(target)
            }
            Err(e) => Err(fail(format!("promoting to {}: {e}", target.display()))),
        }
    }

    /// Rename an incomplete entry into a fresh staging directory and delete
    /// it there. An entry that carries the marker once moved was promoted
    /// concurrently and is put back.
    async fn discard_incomplete(&self, identity: &PackageIdentity, target: &Path) -> io::Result<()> {
        let trash = tempfile::Builder::new().prefix(STAGING_PREFIX).tempdir_in(&self.root)?;
        let moved = trash.path().join("incomplete");

        if self.has(identity) {
            return Ok(());
        }
        match async_fs::rename(target, &moved).await {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        }

        if moved.join(MARKER_FILE).is_file() {
            // Restoring fails only when yet another complete entry took its place.
            if let Err(e) = async_fs::rename(&moved, target).await {
                self.diagnostics.debug(&format!("{identity} was cached concurrently: {e}"));
            }
        } else {
            self.diagnostics.warning(&format!(
                "replacing incomplete cache entry {}",
                target.display()
            ));
        }
        async_fs::remove_dir_all(trash.path()).await
    }

    /// Identities of all complete entries, sorted.
    ///
    /// Directories without a readable marker are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache root exists but cannot be read.
    pub async fn list(&self) -> io::Result<Vec<PackageIdentity>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut identities = Vec::new();
        let mut entries = async_fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            let marker = entry.path().join(MARKER_FILE);
            let Ok(content) = async_fs::read_to_string(&marker).await else {
                continue;
            };
            match content.trim().parse::<PackageIdentity>() {
                Ok(identity) => identities.push(identity),
                Err(e) => self.diagnostics.debug(&format!(
                    "ignoring cache entry {}: {e}",
                    entry.path().display()
                )),
            }
        }
        identities.sort();
        Ok(identities)
    }

    /// Remove the entry for `identity`. Returns whether anything was removed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn remove(&self, identity: &PackageIdentity) -> io::Result<bool> {
        let path = self.entry_path(identity);
        match async_fs::remove_dir_all(&path).await {
            Ok(()) => {
                self.diagnostics.verbose(&format!("removed {identity} from the cache"));
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete the whole cache, including leftover staging directories.
    /// Returns how many complete entries were removed.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error.
    pub async fn clear(&self) -> io::Result<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let count = self.list().await?.len();
        async_fs::remove_dir_all(&self.root).await?;
        self.diagnostics.information(&format!(
            "cleared {count} packages from {}",
            self.root.display()
        ));
        Ok(count)
    }
}

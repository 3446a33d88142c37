//! Test fixtures: a recording diagnostics sink, an in-memory gallery and
//! package archive builders.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io::{Cursor, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

use crate::core::{PackageError, Result};
use crate::diagnostics::{Diagnostics, LogLevel};
use crate::gallery::{Gallery, SearchPage};
use crate::models::{Dependency, PackageIdentity, ResolvedPackage};
use crate::version::VersionRange;

/// Diagnostics sink that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl RecordingDiagnostics {
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries.lock().unwrap().clone()
    }

    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, message)| message)
            .collect()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn log(&self, level: LogLevel, message: &str) {
        self.entries.lock().unwrap().push((level, message.to_string()));
    }
}

/// Build a zip archive from `(name, content)` pairs.
pub fn zip_with_entries(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// A minimal `.nupkg` for `identity`: a nuspec and one library file.
pub fn nupkg_bytes(identity: &PackageIdentity) -> Bytes {
    let nuspec = format!(
        "<package><metadata><id>{}</id><version>{}</version></metadata></package>",
        identity.id(),
        identity.version()
    );
    let dll = format!("lib/net45/{}.dll", identity.id());
    let nuspec_name = format!("{}.nuspec", identity.id());
    Bytes::from(zip_with_entries(&[
        ("[Content_Types].xml", b"<Types/>".as_slice()),
        (nuspec_name.as_str(), nuspec.as_bytes()),
        (dll.as_str(), identity.to_string().as_bytes()),
    ]))
}

/// Gallery backed by a map, with call counters and failure injection.
#[derive(Default)]
pub struct InMemoryGallery {
    packages: Mutex<BTreeMap<PackageIdentity, ResolvedPackage>>,
    unlisted: Mutex<HashSet<PackageIdentity>>,
    lookup_failures: Mutex<HashMap<PackageIdentity, VecDeque<PackageError>>>,
    corrupt: Mutex<HashSet<PackageIdentity>>,
    lookups: Mutex<HashMap<PackageIdentity, usize>>,
    best_matches: Mutex<HashMap<String, usize>>,
    downloads: AtomicUsize,
    searches: Mutex<Vec<(String, u64, u64)>>,
    search_failures: Mutex<VecDeque<PackageError>>,
    hang: AtomicBool,
    hang_downloads: AtomicBool,
}

impl InMemoryGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `id@version` with `(dependency id, range)` requirements.
    pub fn with_package(self, id: &str, version: &str, dependencies: &[(&str, &str)]) -> Self {
        let identity = PackageIdentity::new(id, version).unwrap();
        let dependencies = dependencies
            .iter()
            .map(|(dep, range)| Dependency::new(*dep, VersionRange::parse(range).unwrap()).unwrap())
            .collect();
        let package = ResolvedPackage::new(identity.clone(), id, format!("{id} package"), dependencies);
        self.packages.lock().unwrap().insert(identity, package);
        self
    }

    /// Exact lookups still succeed; range matches skip it.
    pub fn unlist(self, id: &str, version: &str) -> Self {
        self.unlisted.lock().unwrap().insert(PackageIdentity::new(id, version).unwrap());
        self
    }

    /// The next lookups of `identity` fail with `errors`, in order.
    pub fn fail_lookups(&self, identity: &PackageIdentity, errors: Vec<PackageError>) {
        self.lookup_failures.lock().unwrap().insert(identity.clone(), errors.into());
    }

    /// The next searches fail with `errors`, in order.
    pub fn fail_searches(&self, errors: Vec<PackageError>) {
        *self.search_failures.lock().unwrap() = errors.into();
    }

    /// Serve an archive that cannot be extracted for `identity`.
    pub fn corrupt_archive(&self, identity: &PackageIdentity) {
        self.corrupt.lock().unwrap().insert(identity.clone());
    }

    /// Every later lookup never completes.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    /// Every later download never completes; lookups still answer.
    pub fn hang_downloads(&self) {
        self.hang_downloads.store(true, Ordering::SeqCst);
    }

    pub fn lookups_of(&self, identity: &PackageIdentity) -> usize {
        self.lookups.lock().unwrap().get(identity).copied().unwrap_or(0)
    }

    pub fn best_match_calls(&self, id: &str) -> usize {
        self.best_matches.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> Vec<(String, u64, u64)> {
        self.searches.lock().unwrap().clone()
    }
}

#[async_trait]
impl Gallery for InMemoryGallery {
    async fn find_package(&self, identity: &PackageIdentity) -> Result<ResolvedPackage> {
        *self.lookups.lock().unwrap().entry(identity.clone()).or_default() += 1;
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let injected =
            self.lookup_failures.lock().unwrap().get_mut(identity).and_then(VecDeque::pop_front);
        if let Some(err) = injected {
            return Err(err);
        }
        self.packages
            .lock()
            .unwrap()
            .get(identity)
            .cloned()
            .ok_or_else(|| PackageError::not_found(identity))
    }

    async fn find_best_match(&self, id: &str, range: &VersionRange) -> Result<PackageIdentity> {
        *self.best_matches.lock().unwrap().entry(id.to_string()).or_default() += 1;
        let unlisted = self.unlisted.lock().unwrap().clone();
        let packages = self.packages.lock().unwrap();
        let candidates: Vec<_> = packages
            .keys()
            .filter(|identity| identity.id().eq_ignore_ascii_case(id) && !unlisted.contains(*identity))
            .collect();
        let best = range
            .best_match(candidates.iter().copied().map(PackageIdentity::version))
            .ok_or_else(|| PackageError::not_found(format!("{id}@{range}")))?;
        candidates
            .into_iter()
            .find(|identity| identity.version() == best)
            .cloned()
            .ok_or_else(|| PackageError::not_found(format!("{id}@{range}")))
    }

    async fn download(&self, identity: &PackageIdentity) -> Result<Bytes> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.hang_downloads.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.corrupt.lock().unwrap().contains(identity) {
            return Ok(Bytes::from_static(b"this is not a zip archive"));
        }
        if !self.packages.lock().unwrap().contains_key(identity) {
            return Err(PackageError::not_found(identity));
        }
        Ok(nupkg_bytes(identity))
    }

    async fn search(&self, keyword: &str, skip: u64, take: u64) -> Result<SearchPage> {
        self.searches.lock().unwrap().push((keyword.to_string(), skip, take));
        if let Some(err) = self.search_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        let needle = keyword.to_lowercase();
        let matches: Vec<ResolvedPackage> = self
            .packages
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.identity().id().to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(SearchPage {
            total_count: matches.len() as u64,
            packages: matches.into_iter().skip(skip as usize).take(take as usize).collect(),
        })
    }
}

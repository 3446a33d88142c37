//! Transitive dependency resolution.
//!
//! [`DependencyResolver`] walks the dependency graph from one or more root
//! identities, looks every reachable package up exactly once, and
//! materializes each of them into the [`LocalCache`].
//!
//! # Algorithm
//!
//! A resolution run owns three pieces of state that are never shared with
//! other runs:
//!
//! - the set of identities already scheduled for lookup,
//! - the set of `(id, range)` pairs already scheduled for best-match,
//! - the packages and cache paths collected so far.
//!
//! Work items are futures in one [`FuturesUnordered`]:
//!
//! ```text
//! lookup(identity) ──Found──> materialize(identity)
//!                       └───> for each dependency:
//!                               exact range  → lookup(identity)
//!                               other range  → best_match(id, range) ──Matched──> lookup(identity)
//! ```
//!
//! Scheduling is deduplicated on the identity, so cycles terminate and a
//! package shared by several parents is fetched once. Siblings run
//! concurrently; the run finishes when the set drains. The first error ends
//! the run, and dropping the set abandons every sibling still in flight.
//!
//! Gallery calls are retried on [`PackageError::Unavailable`] according to
//! the [`RetryPolicy`]; materialization is retried once on
//! [`PackageError::ExtractionFailed`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use subroute_packages::cache::LocalCache;
//! use subroute_packages::config::Config;
//! use subroute_packages::diagnostics::TracingDiagnostics;
//! use subroute_packages::gallery::NugetGallery;
//! use subroute_packages::resolver::DependencyResolver;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load(None)?;
//! let diagnostics = TracingDiagnostics::shared();
//! let gallery = Arc::new(NugetGallery::from_config(&config, diagnostics.clone())?);
//! let cache = LocalCache::new(config.resolved_cache_dir()?, diagnostics.clone());
//! let resolver = DependencyResolver::new(gallery, cache, diagnostics);
//!
//! let root = "Newtonsoft.Json@13.0.3".parse()?;
//! let resolution = resolver.resolve(&[root], &CancellationToken::new()).await?;
//! for package in resolution.packages() {
//!     println!("{} -> {:?}", package.identity(), resolution.path_of(package.identity()));
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::cache::LocalCache;
use crate::core::{PackageError, Result};
use crate::diagnostics::SharedDiagnostics;
use crate::gallery::Gallery;
use crate::models::{PackageIdentity, ResolvedPackage};
use crate::utils::{RetryPolicy, with_retry};
use crate::version::VersionRange;

/// Outcome of one unit of resolution work.
enum Step {
    Found(ResolvedPackage),
    Matched(PackageIdentity),
    Materialized(PackageIdentity, PathBuf),
}

/// The deduplicated package set produced by a resolution run.
///
/// Every package in the set is present in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    packages: Vec<ResolvedPackage>,
    paths: BTreeMap<PackageIdentity, PathBuf>,
}

impl Resolution {
    /// Resolved packages, sorted by identity.
    #[must_use]
    pub fn packages(&self) -> &[ResolvedPackage] {
        &self.packages
    }

    /// Cache directory of a resolved package.
    #[must_use]
    pub fn path_of(&self, identity: &PackageIdentity) -> Option<&Path> {
        self.paths.get(identity).map(PathBuf::as_path)
    }

    /// Packages paired with their cache directories.
    pub fn iter(&self) -> impl Iterator<Item = (&ResolvedPackage, &Path)> {
        self.packages.iter().filter_map(|package| {
            self.path_of(package.identity()).map(|path| (package, path))
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Consume the resolution, keeping only the package metadata.
    #[must_use]
    pub fn into_packages(self) -> Vec<ResolvedPackage> {
        self.packages
    }
}

/// Resolves root identities to their full transitive package set.
pub struct DependencyResolver {
    gallery: Arc<dyn Gallery>,
    cache: LocalCache,
    retry: RetryPolicy,
    diagnostics: SharedDiagnostics,
}

impl DependencyResolver {
    /// Resolver with the default [`RetryPolicy`].
    pub fn new(gallery: Arc<dyn Gallery>, cache: LocalCache, diagnostics: SharedDiagnostics) -> Self {
        Self {
            gallery,
            cache,
            retry: RetryPolicy::default(),
            diagnostics,
        }
    }

    /// Replace the retry policy used for gallery calls.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The cache packages are materialized into.
    #[must_use]
    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    /// Resolve `roots` and everything they depend on.
    ///
    /// Duplicate roots collapse to one. On success every returned package is
    /// present in the cache; on failure partial results are discarded.
    ///
    /// # Errors
    ///
    /// - `NotFound` naming the first identity or range the gallery cannot
    ///   satisfy
    /// - `Unavailable` once retries are exhausted
    /// - `ExtractionFailed` if a package cannot be cached after one retry
    /// - `Protocol` for malformed gallery responses
    /// - `Cancelled` when `cancel` fires first
    pub async fn resolve(
        &self,
        roots: &[PackageIdentity],
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PackageError::Cancelled),
            outcome = self.walk(roots) => outcome,
        };

        let requested = roots.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        match &outcome {
            Ok(resolution) => self.diagnostics.summary(&format!(
                "resolved {} packages for {requested} in {:.2?}",
                resolution.len(),
                started.elapsed()
            )),
            Err(PackageError::Cancelled) => {
                self.diagnostics.minimal(&format!("resolution of {requested} cancelled"));
            }
            Err(e) => self.diagnostics.error(&format!("failed to resolve {requested}: {e}")),
        }
        outcome
    }

    /// Resolve a single root identity.
    ///
    /// # Errors
    ///
    /// See [`DependencyResolver::resolve`].
    pub async fn resolve_one(
        &self,
        root: &PackageIdentity,
        cancel: &CancellationToken,
    ) -> Result<Resolution> {
        self.resolve(std::slice::from_ref(root), cancel).await
    }

    async fn walk(&self, roots: &[PackageIdentity]) -> Result<Resolution> {
        let mut scheduled: HashSet<PackageIdentity> = HashSet::new();
        let mut ranges: HashSet<(String, VersionRange)> = HashSet::new();
        let mut packages: BTreeMap<PackageIdentity, ResolvedPackage> = BTreeMap::new();
        let mut paths: BTreeMap<PackageIdentity, PathBuf> = BTreeMap::new();
        let mut work: FuturesUnordered<BoxFuture<'_, Result<Step>>> = FuturesUnordered::new();

        for root in roots {
            if scheduled.insert(root.clone()) {
                work.push(self.lookup(root.clone()).boxed());
            }
        }

        while let Some(step) = work.next().await {
            match step? {
                Step::Found(package) => {
                    let identity = package.identity().clone();
                    work.push(self.materialize(identity.clone()).boxed());

                    for dependency in package.dependencies() {
                        if let Some(exact) = dependency.exact_identity() {
                            if scheduled.insert(exact.clone()) {
                                work.push(self.lookup(exact).boxed());
                            }
                        } else if ranges
                            .insert((dependency.id().to_lowercase(), dependency.version_spec().clone()))
                        {
                            work.push(
                                self.best_match(
                                    dependency.id().to_string(),
                                    dependency.version_spec().clone(),
                                )
                                .boxed(),
                            );
                        }
                    }
                    packages.insert(identity, package);
                }
                Step::Matched(identity) => {
                    if scheduled.insert(identity.clone()) {
                        work.push(self.lookup(identity).boxed());
                    }
                }
                Step::Materialized(identity, path) => {
                    paths.insert(identity, path);
                }
            }
        }

        Ok(Resolution {
            packages: packages.into_values().collect(),
            paths,
        })
    }

    async fn lookup(&self, identity: PackageIdentity) -> Result<Step> {
        self.diagnostics.verbose(&format!("resolving {identity}"));
        let operation = format!("looking up {identity}");
        let package = with_retry(&self.retry, self.diagnostics.as_ref(), &operation, || {
            self.gallery.find_package(&identity)
        })
        .await?;
        Ok(Step::Found(package))
    }

    async fn best_match(&self, id: String, range: VersionRange) -> Result<Step> {
        let operation = format!("matching {id} {range}");
        let identity = with_retry(&self.retry, self.diagnostics.as_ref(), &operation, || {
            self.gallery.find_best_match(&id, &range)
        })
        .await?;
        self.diagnostics.debug(&format!("{id} {range} resolved to {identity}"));
        Ok(Step::Matched(identity))
    }

    async fn materialize(&self, identity: PackageIdentity) -> Result<Step> {
        let operation = format!("downloading {identity}");
        let download = || {
            with_retry(&self.retry, self.diagnostics.as_ref(), &operation, || {
                self.gallery.download(&identity)
            })
        };

        let path = match self.cache.materialize(&identity, download).await {
            Err(PackageError::ExtractionFailed { message, .. }) => {
                self.diagnostics.warning(&format!(
                    "extracting {identity} failed ({message}), retrying once"
                ));
                self.cache.materialize(&identity, download).await?
            }
            other => other?,
        };
        Ok(Step::Materialized(identity, path))
    }
}

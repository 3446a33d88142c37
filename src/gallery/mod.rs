//! Remote package gallery access.
//!
//! [`Gallery`] is the seam between the core and the network: exact lookups,
//! best-match lookups for version ranges, package downloads and keyword
//! search. It is the only component that performs network I/O, and it never
//! writes to disk.
//!
//! Implementations do **not** retry. Transport failures surface as
//! [`PackageError::Unavailable`](crate::core::PackageError::Unavailable) so that
//! the resolver and the search service can apply one backoff policy across
//! many concurrent calls (see [`crate::utils::retry`]).
//!
//! [`NugetGallery`] implements the trait against a NuGet v3 feed.

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::Result;
use crate::models::{PackageIdentity, ResolvedPackage};
use crate::version::VersionRange;

mod nuget;
pub(crate) mod protocol;

pub use nuget::NugetGallery;

/// One page of search results as reported by the gallery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPage {
    /// Results in the gallery's ranking order
    pub packages: Vec<ResolvedPackage>,
    /// Total number of matches across all pages
    pub total_count: u64,
}

/// Remote package gallery operations.
#[async_trait]
pub trait Gallery: Send + Sync {
    /// Exact lookup by identity.
    ///
    /// # Errors
    ///
    /// - `NotFound` when no package with exactly this identity exists
    /// - `Unavailable` on transport failure
    async fn find_package(&self, identity: &PackageIdentity) -> Result<ResolvedPackage>;

    /// The highest listed version of `id` that satisfies `range`.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the package is unknown or no version satisfies the range
    /// - `Unavailable` on transport failure
    async fn find_best_match(&self, id: &str, range: &VersionRange) -> Result<PackageIdentity>;

    /// Download the package archive for an identity.
    ///
    /// # Errors
    ///
    /// - `NotFound` when the gallery has no content for the identity
    /// - `Unavailable` on transport failure
    async fn download(&self, identity: &PackageIdentity) -> Result<Bytes>;

    /// Keyword search over latest stable versions, applying `skip`/`take`
    /// exactly as given.
    ///
    /// # Errors
    ///
    /// - `Unavailable` on transport failure
    async fn search(&self, keyword: &str, skip: u64, take: u64) -> Result<SearchPage>;
}

//! Paginated keyword search with enforced bounds.
//!
//! Callers pass raw, optional pagination values; [`SearchService`] turns them
//! into the values actually sent to the gallery and reports those back in the
//! [`PagedCollection`]:
//!
//! | Input | Effective value |
//! |---|---|
//! | `take` absent or above [`MAX_TAKE`] | [`MAX_TAKE`] |
//! | `take` negative | `InvalidArgument` |
//! | `skip` absent | `0` |
//! | `skip` negative | `InvalidArgument` |

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::{PackageError, Result};
use crate::diagnostics::SharedDiagnostics;
use crate::gallery::Gallery;
use crate::models::ResolvedPackage;
use crate::utils::{RetryPolicy, with_retry};

/// Largest page a single search may return.
pub const MAX_TAKE: u64 = 100;

/// One page of results plus the pagination actually applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedCollection<T> {
    /// Results in gallery ranking order
    pub results: Vec<T>,
    /// Matches across all pages
    pub total_count: u64,
    /// Effective skip
    pub skip: u64,
    /// Effective take, after clamping
    pub take: u64,
}

impl<T> PagedCollection<T> {
    /// Whether pages exist after this one.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.skip.saturating_add(self.results.len() as u64) < self.total_count
    }
}

/// Effective `(skip, take)` for raw caller input.
///
/// # Errors
///
/// Returns [`PackageError::InvalidArgument`] for negative values.
pub fn effective_bounds(skip: Option<i64>, take: Option<i64>) -> Result<(u64, u64)> {
    let skip = match skip {
        None => 0,
        Some(skip) => u64::try_from(skip).map_err(|_| {
            PackageError::invalid_argument(format!("skip must not be negative (got {skip})"))
        })?,
    };
    let take = match take {
        None => MAX_TAKE,
        Some(take) => u64::try_from(take)
            .map_err(|_| {
                PackageError::invalid_argument(format!("take must not be negative (got {take})"))
            })?
            .min(MAX_TAKE),
    };
    Ok((skip, take))
}

/// Search front end over a [`Gallery`].
pub struct SearchService {
    gallery: Arc<dyn Gallery>,
    retry: RetryPolicy,
    diagnostics: SharedDiagnostics,
}

impl SearchService {
    pub fn new(gallery: Arc<dyn Gallery>, diagnostics: SharedDiagnostics) -> Self {
        Self {
            gallery,
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

    /// Search latest stable packages matching `keyword`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for negative `skip` or `take`
    /// - `Unavailable` once retries are exhausted
    /// - `Protocol` for malformed gallery responses
    /// - `Cancelled` when `cancel` fires first
    pub async fn search(
        &self,
        keyword: &str,
        skip: Option<i64>,
        take: Option<i64>,
        cancel: &CancellationToken,
    ) -> Result<PagedCollection<ResolvedPackage>> {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(PackageError::Cancelled),
            outcome = self.run(keyword, skip, take) => outcome,
        };

        match &outcome {
            Ok(page) => self.diagnostics.summary(&format!(
                "search '{keyword}' returned {} of {} packages (skip {}, take {})",
                page.results.len(),
                page.total_count,
                page.skip,
                page.take
            )),
            Err(PackageError::Cancelled) => {
                self.diagnostics.minimal(&format!("search '{keyword}' cancelled"));
            }
            Err(e) => self.diagnostics.error(&format!("search '{keyword}' failed: {e}")),
        }
        outcome
    }

    async fn run(
        &self,
        keyword: &str,
        skip: Option<i64>,
        take: Option<i64>,
    ) -> Result<PagedCollection<ResolvedPackage>> {
        let (skip, take) = effective_bounds(skip, take)?;
        let operation = format!("searching for '{keyword}'");
        let page = with_retry(&self.retry, self.diagnostics.as_ref(), &operation, || {
            self.gallery.search(keyword, skip, take)
        })
        .await?;

        Ok(PagedCollection {
            results: page.packages,
            total_count: page.total_count,
            skip,
            take,
        })
    }
}

//! Search the gallery.
//!
//! ```bash
//! subroute-pkg search json
//! subroute-pkg search json --skip 100 --take 50 --format json
//! ```
//!
//! Only the latest stable version of each package is listed. Pages hold at
//! most 100 results; larger `--take` values are clamped and the applied
//! value is shown.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use super::{CommandContext, OutputFormat};
use crate::gallery::NugetGallery;
use crate::models::ResolvedPackage;
use crate::search::{PagedCollection, SearchService};

/// Arguments for `search`.
#[derive(Args)]
pub struct SearchCommand {
    /// Search keyword
    pub keyword: String,

    /// Number of results to skip
    #[arg(long, allow_negative_numbers = true)]
    pub skip: Option<i64>,

    /// Page size (at most 100)
    #[arg(long, allow_negative_numbers = true)]
    pub take: Option<i64>,
}

impl SearchCommand {
    /// Run the search and print one page.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid pagination, gallery failures, or output
    /// failures.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let gallery = NugetGallery::from_config(&ctx.config, ctx.diagnostics.clone())
            .context("Failed to create gallery client")?;
        let service = SearchService::new(Arc::new(gallery), ctx.diagnostics.clone())
            .with_retry_policy(ctx.config.retry.clone());

        let page = service
            .search(&self.keyword, self.skip, self.take, &ctx.cancel)
            .await
            .with_context(|| format!("Search for '{}' failed", self.keyword))?;

        match ctx.format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&page)?),
            OutputFormat::Text => print_text(&page),
        }
        Ok(())
    }
}

fn print_text(page: &PagedCollection<ResolvedPackage>) {
    if page.results.is_empty() {
        println!("No packages found ({} total matches)", page.total_count);
        return;
    }

    for package in &page.results {
        println!(
            "{} {}  {}",
            package.identity().id().bold(),
            package.identity().version().to_string().cyan(),
            package.title()
        );
        if !package.description().is_empty() {
            println!("    {}", package.description().dimmed());
        }
    }

    let first = page.skip + 1;
    let last = page.skip + page.results.len() as u64;
    println!("\nShowing {first}-{last} of {} (take {})", page.total_count, page.take);
    if page.has_more() {
        println!("{}", format!("Next page: --skip {last} --take {}", page.take).dimmed());
    }
}

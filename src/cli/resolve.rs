//! Resolve packages into the local cache.
//!
//! ```bash
//! subroute-pkg resolve Newtonsoft.Json@13.0.3
//! subroute-pkg resolve Serilog@3.1.1 Dapper@2.1.35 --format json
//! ```
//!
//! Every package reachable from the requested ones is looked up once,
//! downloaded if it is not already cached, and listed with its cache path.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use super::{CommandContext, OutputFormat};
use crate::gallery::NugetGallery;
use crate::models::PackageIdentity;
use crate::resolver::{DependencyResolver, Resolution};

/// Arguments for `resolve`.
#[derive(Args)]
pub struct ResolveCommand {
    /// Packages to resolve, e.g. `Newtonsoft.Json@13.0.3`
    #[arg(required = true, value_name = "ID@VERSION")]
    pub packages: Vec<PackageIdentity>,
}

#[derive(Serialize)]
struct ResolvedEntry<'a> {
    id: &'a str,
    version: String,
    title: &'a str,
    path: &'a Path,
    dependencies: Vec<String>,
}

impl ResolveCommand {
    /// Resolve the requested packages and print the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the gallery client cannot be built, resolution
    /// fails, or output cannot be written.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let gallery = NugetGallery::from_config(&ctx.config, ctx.diagnostics.clone())
            .context("Failed to create gallery client")?;
        let resolver = DependencyResolver::new(Arc::new(gallery), ctx.cache()?, ctx.diagnostics.clone())
            .with_retry_policy(ctx.config.retry.clone());

        let requested =
            self.packages.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ");
        let resolution = resolver
            .resolve(&self.packages, &ctx.cancel)
            .await
            .with_context(|| format!("Failed to resolve {requested}"))?;

        match ctx.format {
            OutputFormat::Json => print_json(&resolution),
            OutputFormat::Text => {
                print_text(&resolution);
                Ok(())
            }
        }
    }
}

fn print_json(resolution: &Resolution) -> Result<()> {
    let entries: Vec<ResolvedEntry<'_>> = resolution
        .iter()
        .map(|(package, path)| ResolvedEntry {
            id: package.identity().id(),
            version: package.identity().version().to_string(),
            title: package.title(),
            path,
            dependencies: package.dependencies().iter().map(ToString::to_string).collect(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

fn print_text(resolution: &Resolution) {
    for (package, path) in resolution.iter() {
        println!(
            "{} {}  {}",
            package.identity().id().bold(),
            package.identity().version().to_string().cyan(),
            path.display().to_string().dimmed()
        );
        for dependency in package.dependencies() {
            println!("    {} {dependency}", "└─".dimmed());
        }
    }
    println!("{} {} packages resolved", "✓".green(), resolution.len());
}

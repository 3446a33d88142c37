//! Manage the local package cache.
//!
//! # Examples
//!
//! Show where packages are cached:
//! ```bash
//! subroute-pkg cache path
//! ```
//!
//! List cached packages (the default):
//! ```bash
//! subroute-pkg cache list
//! subroute-pkg cache
//! ```
//!
//! Remove one package, or everything:
//! ```bash
//! subroute-pkg cache remove Newtonsoft.Json@13.0.3
//! subroute-pkg cache clean
//! ```
//!
//! Only complete entries (those carrying the completion marker) are listed.
//! `clean` also removes staging directories left behind by interrupted runs.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde_json::json;

use super::{CommandContext, OutputFormat};
use crate::cache::LocalCache;
use crate::models::PackageIdentity;

/// Command to manage the package cache.
#[derive(Args)]
pub struct CacheCommand {
    /// Cache operation to perform
    #[command(subcommand)]
    command: Option<CacheSubcommands>,
}

#[derive(Subcommand)]
enum CacheSubcommands {
    /// Print the cache directory
    Path,

    /// List cached packages
    List,

    /// Remove one cached package
    Remove {
        /// Package to remove, e.g. `Newtonsoft.Json@13.0.3`
        #[arg(value_name = "ID@VERSION")]
        package: PackageIdentity,
    },

    /// Delete the whole cache
    Clean,
}

impl CacheCommand {
    /// Execute against the cache described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be determined or read.
    pub async fn execute(self, ctx: &CommandContext) -> Result<()> {
        let cache = ctx.cache()?;
        self.execute_with_cache(&cache, ctx.format).await
    }

    pub(crate) async fn execute_with_cache(self, cache: &LocalCache, format: OutputFormat) -> Result<()> {
        match self.command.unwrap_or(CacheSubcommands::List) {
            CacheSubcommands::Path => match format {
                OutputFormat::Json => println!("{}", json!({ "path": cache.root() })),
                OutputFormat::Text => println!("{}", cache.root().display()),
            },
            CacheSubcommands::List => {
                let packages = cache
                    .list()
                    .await
                    .with_context(|| format!("Failed to read cache {}", cache.root().display()))?;
                list(cache, &packages, format)?;
            }
            CacheSubcommands::Remove { package } => {
                let removed = cache
                    .remove(&package)
                    .await
                    .with_context(|| format!("Failed to remove {package} from the cache"))?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", json!({ "package": package.to_string(), "removed": removed }));
                    }
                    OutputFormat::Text if removed => println!("{} Removed {package}", "✓".green()),
                    OutputFormat::Text => println!("{package} is not cached"),
                }
            }
            CacheSubcommands::Clean => {
                let count = cache
                    .clear()
                    .await
                    .with_context(|| format!("Failed to clear cache {}", cache.root().display()))?;
                match format {
                    OutputFormat::Json => println!("{}", json!({ "removed": count })),
                    OutputFormat::Text => {
                        println!("{} Removed {count} cached packages", "🗑️ ".yellow());
                    }
                }
            }
        }
        Ok(())
    }
}

fn list(cache: &LocalCache, packages: &[PackageIdentity], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let entries: Vec<_> = packages
                .iter()
                .map(|identity| {
                    json!({
                        "id": identity.id(),
                        "version": identity.version().to_string(),
                        "path": cache.entry_path(identity),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Text => {
            println!("{} {}", "Cache:".bold(), cache.root().display());
            if packages.is_empty() {
                println!("  (empty)");
            }
            for identity in packages {
                println!("  {} {}", identity.id(), identity.version().to_string().cyan());
            }
        }
    }
    Ok(())
}

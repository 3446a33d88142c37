//! Command-line interface for subroute-packages.
//!
//! # Commands
//!
//! - `resolve <ID@VERSION>...` - resolve packages and their dependencies into the cache
//! - `search <KEYWORD> [--skip N] [--take N]` - paginated gallery search
//! - `cache [path|list|remove|clean]` - inspect and maintain the package cache
//!
//! # Global Options
//!
//! - `--config <PATH>` - configuration file (else `$SUBROUTE_PACKAGES_CONFIG`)
//! - `--format text|json` - output format
//! - `-v, --verbose` / `-q, --quiet` - log verbosity; `RUST_LOG` takes precedence
//!
//! Commands run with a [`CancellationToken`]; the binary cancels it on Ctrl-C
//! and in-flight gallery calls are abandoned.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;

use crate::cache::LocalCache;
use crate::config::Config;
use crate::diagnostics::{SharedDiagnostics, TracingDiagnostics};

pub mod cache;
pub mod resolve;
pub mod search;


/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human readable, colored text
    #[default]
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}

/// Top-level command line.
#[derive(Parser)]
#[command(name = "subroute-pkg", version, about = "Resolve, cache and search NuGet packages")]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve packages and their transitive dependencies into the cache
    Resolve(resolve::ResolveCommand),
    /// Search the gallery for packages
    Search(search::SearchCommand),
    /// Inspect or maintain the package cache
    Cache(cache::CacheCommand),
}

/// Everything a command needs besides its own arguments.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub diagnostics: SharedDiagnostics,
    pub cancel: CancellationToken,
}

impl CommandContext {
    /// The cache described by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no cache directory can be determined.
    pub fn cache(&self) -> Result<LocalCache> {
        Ok(LocalCache::new(self.config.resolved_cache_dir()?, self.diagnostics.clone()))
    }
}

impl Cli {
    /// Default log filter for the chosen verbosity.
    #[must_use]
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "subroute_packages=debug"
        } else if self.quiet {
            "error"
        } else {
            "warn,subroute_packages::summary=info"
        }
    }

    /// Load configuration and run the selected command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded or the command fails.
    pub async fn execute(self, cancel: CancellationToken) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;
        self.execute_with_config(config, cancel).await
    }

    /// Run the selected command with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn execute_with_config(self, config: Config, cancel: CancellationToken) -> Result<()> {
        let ctx = CommandContext {
            config,
            format: self.format,
            diagnostics: Arc::new(TracingDiagnostics),
            cancel,
        };
        match self.command {
            Commands::Resolve(cmd) => cmd.execute(&ctx).await,
            Commands::Search(cmd) => cmd.execute(&ctx).await,
            Commands::Cache(cmd) => cmd.execute(&ctx).await,
        }
    }
}

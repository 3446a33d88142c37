//! subroute-packages - package resolution core for Subroute
//!
//! Resolves packages (identified by id and version) against a NuGet v3
//! gallery, discovers their transitive dependencies, and materializes each
//! distinct package exactly once into a local on-disk cache. It also offers a
//! bounded, paginated keyword search over the same gallery.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌────────────────────┐        ┌───────────────┐
//!  resolve ──────>│ DependencyResolver │───────>│   LocalCache  │──> {root}/{id}.{version}/
//!                 └─────────┬──────────┘        └───────▲───────┘
//!                           │ find / match / download   │ bytes
//!                 ┌─────────▼──────────┐                │
//!  search ──────> │   Gallery (trait)  │────────────────┘
//!  SearchService  │   NugetGallery     │──> NuGet v3 HTTP
//!                 └────────────────────┘
//! ```
//!
//! - The gallery is the only component that talks to the network.
//! - The cache is the only shared mutable resource; its single mutation
//!   primitive is an atomic directory rename.
//! - Each resolution run owns its memoization state; unrelated runs never
//!   coordinate.
//! - Every component reports through an injected [`diagnostics::Diagnostics`]
//!   sink.
//!
//! # Core Modules
//!
//! - [`cache`] - Identity-keyed package cache with atomic promotion
//! - [`config`] - Gallery source, cache location, target frameworks, retry policy
//! - [`core`] - Error taxonomy shared by every component
//! - [`diagnostics`] - Leveled logging port and its `tracing` adapter
//! - [`gallery`] - Gallery trait and the NuGet v3 client
//! - [`models`] - Package identities, dependencies and metadata
//! - [`resolver`] - Concurrent, memoized transitive resolution
//! - [`search`] - Paginated search with enforced bounds
//! - [`version`] - Version parsing and NuGet version ranges
//!
//! ## Supporting Modules
//!
//! - [`cli`] - Command-line front end (`subroute-pkg`)
//! - [`utils`] - Archive path validation and retry helpers
//!
//! # Command-Line Usage
//!
//! ```bash
//! # Resolve packages and their dependencies into the cache
//! subroute-pkg resolve Newtonsoft.Json@13.0.3
//!
//! # Search the gallery, 20 results at a time
//! subroute-pkg search json --skip 20 --take 20
//!
//! # Inspect or clear the cache
//! subroute-pkg cache list
//! subroute-pkg cache clean
//! ```

// Core functionality modules
pub mod cache;
pub mod config;
pub mod core;
pub mod gallery;
pub mod resolver;
pub mod search;

// Supporting modules
pub mod cli;
pub mod diagnostics;
pub mod models;
pub mod utils;
pub mod version;

#[cfg(test)]
pub(crate) mod test_utils;

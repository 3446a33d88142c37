//! Core types shared by every component of the package core.
//!
//! At the moment this is the error taxonomy: [`PackageError`] and the
//! [`Result`] alias. Components return typed errors so that callers can tell a
//! transient gallery outage (retry it) from a missing package (report it) from
//! a caller-requested cancellation (stop quietly).
//!
//! # Examples
//!
//! ```rust,no_run
//! use subroute_packages::core::{PackageError, Result};
//!
//! fn classify(result: Result<()>) -> &'static str {
//!     match result {
//!         Ok(()) => "ok",
//!         Err(e) if e.is_retryable() => "try again later",
//!         Err(PackageError::Cancelled) => "cancelled",
//!         Err(_) => "failed",
//!     }
//! }
//! ```

pub mod error;

pub use error::{PackageError, Result};

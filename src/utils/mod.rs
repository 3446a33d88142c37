//! Supporting utilities.
//!
//! - [`path_validation`] - Safe handling of untrusted archive entry names
//! - [`retry`] - Bounded exponential backoff for transient gallery failures

pub mod path_validation;
pub mod retry;

pub use path_validation::{archive_entry_path, is_within_directory};
pub use retry::{RetryPolicy, with_retry};

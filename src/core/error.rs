//! Error taxonomy for package resolution, caching and search.
//!
//! Every fallible operation in the library returns [`PackageError`]. The
//! variants are deliberately coarse: callers branch on *what kind* of failure
//! happened (retry it, report it, or stop), and the payload carries enough
//! context to name the identity or operation involved.
//!
//! | Variant | Retried by callers |
//! |---|---|
//! | [`PackageError::NotFound`] | never |
//! | [`PackageError::Unavailable`] | yes, bounded exponential backoff |
//! | [`PackageError::ExtractionFailed`] | once |
//! | [`PackageError::InvalidArgument`] | never |
//! | [`PackageError::Protocol`] | never |
//! | [`PackageError::Cancelled`] | never |

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T, E = PackageError> = std::result::Result<T, E>;

/// Failure modes of the package core.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PackageError {
    /// The gallery has no package with this exact identity, or no version of
    /// the package satisfies the requested range.
    ///
    /// `identity` is rendered as `id@version` (or `id@range` for range lookups).
    #[error("package not found: {identity}")]
    NotFound {
        /// The identity that could not be located upstream
        identity: String,
    },

    /// The gallery could not be reached, timed out, or answered with a
    /// transient status (5xx, 429).
    #[error("gallery unavailable while {operation}: {message}")]
    Unavailable {
        /// What the client was doing, e.g. `looking up Foo@1.0.0`
        operation: String,
        /// Transport or status description
        message: String,
    },

    /// A package could not be extracted into the local cache. The cache entry
    /// stays absent.
    #[error("failed to extract {identity} into the package cache: {message}")]
    ExtractionFailed {
        /// Identity of the package being materialized
        identity: String,
        /// Description of the underlying I/O or archive failure
        message: String,
    },

    /// Caller input was rejected before any work was done.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Which argument was wrong and why
        message: String,
    },

    /// The gallery answered, but not in a shape the client understands.
    #[error("unexpected gallery response: {message}")]
    Protocol {
        /// Status or decoding failure description
        message: String,
    },

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

impl PackageError {
    /// Build a [`PackageError::NotFound`] for anything that displays as an identity.
    pub fn not_found(identity: impl std::fmt::Display) -> Self {
        Self::NotFound {
            identity: identity.to_string(),
        }
    }

    /// Build a [`PackageError::Unavailable`].
    pub fn unavailable(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Unavailable {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Build a [`PackageError::ExtractionFailed`].
    pub fn extraction_failed(
        identity: impl std::fmt::Display,
        message: impl std::fmt::Display,
    ) -> Self {
        Self::ExtractionFailed {
            identity: identity.to_string(),
            message: message.to_string(),
        }
    }

    /// Build a [`PackageError::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Build a [`PackageError::Protocol`].
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Whether a caller should retry the failed operation with backoff.
    ///
    /// Only transport failures qualify; extraction gets its own single retry
    /// in the resolver and is not covered here.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }

    /// Whether this error is the caller-requested abort rather than a failure.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

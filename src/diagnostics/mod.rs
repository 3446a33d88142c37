//! Leveled diagnostics sink injected into every component.
//!
//! Components never reach for a global logger. Each one receives an
//! `Arc<dyn Diagnostics>` at construction and only ever *emits* through it:
//! the sink is an output port, not shared state.
//!
//! The levels mirror those of the gallery tooling the core talks to:
//! `debug`, `verbose`, `information`, `minimal`, `warning`, `error` and
//! `summary`. [`TracingDiagnostics`] forwards them to [`tracing`], which the
//! binary wires to a subscriber.

use std::fmt;
use std::sync::Arc;

/// Severity of a diagnostic message, from most to least chatty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LogLevel {
    /// Internal detail useful when debugging the core itself
    Debug,
    /// Step-by-step progress
    Verbose,
    /// Normal informational output
    Information,
    /// Information that should survive a quiet log level
    Minimal,
    /// Something unexpected that did not stop the operation
    Warning,
    /// A failure about to be returned to the caller
    Error,
    /// One line describing the outcome of a whole operation
    Summary,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Verbose => "verbose",
            Self::Information => "information",
            Self::Minimal => "minimal",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Output port for leveled diagnostics.
///
/// Implementors only need [`Diagnostics::log`]; the per-level helpers forward
/// to it.
pub trait Diagnostics: Send + Sync {
    /// Emit one message.
    fn log(&self, level: LogLevel, message: &str);

    fn debug(&self, message: &str) {
        self.log(LogLevel::Debug, message);
    }

    fn verbose(&self, message: &str) {
        self.log(LogLevel::Verbose, message);
    }

    fn information(&self, message: &str) {
        self.log(LogLevel::Information, message);
    }

    fn minimal(&self, message: &str) {
        self.log(LogLevel::Minimal, message);
    }

    fn warning(&self, message: &str) {
        self.log(LogLevel::Warning, message);
    }

    fn error(&self, message: &str) {
        self.log(LogLevel::Error, message);
    }

    fn summary(&self, message: &str) {
        self.log(LogLevel::Summary, message);
    }
}

/// Shared handle to a diagnostics sink.
pub type SharedDiagnostics = Arc<dyn Diagnostics>;

/// Target used for [`LogLevel::Summary`] events.
pub const SUMMARY_TARGET: &str = "subroute_packages::summary";

/// Forwards diagnostics to `tracing`.
///
/// | Level | tracing |
/// |---|---|
/// | debug | TRACE |
/// | verbose | DEBUG |
/// | information, minimal | INFO |
/// | warning | WARN |
/// | error | ERROR |
/// | summary | INFO on [`SUMMARY_TARGET`] |
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl TracingDiagnostics {
    /// A shared tracing-backed sink.
    #[must_use]
    pub fn shared() -> SharedDiagnostics {
        Arc::new(Self)
    }
}

impl Diagnostics for TracingDiagnostics {
    fn log(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::trace!("{message}"),
            LogLevel::Verbose => tracing::debug!("{message}"),
            LogLevel::Information | LogLevel::Minimal => tracing::info!("{message}"),
            LogLevel::Warning => tracing::warn!("{message}"),
            LogLevel::Error => tracing::error!("{message}"),
            LogLevel::Summary => tracing::info!(target: SUMMARY_TARGET, "{message}"),
        }
    }
}

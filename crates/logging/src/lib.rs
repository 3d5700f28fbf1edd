//! Dropcraft Logging
//!
//! Logging setup shared by the `dropcraft` binary and tests.
//!
//! The chosen level applies to the dropcraft crates; everything else is
//! capped at `warn`. `RUST_LOG`, when set, replaces the whole filter.
//!
//! ## Usage
//!
//! ```no_run
//! use dropcraft_logging::{init, LogLevel};
//!
//! // From a `-v` count on the command line
//! init(LogLevel::from_verbosity(1));
//! ```

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Log level for the dropcraft crates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// `false` → `Info`, `true` → `Debug`
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Self::Debug
        } else {
            Self::Info
        }
    }

    /// Create a log level from a `-v` count
    ///
    /// - `0` → `Info`
    /// - `1` → `Debug`
    /// - `2+` → `Trace`
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => Self::Info,
            1 => Self::Debug,
            _ => Self::Trace,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

#[derive(Error, Debug)]
#[error("failed to initialize logging: {0}")]
pub struct LoggingError(String);

/// Filter directives for `level`: third-party crates at `warn` or quieter,
/// dropcraft crates (target prefix `dropcraft`) at `level`.
pub fn filter_directives(level: LogLevel) -> String {
    let base = match level {
        LogLevel::Error => "error",
        _ => "warn",
    };
    format!("{},dropcraft={}", base, level.as_str())
}

fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(level)))
}

/// Initialize logging at `level`.
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use `try_init` to handle
/// that case.
pub fn init(level: LogLevel) {
    if let Err(e) = try_init(level) {
        panic!("{}", e);
    }
}

/// Try to initialize logging, failing if a subscriber is already set
pub fn try_init(level: LogLevel) -> Result<(), LoggingError> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(level))
        .with_target(false)
        .try_init()
        .map_err(|e| LoggingError(e.to_string()))
}

/// Debug-level logging routed through the test harness's captured output.
/// Safe to call from every test.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directives(LogLevel::Debug)))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_verbose() {
        assert_eq!(LogLevel::from_verbose(false), LogLevel::Info);
        assert_eq!(LogLevel::from_verbose(true), LogLevel::Debug);
    }

    #[test]
    fn test_log_level_from_verbosity() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(2), LogLevel::Trace);
        assert_eq!(LogLevel::from_verbosity(10), LogLevel::Trace);
    }

    #[test]
    fn test_filter_directives() {
        assert_eq!(filter_directives(LogLevel::Info), "warn,dropcraft=info");
        assert_eq!(filter_directives(LogLevel::Trace), "warn,dropcraft=trace");
        assert_eq!(filter_directives(LogLevel::Error), "error,dropcraft=error");
    }

    #[test]
    fn test_directives_parse() {
        for level in [LogLevel::Error, LogLevel::Warn, LogLevel::Info, LogLevel::Debug, LogLevel::Trace] {
            assert!(EnvFilter::try_new(filter_directives(level)).is_ok());
        }
    }

    #[test]
    fn test_init_test_is_idempotent() {
        init_test();
        init_test();
        tracing::debug!("logging initialized twice without panicking");
    }
}

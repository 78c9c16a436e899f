//! Internal logging system for the WSI layer
//!
//! This module provides:
//! - Customizable logger via the Logger trait
//! - Severity levels (Trace, Debug, Info, Warn, Error)
//! - Colored console output by default
//! - File and line information for ERROR logs
//!
//! The process-wide logger slot lives in [`crate::layer::Layer`].

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Logger trait for custom logging implementations
///
/// The layer runs inside someone else's process, so applications that want
/// the layer's diagnostics routed elsewhere (a file, their own log sink)
/// install a custom logger with `Layer::set_logger`.
///
/// # Example
///
/// ```no_run
/// use wsi_layer::wsi::log::{Logger, LogEntry};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, entry: &LogEntry) {
///         eprintln!("{}: {}", entry.source, entry.message);
///     }
/// }
/// ```
pub trait Logger: Send + Sync {
    /// Log an entry
    fn log(&self, entry: &LogEntry);
}

/// Log entry containing all information about a log message
#[derive(Debug, Clone)]
pub struct LogEntry {
    /// Severity level
    pub severity: LogSeverity,

    /// Timestamp when the log was created
    pub timestamp: SystemTime,

    /// Source module (e.g., "wsi::Swapchain", "wsi::PresentWorker")
    pub source: String,

    /// Log message
    pub message: String,

    /// Source file (only for detailed ERROR logs)
    pub file: Option<&'static str>,

    /// Source line (only for detailed ERROR logs)
    pub line: Option<u32>,
}

/// Log severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogSeverity {
    /// Per-frame tracing (acquire/present traffic)
    Trace,

    /// Development/debugging information
    Debug,

    /// Object lifecycle events
    Info,

    /// Potential issues
    Warn,

    /// Errors, logged with file:line details
    Error,
}

impl LogSeverity {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LogSeverity::Trace => 0,
            LogSeverity::Debug => 1,
            LogSeverity::Info => 2,
            LogSeverity::Warn => 3,
            LogSeverity::Error => 4,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LogSeverity::Trace,
            1 => LogSeverity::Debug,
            2 => LogSeverity::Info,
            3 => LogSeverity::Warn,
            _ => LogSeverity::Error,
        }
    }
}

/// Default logger implementation using colored console output
///
/// Format:
/// - Normal: `[timestamp] [SEVERITY] [source] message`
/// - Error: `[timestamp] [ERROR] [source] message (file:line)`
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log(&self, entry: &LogEntry) {
        let datetime: DateTime<Local> = entry.timestamp.into();
        let timestamp = datetime.format("%Y-%m-%d %H:%M:%S%.3f").to_string();

        let severity_str = match entry.severity {
            LogSeverity::Trace => "TRACE".bright_black(),
            LogSeverity::Debug => "DEBUG".cyan(),
            LogSeverity::Info => "INFO ".green(),
            LogSeverity::Warn => "WARN ".yellow(),
            LogSeverity::Error => "ERROR".red().bold(),
        };

        let source = entry.source.bright_blue();

        // The layer shares stdout with the application; keep diagnostics on stderr
        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            eprintln!(
                "[{}] [{}] [{}] {} ({}:{})",
                timestamp,
                severity_str,
                source,
                entry.message,
                file,
                line
            );
        } else {
            eprintln!(
                "[{}] [{}] [{}] {}",
                timestamp,
                severity_str,
                source,
                entry.message
            );
        }
    }
}

// ===== LOGGING MACROS =====

/// Log a TRACE message (per-frame traffic, typically filtered out)
#[macro_export]
macro_rules! layer_trace {
    ($source:expr, $($arg:tt)*) => {
        $crate::wsi::Layer::log(
            $crate::wsi::log::LogSeverity::Trace,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a DEBUG message
#[macro_export]
macro_rules! layer_debug {
    ($source:expr, $($arg:tt)*) => {
        $crate::wsi::Layer::log(
            $crate::wsi::log::LogSeverity::Debug,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an INFO message
///
/// # Example
///
/// ```no_run
/// wsi_layer::layer_info!("wsi::Swapchain", "Created swapchain with {} images", 3);
/// ```
#[macro_export]
macro_rules! layer_info {
    ($source:expr, $($arg:tt)*) => {
        $crate::wsi::Layer::log(
            $crate::wsi::log::LogSeverity::Info,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log a WARN message
#[macro_export]
macro_rules! layer_warn {
    ($source:expr, $($arg:tt)*) => {
        $crate::wsi::Layer::log(
            $crate::wsi::log::LogSeverity::Warn,
            $source,
            format!($($arg)*)
        )
    };
}

/// Log an ERROR message with file:line information
#[macro_export]
macro_rules! layer_error {
    ($source:expr, $($arg:tt)*) => {
        $crate::wsi::Layer::log_detailed(
            $crate::wsi::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!()
        )
    };
}

/// Log an error and build an `Error::Platform` carrying the same message
///
/// # Example
///
/// ```no_run
/// let err = wsi_layer::layer_err!("wsi::Headless", "Buffer {} rejected", 2);
/// ```
#[macro_export]
macro_rules! layer_err {
    ($source:expr, $($arg:tt)*) => {{
        let message = format!($($arg)*);
        $crate::wsi::Layer::log_detailed(
            $crate::wsi::log::LogSeverity::Error,
            $source,
            message.clone(),
            file!(),
            line!()
        );
        $crate::wsi::Error::Platform(message)
    }};
}

/// Log an error and return early with `Err(Error::Platform(..))`
#[macro_export]
macro_rules! layer_bail {
    ($source:expr, $($arg:tt)*) => {
        return Err($crate::layer_err!($source, $($arg)*))
    };
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;

//! Logging for the renderer core.
//!
//! A `Logger` trait, severity levels, and a colored-console `DefaultLogger`.
//! The logger is held as a field on [`crate::engine::Engine`] rather than
//! behind a global `OnceLock` — engine state stays explicit per spec §9's
//! design notes.

use colored::*;
use std::time::SystemTime;
use chrono::{DateTime, Local};

/// Implement this trait to redirect engine log output (file, network, ...).
pub trait Logger: Send + Sync {
    fn log(&self, entry: &LogEntry);
}

/// A single log event.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub severity: LogSeverity,
    pub timestamp: SystemTime,
    /// Source module, e.g. "rendercore::Scene".
    pub source: String,
    pub message: String,
    /// Populated only for `Error`-severity entries.
    pub file: Option<&'static str>,
    pub line: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Colored console logger, the engine's default.
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

        if let (Some(file), Some(line)) = (entry.file, entry.line) {
            println!("[{timestamp}] [{severity_str}] [{source}] {} ({file}:{line})", entry.message);
        } else {
            println!("[{timestamp}] [{severity_str}] [{source}] {}", entry.message);
        }
    }
}

/// A logger that discards everything. Used by tests and headless tools.
pub struct NullLogger;

impl Logger for NullLogger {
    fn log(&self, _entry: &LogEntry) {}
}

/// Log a message at the given severity through `$engine`'s logger.
#[macro_export]
macro_rules! engine_log {
    ($engine:expr, $severity:expr, $source:expr, $($arg:tt)*) => {
        $engine.log($severity, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_trace {
    ($engine:expr, $source:expr, $($arg:tt)*) => {
        $engine.log($crate::log::LogSeverity::Trace, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_debug {
    ($engine:expr, $source:expr, $($arg:tt)*) => {
        $engine.log($crate::log::LogSeverity::Debug, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_info {
    ($engine:expr, $source:expr, $($arg:tt)*) => {
        $engine.log($crate::log::LogSeverity::Info, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_warn {
    ($engine:expr, $source:expr, $($arg:tt)*) => {
        $engine.log($crate::log::LogSeverity::Warn, $source, format!($($arg)*))
    };
}

#[macro_export]
macro_rules! engine_error {
    ($engine:expr, $source:expr, $($arg:tt)*) => {
        $engine.log_detailed(
            $crate::log::LogSeverity::Error,
            $source,
            format!($($arg)*),
            file!(),
            line!(),
        )
    };
}

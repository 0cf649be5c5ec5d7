//! Batch logging.
//!
//! Components never log through a global. They receive a [`BatchLog`]
//! created once at startup and emit [`LogEntry`] values carrying the
//! operation name and, where it applies, the row being processed.
//!
//! - [`TracingLog`] forwards entries to `tracing` (used by the binary)
//! - [`MemoryLog`] keeps entries in memory (tests, embedding)

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    /// Stage or gateway operation, e.g. `read`, `upsert`, `query`
    pub operation: String,
    pub message: String,
    /// Row identifier (user_id or source line) when the entry concerns one row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<String>,
}

impl LogEntry {
    fn new(level: LogLevel, operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            operation: operation.into(),
            message: message.into(),
            row: None,
        }
    }

    pub fn info(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, operation, message)
    }

    pub fn success(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Success, operation, message)
    }

    pub fn warning(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, operation, message)
    }

    pub fn error(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, operation, message)
    }

    pub fn with_row(mut self, row: impl Into<String>) -> Self {
        self.row = Some(row.into());
        self
    }
}

/// Sink for batch log entries.
pub trait BatchLog: Send + Sync {
    fn log(&self, entry: LogEntry);

    fn info(&self, operation: &str, message: String) {
        self.log(LogEntry::info(operation, message));
    }

    fn success(&self, operation: &str, message: String) {
        self.log(LogEntry::success(operation, message));
    }

    fn warning(&self, operation: &str, message: String) {
        self.log(LogEntry::warning(operation, message));
    }

    fn error(&self, operation: &str, message: String) {
        self.log(LogEntry::error(operation, message));
    }
}

/// Emits every entry as a `tracing` event with `operation` and `row` fields.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl BatchLog for TracingLog {
    fn log(&self, entry: LogEntry) {
        let operation = entry.operation.as_str();
        let row = entry.row.as_deref();
        match entry.level {
            LogLevel::Info => tracing::info!(operation, row, "{}", entry.message),
            LogLevel::Success => tracing::info!(operation, row, success = true, "{}", entry.message),
            LogLevel::Warning => tracing::warn!(operation, row, "{}", entry.message),
            LogLevel::Error => tracing::error!(operation, row, "{}", entry.message),
        }
    }
}

/// Collects entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Entries at the given level.
    pub fn at_level(&self, level: LogLevel) -> Vec<LogEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .collect()
    }
}

impl BatchLog for MemoryLog {
    fn log(&self, entry: LogEntry) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(entry),
            Err(poisoned) => poisoned.into_inner().push(entry),
        }
    }
}

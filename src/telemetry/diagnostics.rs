//! Diagnostics sink
//!
//! Rejected commands, invalid table input and forwarding drops are recorded
//! as diagnostics and the caller carries on. The sink is passed explicitly
//! to whatever produces diagnostics.

use chrono::{DateTime, Local};
use std::collections::VecDeque;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    InsertError,
    DeleteError,
    FindError,
    PolicyError,
    PolicyDrop,
    TtlExpired,
    CommandError,
    ConnectionError,
    SyntaxError,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Command or packet context that produced the diagnostic
    pub context: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Receiver of diagnostics
pub trait DiagnosticSink {
    fn record(&mut self, diagnostic: Diagnostic);
}

/// Sink that only forwards to the log
#[derive(Debug, Default)]
pub struct LogOnly;

impl DiagnosticSink for LogOnly {
    fn record(&mut self, diagnostic: Diagnostic) {
        warn!(
            kind = %diagnostic.kind,
            context = diagnostic.context.as_deref().unwrap_or(""),
            "{}",
            diagnostic.message
        );
    }
}

/// Timestamped diagnostic
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub diagnostic: Diagnostic,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.diagnostic.kind,
            self.diagnostic.message
        )?;
        if let Some(ref context) = self.diagnostic.context {
            write!(f, " | Command: {}", context)?;
        }
        Ok(())
    }
}

/// In-memory FIFO of diagnostics, also mirrored to the log
#[derive(Debug, Default)]
pub struct ErrorLog {
    entries: VecDeque<LogEntry>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Oldest entries first, at most `limit` of them
    pub fn entries(&self, limit: Option<usize>) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().take(limit.unwrap_or(usize::MAX))
    }

    /// Count entries of one kind
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries
            .iter()
            .filter(|e| e.diagnostic.kind == kind)
            .count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl DiagnosticSink for ErrorLog {
    fn record(&mut self, diagnostic: Diagnostic) {
        LogOnly.record(diagnostic.clone());
        self.entries.push_back(LogEntry {
            timestamp: Local::now(),
            diagnostic,
        });
    }
}

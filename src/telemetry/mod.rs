//! Telemetry module for logging, diagnostics and statistics.
//!
//! Provides:
//! - Logging configuration and initialization
//! - The diagnostics sink and its in-memory error log
//! - Packet statistics for the simulation

mod diagnostics;
mod logging;
mod metrics;

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSink, ErrorLog, LogEntry, LogOnly};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{Counter, Statistics};

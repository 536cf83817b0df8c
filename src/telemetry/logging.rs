//! Logging setup
//!
//! `RUST_LOG` overrides the level from the `[logging]` section of the
//! topology file. Output goes through `tracing-subscriber` in one of three
//! formats.

use serde::{Deserialize, Serialize};
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// `[logging]` section of a topology file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// error, warn, info, debug or trace
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Configured level. Unknown names fall back to info.
    pub fn level(&self) -> Level {
        self.level.trim().parse().unwrap_or(Level::INFO)
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level().as_str()))
    }
}

/// Install the global subscriber.
///
/// Fails when a subscriber is already installed.
pub fn init_logging(config: Option<&LogConfig>) -> Result<(), TryInitError> {
    let config = config.cloned().unwrap_or_default();
    let registry = tracing_subscriber::registry().with(config.filter());

    match config.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init(),
        LogFormat::Compact => registry
            .with(tracing_subscriber::fmt::layer().compact().with_target(false))
            .try_init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_level(level: &str) -> LogConfig {
        LogConfig {
            level: level.to_string(),
            ..LogConfig::default()
        }
    }

    #[test]
    fn test_level() {
        assert_eq!(with_level("error").level(), Level::ERROR);
        assert_eq!(with_level("WARN").level(), Level::WARN);
        assert_eq!(with_level(" debug ").level(), Level::DEBUG);
        assert_eq!(with_level("trace").level(), Level::TRACE);
        assert_eq!(with_level("verbose").level(), Level::INFO);
    }

    #[test]
    fn test_partial_section() {
        let config: LogConfig = toml::from_str("level = \"debug\"").unwrap();
        assert_eq!(config.level(), Level::DEBUG);
        assert_eq!(config.format, LogFormat::Pretty);

        let config: LogConfig = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(config.level, "info");
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(toml::from_str::<LogConfig>("format = \"fancy\"").is_err());
    }

    #[test]
    fn test_second_init_fails() {
        let config = with_level("warn");
        // Another test may already have installed one
        let _ = init_logging(Some(&config));
        assert!(init_logging(Some(&config)).is_err());
    }
}

//! Structured logging configuration.

use std::path::PathBuf;

use crate::config::LoggingSettings;

/// Default filter directive.
const DEFAULT_FILTER: &str = "ticketcleaner=info";

/// Filter directive used with `--verbose`.
const VERBOSE_FILTER: &str = "ticketcleaner=debug";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to [`LogFormat::Pretty`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Log file; stderr when `None`.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings.
    ///
    /// `RUST_LOG` wins over the configured filter, `verbose` wins over both.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        Self::resolve(settings, verbose, std::env::var("RUST_LOG").ok())
    }

    fn resolve(settings: Option<&LoggingSettings>, verbose: bool, rust_log: Option<String>) -> Self {
        let format = settings
            .and_then(|s| s.format.as_deref())
            .map(LogFormat::parse)
            .unwrap_or_default();
        let file = settings.and_then(|s| s.file.clone());

        let filter = if verbose {
            VERBOSE_FILTER.to_string()
        } else {
            rust_log
                .filter(|v| !v.trim().is_empty())
                .or_else(|| settings.and_then(|s| s.filter.clone()))
                .unwrap_or_else(|| DEFAULT_FILTER.to_string())
        };

        Self {
            format,
            filter,
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::resolve(None, false, None);
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_filter_priority() {
        let settings = LoggingSettings {
            format: Some("JSON".to_string()),
            file: None,
            filter: Some("ticketcleaner=warn".to_string()),
        };

        let config = LoggingConfig::resolve(Some(&settings), false, None);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "ticketcleaner=warn");

        let config = LoggingConfig::resolve(Some(&settings), false, Some("trace".to_string()));
        assert_eq!(config.filter, "trace");

        let config = LoggingConfig::resolve(Some(&settings), true, Some("trace".to_string()));
        assert_eq!(config.filter, VERBOSE_FILTER);
    }

    #[test]
    fn test_unknown_format_is_pretty() {
        assert_eq!(LogFormat::parse("xml"), LogFormat::Pretty);
    }
}

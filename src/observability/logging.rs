//! Structured logging configuration.

use crate::config::{LoggingSettings, parse_string_env};
use std::path::PathBuf;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "SAMPLECONV_LOG";

const DEFAULT_LEVEL: &str = "info";
const VERBOSE_LEVEL: &str = "sampleconv=debug,info";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" | "human" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(crate::Error::InvalidInput(format!(
                "unknown log format '{other}' (expected pretty or json)"
            ))),
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Event filter.
    pub filter: EnvFilter,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    ///
    /// The filter is taken from `SAMPLECONV_LOG`, then `RUST_LOG`, then
    /// `--verbose`, then the config file, then `info`. The format can be
    /// overridden with `SAMPLECONV_LOG_FORMAT`.
    #[must_use]
    pub fn from_settings(settings: Option<&LoggingSettings>, verbose: bool) -> Self {
        let format = parse_string_env("SAMPLECONV_LOG_FORMAT")
            .or_else(|| settings.and_then(|s| s.format.clone()))
            .and_then(|value| match value.parse::<LogFormat>() {
                Ok(format) => Some(format),
                Err(e) => {
                    tracing::warn!(error = %e, "Falling back to pretty logs");
                    None
                },
            })
            .unwrap_or_default();

        let directive = parse_string_env(LOG_ENV)
            .or_else(|| parse_string_env("RUST_LOG"))
            .or_else(|| verbose.then(|| VERBOSE_LEVEL.to_string()))
            .or_else(|| settings.and_then(|s| s.level.clone()))
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let filter =
            EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

        let file = parse_string_env("SAMPLECONV_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.and_then(|s| s.file.clone()));

        Self {
            format,
            filter,
            file,
        }
    }
}

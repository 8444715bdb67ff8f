//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, a TOML
//! file, `SAMPLECONV_*` environment variables, and command-line flags (applied
//! by the binary).
//!
//! ```toml
//! [export]
//! batch_size = 256
//! template = "datapoint_{index:04}.sample"
//!
//! [import]
//! pattern = "*.sample"
//! missing_field = "zero-fill"
//!
//! [store]
//! initial_capacity = 64
//! growth_factor = 2.0
//!
//! [logging]
//! format = "json"
//! level = "sampleconv=debug"
//!
//! [metrics]
//! enabled = true
//! push_gateway = { endpoint = "http://localhost:9091/metrics/job/sampleconv" }
//! ```

use crate::io::{ExportOptions, ImportOptions, MissingFieldPolicy};
use crate::storage::{GrowthPolicy, NamingTemplate};
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "SAMPLECONV_CONFIG_PATH";

const APP_DIR: &str = "sampleconv";
const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration for sampleconv.
#[derive(Debug, Clone, Default)]
pub struct SampleconvConfig {
    /// Defaults for store export.
    pub export: ExportOptions,
    /// Defaults for archive import.
    pub import: ImportOptions,
    /// Logging and metrics settings, resolved by [`crate::observability`].
    pub observability: ObservabilitySettings,
    /// File the configuration was loaded from, if any.
    pub source: Option<PathBuf>,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Export section.
    pub export: Option<ConfigFileExport>,
    /// Import section.
    pub import: Option<ConfigFileImport>,
    /// Store section.
    pub store: Option<ConfigFileStore>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Export section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileExport {
    /// Rows read per batch.
    pub batch_size: Option<usize>,
    /// Archive naming template.
    pub template: Option<String>,
    /// First archive index.
    pub start_index: Option<u64>,
    /// Replace existing archives.
    pub allow_overwrite: Option<bool>,
}

/// Import section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileImport {
    /// Archive file name glob.
    pub pattern: Option<String>,
    /// Scan subdirectories.
    pub recursive: Option<bool>,
    /// `reject`, `abort`, or `zero-fill`.
    pub missing_field: Option<String>,
    /// Replace an existing destination group.
    pub allow_overwrite: Option<bool>,
}

/// Store section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStore {
    /// Rows reserved on first growth.
    pub initial_capacity: Option<usize>,
    /// Capacity multiplier.
    pub growth_factor: Option<f64>,
}

/// Observability settings from the config file.
#[derive(Debug, Clone, Default)]
pub struct ObservabilitySettings {
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Metrics section.
    pub metrics: Option<MetricsSettings>,
}

/// Logging section in config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `info` or `sampleconv=debug`.
    pub level: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Metrics section in config file.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsSettings {
    /// Install the Prometheus recorder.
    pub enabled: Option<bool>,
    /// Push metrics here when the run ends.
    pub push_gateway: Option<MetricsPushGatewaySettings>,
}

/// Push gateway settings.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsPushGatewaySettings {
    /// Endpoint URI, including the job path.
    pub endpoint: Option<String>,
    /// Basic auth username.
    pub username: Option<String>,
    /// Basic auth password.
    pub password: Option<String>,
    /// Use POST instead of PUT.
    pub use_http_post: Option<bool>,
}

impl SampleconvConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves configuration for a run.
    ///
    /// An explicit `path` (or `SAMPLECONV_CONFIG_PATH`) must load cleanly.
    /// Without one, the default location is tried and silently skipped if
    /// absent or broken. Environment overrides are applied last.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be loaded.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| parse_string_env(CONFIG_PATH_ENV).map(PathBuf::from));
        let mut config = match explicit {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::load_default(),
        };
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::op("read_config_file", format!("{}: {e}", path.display())))?;

        let file: ConfigFile = toml::from_str(&contents)
            .map_err(|e| Error::op("parse_config_file", format!("{}: {e}", path.display())))?;

        let mut config = Self::from_config_file(file)?;
        config.source = Some(path.to_path_buf());
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Loads configuration from the platform config directory.
    ///
    /// Checks `<config_dir>/sampleconv/config.toml` (e.g. `~/.config` on
    /// Linux, `~/Library/Application Support` on macOS). Returns defaults if no
    /// usable file is found.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from_file(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unusable config file");
                Self::default()
            },
        }
    }

    /// Default config file location for this platform.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Converts a `ConfigFile` to `SampleconvConfig`.
    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(export) = file.export {
            if let Some(batch_size) = export.batch_size {
                config.export.batch_size = batch_size;
            }
            if let Some(template) = export.template {
                config.export.template = template.parse::<NamingTemplate>()?;
            }
            if let Some(start_index) = export.start_index {
                config.export.start_index = start_index;
            }
            if let Some(v) = export.allow_overwrite {
                config.export.allow_overwrite = v;
            }
        }
        if let Some(import) = file.import {
            if let Some(pattern) = import.pattern {
                config.import.pattern = pattern;
            }
            if let Some(v) = import.recursive {
                config.import.recursive = v;
            }
            if let Some(policy) = import.missing_field {
                config.import.missing_field = policy.parse::<MissingFieldPolicy>()?;
            }
            if let Some(v) = import.allow_overwrite {
                config.import.allow_overwrite = v;
            }
        }
        if let Some(store) = file.store {
            config.import.growth = growth_from_settings(&store)?;
        }
        config.observability = ObservabilitySettings {
            logging: file.logging,
            metrics: file.metrics,
        };

        if config.export.batch_size == 0 {
            return Err(Error::InvalidInput(
                "export.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    /// Applies `SAMPLECONV_*` environment overrides.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = parse_string_env("SAMPLECONV_BATCH_SIZE") {
            self.export.batch_size = value
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| {
                    Error::InvalidInput(format!("SAMPLECONV_BATCH_SIZE must be a positive integer, got '{value}'"))
                })?;
        }
        if let Some(value) = parse_string_env("SAMPLECONV_TEMPLATE") {
            self.export.template = value.parse()?;
        }
        if let Some(value) = parse_string_env("SAMPLECONV_MISSING_FIELD") {
            self.import.missing_field = value.parse()?;
        }
        Ok(())
    }

    /// Sets the export batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.export.batch_size = batch_size;
        self
    }
}

fn growth_from_settings(store: &ConfigFileStore) -> Result<GrowthPolicy> {
    let mut growth = GrowthPolicy::default();
    if let Some(initial) = store.initial_capacity {
        growth.initial_capacity = initial.max(1);
    }
    if let Some(factor) = store.growth_factor {
        if !(factor.is_finite() && factor > 1.0) {
            return Err(Error::InvalidInput(format!(
                "store.growth_factor must be greater than 1.0, got {factor}"
            )));
        }
        growth.factor = factor;
    }
    Ok(growth)
}

/// Reads a trimmed, non-empty environment variable.
pub(crate) fn parse_string_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads a boolean environment variable (`true`, `1`, `yes`).
pub(crate) fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        let value = value.to_lowercase();
        value == "true" || value == "1" || value == "yes"
    })
}

//! Archive file naming templates.
//!
//! A template is a pattern with exactly one placeholder:
//!
//! | Placeholder | Renders as |
//! |-------------|------------|
//! | `{index}` | The index with no padding |
//! | `{index:04}` | The index zero-padded to 4 digits |
//! | `{timestamp}` | Local time as `%Y-%m-%d_%H-%M-%S` |
//!
//! Text after the placeholder may end in `.ext` to choose the file
//! extension; otherwise [`ARCHIVE_EXTENSION`] is used.

use crate::{Error, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default archive file extension.
pub const ARCHIVE_EXTENSION: &str = "sample";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// How the numeric part of a file name is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// Running index, zero-padded to `digits` (0 means no padding).
    Index {
        /// Minimum number of digits.
        digits: usize,
    },
    /// Wall-clock timestamp, for streaming capture.
    Timestamp,
}

/// File naming template for archives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingTemplate {
    prefix: String,
    suffix: String,
    extension: String,
    mode: NamingMode,
}

impl Default for NamingTemplate {
    fn default() -> Self {
        Self::indexed("datapoint_", 4)
    }
}

impl NamingTemplate {
    /// Creates a zero-padded index template: `{prefix}{index:0digits}.sample`.
    #[must_use]
    pub fn indexed(prefix: impl Into<String>, digits: usize) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: String::new(),
            extension: ARCHIVE_EXTENSION.to_string(),
            mode: NamingMode::Index { digits },
        }
    }

    /// Creates a timestamp template: `{prefix}{timestamp}.sample`.
    #[must_use]
    pub fn timestamped(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: String::new(),
            extension: ARCHIVE_EXTENSION.to_string(),
            mode: NamingMode::Timestamp,
        }
    }

    /// Replaces the file extension.
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Naming mode.
    #[must_use]
    pub const fn mode(&self) -> NamingMode {
        self.mode
    }

    /// File extension without the dot.
    #[must_use]
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// A `*`-glob matching every name this template can produce.
    #[must_use]
    pub fn glob(&self) -> String {
        format!("{}*{}.{}", self.prefix, self.suffix, self.extension)
    }

    /// Renders the file name for `index`.
    ///
    /// Timestamp templates ignore the index and use the current local time.
    #[must_use]
    pub fn file_name(&self, index: u64) -> String {
        match self.mode {
            NamingMode::Index { digits } => format!(
                "{}{index:0digits$}{}.{}",
                self.prefix, self.suffix, self.extension
            ),
            NamingMode::Timestamp => self.file_name_at(&Local::now()),
        }
    }

    /// Renders a timestamp file name for a given instant.
    #[must_use]
    pub fn file_name_at(&self, when: &DateTime<Local>) -> String {
        format!(
            "{}{}{}.{}",
            self.prefix,
            when.format(TIMESTAMP_FORMAT),
            self.suffix,
            self.extension
        )
    }

    /// Resolves the path of archive `index` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for timestamp templates, which cannot
    /// address an archive by index.
    pub fn resolve(&self, dir: &Path, index: u64) -> Result<PathBuf> {
        self.require_indexed()?;
        Ok(dir.join(self.file_name(index)))
    }

    /// Checks that names are derived from the index.
    ///
    /// Timestamp names repeat within the same second, so any writer that
    /// promises one file per sample needs an indexed template.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for timestamp templates.
    pub fn require_indexed(&self) -> Result<()> {
        match self.mode {
            NamingMode::Index { .. } => Ok(()),
            NamingMode::Timestamp => Err(Error::InvalidInput(format!(
                "template '{self}' is timestamp-based; an indexed template such as \
                 'datapoint_{{index:04}}' is required"
            ))),
        }
    }
}

impl FromStr for NamingTemplate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let open = s
            .find('{')
            .ok_or_else(|| Error::InvalidInput(format!("template '{s}' has no placeholder")))?;
        let close = s[open..]
            .find('}')
            .map(|pos| open + pos)
            .ok_or_else(|| Error::InvalidInput(format!("template '{s}' has an unclosed '{{'")))?;

        let prefix = &s[..open];
        let placeholder = &s[open + 1..close];
        let rest = &s[close + 1..];
        if rest.contains('{') || prefix.contains('}') {
            return Err(Error::InvalidInput(format!(
                "template '{s}' must contain exactly one placeholder"
            )));
        }

        let mode = match placeholder.split_once(':') {
            None if placeholder == "index" => NamingMode::Index { digits: 0 },
            None if placeholder == "timestamp" => NamingMode::Timestamp,
            Some(("index", width)) => {
                let digits = width.parse::<usize>().map_err(|_| {
                    Error::InvalidInput(format!("template '{s}' has invalid width '{width}'"))
                })?;
                NamingMode::Index { digits }
            },
            _ => {
                return Err(Error::InvalidInput(format!(
                    "unknown placeholder '{{{placeholder}}}' in template '{s}'"
                )));
            },
        };

        let (suffix, extension) = match rest.rsplit_once('.') {
            Some((suffix, ext)) if !ext.is_empty() => (suffix, ext),
            _ => (rest, ARCHIVE_EXTENSION),
        };

        Ok(Self {
            prefix: prefix.to_string(),
            suffix: suffix.to_string(),
            extension: extension.to_string(),
            mode,
        })
    }
}

impl fmt::Display for NamingTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let placeholder = match self.mode {
            NamingMode::Index { digits: 0 } => "{index}".to_string(),
            NamingMode::Index { digits } => format!("{{index:0{digits}}}"),
            NamingMode::Timestamp => "{timestamp}".to_string(),
        };
        write!(
            f,
            "{}{placeholder}{}.{}",
            self.prefix, self.suffix, self.extension
        )
    }
}

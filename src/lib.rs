//! # Sampleconv
//!
//! Converts sample-structured datasets between two on-disk representations.
//!
//! A **columnar store** keeps one equal-length array per named field, all
//! fields sharing a sample axis that can grow. An **archive directory** keeps
//! one self-contained file per sample. Sampleconv moves data between the two
//! and extracts index-defined subsets from either of them.
//!
//! ## Features
//!
//! - Batched store export with bounded peak memory
//! - Schema-inferring archive import with explicit missing-field policies
//! - Gather-style subset extraction for stores and archive sets
//! - Geometric capacity growth for row-at-a-time appends
//!
//! ## Example
//!
//! ```rust,ignore
//! use sampleconv::io::{Conversion, ExportOptions, StoreToArchives};
//!
//! let export = StoreToArchives::new("dataset", "data", "archives", ExportOptions::default())?;
//! let report = export.run()?;
//! println!("wrote {} archives", report.exported);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::SampleconvConfig;
pub use io::{
    ArchiveSubsetExtractor, ArchivesToStore, Conversion, StoreSubsetExtractor, StoreToArchives,
};
pub use models::{ArrayValue, DType, FieldSpec, RowBatch, Sample, Scalar, StoreSchema};
pub use storage::{ArchiveCodec, ArchiveScanner, ArchiveWriter, ColumnarStore, NamingTemplate};

/// Error type for sampleconv operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `Schema` | Unequal field lengths, unusable pivot, wrong field set on append |
/// | `ExistingFile` | Destination exists and overwriting is disallowed |
/// | `IndexOutOfRange` | A store subset index points past the last row |
/// | `NotSupported` | The table export path is invoked |
/// | `InvalidArchive` | An archive file is truncated or malformed |
/// | `InvalidInput` | Bad options: zero batch size, malformed template, empty source |
/// | `OperationFailed` | Filesystem I/O or serialization failures |
#[derive(Debug, ThisError)]
pub enum Error {
    /// The structure of a store or sample is inconsistent.
    ///
    /// Raised when:
    /// - Fields of one store group have different lengths
    /// - The pivot archive cannot define a schema
    /// - A row handed to a store does not carry exactly the schema fields
    /// - A field value has the wrong dtype or per-sample shape
    #[error("schema error: {0}")]
    Schema(String),

    /// A destination already exists and overwriting was not allowed.
    ///
    /// The existing file is left untouched.
    #[error("destination already exists: {}", path.display())]
    ExistingFile {
        /// The conflicting path.
        path: PathBuf,
    },

    /// A subset index does not address a row of the source store.
    #[error("index {index} out of range for store of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Number of rows in the source store.
        len: usize,
    },

    /// The requested path is deliberately unimplemented.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// An archive file could not be decoded.
    #[error("invalid archive {}: {reason}", path.display())]
    InvalidArchive {
        /// The archive path.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Builds an `OperationFailed` error from an operation name and any displayable cause.
    pub fn op(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for sampleconv operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Schema("field 'b' has 3 rows, expected 4".to_string());
        assert_eq!(err.to_string(), "schema error: field 'b' has 3 rows, expected 4");

        let err = Error::ExistingFile {
            path: PathBuf::from("/tmp/x.sample"),
        };
        assert_eq!(err.to_string(), "destination already exists: /tmp/x.sample");

        let err = Error::IndexOutOfRange { index: 7, len: 5 };
        assert_eq!(err.to_string(), "index 7 out of range for store of length 5");

        let err = Error::op("read_manifest", "permission denied");
        assert_eq!(
            err.to_string(),
            "operation 'read_manifest' failed: permission denied"
        );
    }
}

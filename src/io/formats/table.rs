//! Per-field table export.
//!
//! The table layout (one columnar file per field next to the archive
//! directory) is reserved but has no writer. The exporter fails loudly
//! rather than producing an empty output.

use crate::io::Conversion;
use crate::{Error, Result};
use std::path::PathBuf;

/// Exports an archive directory to per-field tables. Always unsupported.
#[derive(Debug, Clone)]
pub struct TableExporter {
    archive_dir: PathBuf,
    table_dir: PathBuf,
}

impl TableExporter {
    /// Creates an exporter.
    #[must_use]
    pub fn new(archive_dir: impl Into<PathBuf>, table_dir: impl Into<PathBuf>) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            table_dir: table_dir.into(),
        }
    }
}

impl Conversion for TableExporter {
    type Report = ();

    fn run(self) -> Result<()> {
        tracing::debug!(
            archives = %self.archive_dir.display(),
            out = %self.table_dir.display(),
            "Table export requested"
        );
        Err(Error::NotSupported(
            "exporting archives to per-field tables is not implemented".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_table_export_is_not_supported() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("tables");
        let err = TableExporter::new(dir.path(), &out).run().unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
        assert!(!out.exists());
    }
}

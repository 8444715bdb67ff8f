//! Dataset representations known to the converter.

pub mod table;

use crate::storage::{ARCHIVE_EXTENSION, STORE_MANIFEST};
use crate::{Error, Result};
use std::path::Path;

pub use table::TableExporter;

/// On-disk dataset representations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// Columnar store directory (one group per dataset).
    Store,
    /// Directory of single-sample archives.
    Archive,
}

impl Format {
    /// Detects the format of a dataset directory.
    ///
    /// A directory holding a group manifest is a store; a directory holding
    /// archive files is an archive set. Stores win when both are present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the path is not a directory or its
    /// contents are not recognized.
    pub fn detect(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(Error::InvalidInput(format!(
                "{} is not a directory",
                path.display()
            )));
        }
        let entries = std::fs::read_dir(path)
            .map_err(|e| Error::op("detect_format", format!("{}: {e}", path.display())))?;
        let mut archives = false;
        for entry in entries {
            let entry_path = match entry {
                Ok(entry) => entry.path(),
                Err(e) => {
                    tracing::warn!(dir = %path.display(), error = %e, "Skipping unreadable directory entry");
                    continue;
                },
            };
            if entry_path.join(STORE_MANIFEST).is_file() {
                return Ok(Self::Store);
            }
            archives |= entry_path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == ARCHIVE_EXTENSION);
        }
        if archives {
            Ok(Self::Archive)
        } else {
            Err(Error::InvalidInput(format!(
                "{} holds neither store groups nor .{ARCHIVE_EXTENSION} archives",
                path.display()
            )))
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store => write!(f, "store"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ArrayValue, Sample};
    use crate::storage::{ArchiveCodec, ColumnarStore};
    use crate::StoreSchema;
    use tempfile::TempDir;

    #[test]
    fn test_detect() {
        let dir = TempDir::new().unwrap();
        let sample = Sample::new().with_field("v", ArrayValue::scalar(1u8));

        let archives = dir.path().join("archives");
        ArchiveCodec::save(&archives.join("a.sample"), &sample, false).unwrap();
        assert_eq!(Format::detect(&archives).unwrap(), Format::Archive);

        let store = dir.path().join("store");
        let schema = StoreSchema::from_pivot(&sample).unwrap();
        ColumnarStore::create_write(&store, "data", &schema, false)
            .unwrap()
            .close()
            .unwrap();
        assert_eq!(Format::detect(&store).unwrap(), Format::Store);

        assert!(Format::detect(&dir.path().join("missing")).is_err());
        assert_eq!(Format::Store.to_string(), "store");
    }

    #[test]
    fn test_detect_rejects_unrelated_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
        let err = Format::detect(dir.path()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

//! Schema-inferring archives-to-store import.
//!
//! The first archive in sorted order is the pivot: its fields define the
//! store schema. Every archive, the pivot included, is then validated
//! against that schema and appended row by row.

use super::ProgressCallback;
use crate::io::Conversion;
use crate::io::validation::{
    Diagnostic, DiagnosticKind, DiagnosticReport, ImportValidator, MissingFieldPolicy,
};
use crate::models::StoreSchema;
use crate::storage::{ARCHIVE_EXTENSION, ArchiveCodec, ArchiveScanner, ColumnarStore, GrowthPolicy};
use crate::{Error, Result};
use std::path::PathBuf;

/// Options for archive import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// `*`-glob matched against archive file names.
    pub pattern: String,
    /// Descend into subdirectories.
    pub recursive: bool,
    /// Handling of archives that lack a schema field.
    pub missing_field: MissingFieldPolicy,
    /// Replace the destination group if it exists.
    pub allow_overwrite: bool,
    /// Append to the destination group if it exists, validating against its schema.
    pub append: bool,
    /// Capacity growth of the destination store.
    pub growth: GrowthPolicy,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            pattern: format!("*.{ARCHIVE_EXTENSION}"),
            recursive: false,
            missing_field: MissingFieldPolicy::default(),
            allow_overwrite: false,
            append: false,
            growth: GrowthPolicy::default(),
        }
    }
}

impl ImportOptions {
    /// Sets the file name pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }

    /// Enables or disables recursive scanning.
    #[must_use]
    pub const fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Sets the missing-field policy.
    #[must_use]
    pub const fn with_missing_field(mut self, policy: MissingFieldPolicy) -> Self {
        self.missing_field = policy;
        self
    }

    /// Enables or disables overwriting the destination group.
    #[must_use]
    pub const fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Enables or disables appending to an existing group.
    #[must_use]
    pub const fn with_append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }

    /// Sets the store growth policy.
    #[must_use]
    pub const fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }
}

/// Progress information during import.
#[derive(Debug, Clone, Default)]
pub struct ImportProgress {
    /// Archives processed so far.
    pub processed: usize,
    /// Archives appended to the store.
    pub imported: usize,
    /// Archives skipped.
    pub rejected: usize,
    /// Total archives matched.
    pub total_estimate: Option<usize>,
}

impl ImportProgress {
    /// Returns the percentage complete (0-100) if the total is known.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent_complete(&self) -> Option<f32> {
        self.total_estimate.map(|total| {
            if total == 0 {
                100.0
            } else {
                (self.processed as f32 / total as f32) * 100.0
            }
        })
    }
}

/// Result of an import run.
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    /// Archives appended to the store.
    pub imported: usize,
    /// Archives skipped because of missing fields, shape mismatches, or read errors.
    pub rejected: usize,
    /// Archives looked at.
    pub total_processed: usize,
    /// Row count of the destination group after the run.
    pub store_len: usize,
    /// Issues found along the way.
    pub diagnostics: DiagnosticReport,
}

impl ImportReport {
    /// Returns whether any archives were imported.
    #[must_use]
    pub const fn has_imports(&self) -> bool {
        self.imported > 0
    }

    /// Returns whether any diagnostics were recorded.
    #[must_use]
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Imports a directory of archives into a new store group.
pub struct ArchivesToStore {
    archive_dir: PathBuf,
    store_path: PathBuf,
    group: String,
    options: ImportOptions,
    progress: Option<ProgressCallback<ImportProgress>>,
}

impl ArchivesToStore {
    /// Creates an import of `archive_dir` into `store_path`/`group`.
    #[must_use]
    pub fn new(
        archive_dir: impl Into<PathBuf>,
        store_path: impl Into<PathBuf>,
        group: impl Into<String>,
        options: ImportOptions,
    ) -> Self {
        Self {
            archive_dir: archive_dir.into(),
            store_path: store_path.into(),
            group: group.into(),
            options,
            progress: None,
        }
    }

    /// Sets a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback<ImportProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    fn import_rows(
        &self,
        store: &mut ColumnarStore,
        scanner: ArchiveScanner,
        schema: &StoreSchema,
    ) -> Result<ImportReport> {
        let abort = self.options.missing_field == MissingFieldPolicy::Abort;
        let validator = ImportValidator::new(schema, self.options.missing_field);
        let mut report = ImportReport::default();
        let mut progress = ImportProgress {
            total_estimate: Some(scanner.len()),
            ..Default::default()
        };

        for (path, loaded) in scanner {
            report.total_processed += 1;
            progress.processed += 1;
            let subject = path.display().to_string();

            let accepted = match loaded {
                Ok(sample) => {
                    let validation = validator.validate(&subject, sample);
                    report.diagnostics.extend(validation.issues);
                    match validation.row {
                        Some(row) => {
                            store.append(&row)?;
                            true
                        },
                        None if abort => {
                            return Err(Error::Schema(format!(
                                "{subject} does not match the store schema"
                            )));
                        },
                        None => false,
                    }
                },
                Err(e) => {
                    report.diagnostics.push(Diagnostic::new(
                        DiagnosticKind::Unreadable,
                        &subject,
                        e.to_string(),
                    ));
                    if abort {
                        return Err(e);
                    }
                    false
                },
            };

            if accepted {
                report.imported += 1;
                progress.imported += 1;
            } else {
                report.rejected += 1;
                progress.rejected += 1;
            }
            if let Some(ref cb) = self.progress {
                cb(&progress);
            }
        }

        Ok(report)
    }
}

impl Conversion for ArchivesToStore {
    type Report = ImportReport;

    fn run(self) -> Result<ImportReport> {
        if self.options.append && self.options.allow_overwrite {
            return Err(Error::InvalidInput(
                "append and overwrite cannot be combined".to_string(),
            ));
        }
        let scanner = ArchiveScanner::new(
            &self.archive_dir,
            &self.options.pattern,
            self.options.recursive,
        )?;
        let Some(pivot_path) = scanner.paths().first().cloned() else {
            return Err(Error::InvalidInput(format!(
                "no archives matching '{}' in {}",
                self.options.pattern,
                self.archive_dir.display()
            )));
        };

        let existing = self.store_path.join(&self.group);
        let mut store = if self.options.append && existing.is_dir() {
            let store = ColumnarStore::open_append(&self.store_path, &self.group)?;
            tracing::info!(
                archives = scanner.len(),
                group = %existing.display(),
                rows = store.len(),
                policy = %self.options.missing_field,
                "Appending archives to existing store"
            );
            store
        } else {
            let pivot = ArchiveCodec::load(&pivot_path).map_err(|e| {
                Error::Schema(format!(
                    "pivot archive {} cannot define a schema: {e}",
                    pivot_path.display()
                ))
            })?;
            let schema = StoreSchema::from_pivot(&pivot)?;
            tracing::info!(
                archives = scanner.len(),
                pivot = %pivot_path.display(),
                fields = schema.len(),
                policy = %self.options.missing_field,
                "Importing archives into store"
            );
            ColumnarStore::create_write(
                &self.store_path,
                &self.group,
                &schema,
                self.options.allow_overwrite,
            )?
        }
        .with_growth(self.options.growth);
        let schema = store.schema().clone();

        let outcome = self.import_rows(&mut store, scanner, &schema);
        let store_len = store.len();
        let closed = store.close();
        let mut report = outcome?;
        closed?;
        report.store_len = store_len;

        tracing::info!(
            imported = report.imported,
            rejected = report.rejected,
            diagnostics = report.diagnostics.len(),
            "Import complete"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_overwrite_conflict() {
        let dir = tempfile::TempDir::new().unwrap();
        let options = ImportOptions::default()
            .with_append(true)
            .with_overwrite(true);
        let err = ArchivesToStore::new(dir.path(), dir.path(), "data", options)
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_import_options_defaults() {
        let options = ImportOptions::default();
        assert_eq!(options.pattern, "*.sample");
        assert!(!options.recursive);
        assert_eq!(options.missing_field, MissingFieldPolicy::Reject);
        assert!(!options.allow_overwrite);
        assert!(!options.append);
    }

    #[test]
    fn test_import_progress_percent() {
        let progress = ImportProgress {
            processed: 50,
            total_estimate: Some(100),
            ..Default::default()
        };
        assert_eq!(progress.percent_complete(), Some(50.0));

        let unknown = ImportProgress::default();
        assert!(unknown.percent_complete().is_none());
    }

    #[test]
    fn test_import_report_has_imports() {
        let mut report = ImportReport::default();
        assert!(!report.has_imports());
        report.imported = 1;
        assert!(report.has_imports());
    }

    #[test]
    fn test_empty_directory_is_invalid_input() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = ArchivesToStore::new(dir.path(), dir.path().join("store"), "data", ImportOptions::default())
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(!dir.path().join("store").exists());
    }
}

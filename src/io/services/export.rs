//! Batched store-to-archives export.
//!
//! Reads a store group in contiguous batches and writes one archive per row.
//! Only one batch is held in memory at a time.

use super::ProgressCallback;
use crate::io::Conversion;
use crate::storage::{ArchiveWriter, ColumnarStore, NamingTemplate};
use crate::{Error, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Default number of rows read per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Options for store export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Rows read from the store per batch.
    pub batch_size: usize,
    /// File naming template for archives.
    pub template: NamingTemplate,
    /// Replace archives that already exist.
    pub allow_overwrite: bool,
    /// Index of the first archive written.
    pub start_index: u64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            template: NamingTemplate::default(),
            allow_overwrite: false,
            start_index: 0,
        }
    }
}

impl ExportOptions {
    /// Sets the batch size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the naming template.
    #[must_use]
    pub fn with_template(mut self, template: NamingTemplate) -> Self {
        self.template = template;
        self
    }

    /// Enables or disables overwriting existing archives.
    #[must_use]
    pub const fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Sets the index of the first archive.
    #[must_use]
    pub const fn with_start_index(mut self, start_index: u64) -> Self {
        self.start_index = start_index;
        self
    }
}

/// Progress information during export.
#[derive(Debug, Clone, Default)]
pub struct ExportProgress {
    /// Rows exported so far.
    pub exported: usize,
    /// Rows in the source group.
    pub total: usize,
    /// Zero-based batch currently being written.
    pub batch: usize,
}

/// Result of an export run.
#[derive(Debug, Clone, Default)]
pub struct ExportReport {
    /// Number of archives written.
    pub exported: usize,
    /// Number of batches read.
    pub batches: usize,
    /// Row count of each batch, in order.
    pub batch_sizes: Vec<usize>,
    /// Path of the last archive written.
    pub last_path: Option<PathBuf>,
}

impl ExportReport {
    /// Returns whether any archives were written.
    #[must_use]
    pub const fn has_exports(&self) -> bool {
        self.exported > 0
    }
}

/// Splits `0..len` into consecutive ranges of at most `batch_size` rows.
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] if `batch_size` is zero.
pub fn batch_ranges(len: usize, batch_size: usize) -> Result<Vec<Range<usize>>> {
    if batch_size == 0 {
        return Err(Error::InvalidInput("batch size must be at least 1".to_string()));
    }
    Ok((0..len)
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(len))
        .collect())
}

/// Exports every row of a store group as a numbered archive.
pub struct StoreToArchives {
    store: ColumnarStore,
    output_dir: PathBuf,
    options: ExportOptions,
    progress: Option<ProgressCallback<ExportProgress>>,
}

impl std::fmt::Debug for StoreToArchives {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreToArchives")
            .field("store", &self.store)
            .field("output_dir", &self.output_dir)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl StoreToArchives {
    /// Opens the source group.
    ///
    /// Schema problems in the source surface here, before any archive is written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero batch size or a timestamp
    /// template, or any error from [`ColumnarStore::open_read`].
    pub fn new(
        store_path: impl AsRef<Path>,
        group: &str,
        output_dir: impl Into<PathBuf>,
        options: ExportOptions,
    ) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(Error::InvalidInput("batch size must be at least 1".to_string()));
        }
        options.template.require_indexed()?;
        let store = ColumnarStore::open_read(store_path, group)?;
        Ok(Self {
            store,
            output_dir: output_dir.into(),
            options,
            progress: None,
        })
    }

    /// Sets a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: ProgressCallback<ExportProgress>) -> Self {
        self.progress = Some(progress);
        self
    }
}

impl Conversion for StoreToArchives {
    type Report = ExportReport;

    fn run(self) -> Result<ExportReport> {
        let total = self.store.len();
        let ranges = batch_ranges(total, self.options.batch_size)?;
        let mut writer = ArchiveWriter::new(
            &self.output_dir,
            self.options.template.clone(),
            self.options.allow_overwrite,
            self.options.start_index,
        );

        tracing::info!(
            group = %self.store.path().display(),
            out = %self.output_dir.display(),
            rows = total,
            batches = ranges.len(),
            "Exporting store to archives"
        );

        let mut report = ExportReport::default();
        let mut progress = ExportProgress {
            total,
            ..Default::default()
        };
        for (batch_index, range) in ranges.into_iter().enumerate() {
            let batch = self.store.read_range(range.clone())?;
            for local in 0..batch.rows() {
                let sample = batch.row(local)?;
                report.last_path = Some(writer.write(&sample)?);
                report.exported += 1;

                progress.exported = report.exported;
                progress.batch = batch_index;
                if let Some(ref cb) = self.progress {
                    cb(&progress);
                }
            }
            tracing::debug!(batch = batch_index, rows = range.len(), "Exported batch");
            report.batch_sizes.push(range.len());
            report.batches += 1;
        }

        tracing::info!(exported = report.exported, "Export complete");
        Ok(report)
    }
}

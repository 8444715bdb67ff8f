//! Index-driven subset extraction.
//!
//! Both extractors gather: output position `i` receives source entry
//! `indices[i]`, so repeated and reordered indices are kept as given.

use crate::io::Conversion;
use crate::io::validation::{Diagnostic, DiagnosticKind, DiagnosticReport};
use crate::storage::{ArchiveCodec, ArchiveWriter, ColumnarStore, NamingTemplate};
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Result of a subset extraction.
#[derive(Debug, Clone, Default)]
pub struct SubsetReport {
    /// Number of indices requested.
    pub requested: usize,
    /// Number of entries written.
    pub produced: usize,
    /// Requested entries that were absent or unreadable. Always empty for stores.
    pub missing: DiagnosticReport,
    /// Destination group directory, or the last archive written.
    pub last_path: Option<PathBuf>,
}

impl SubsetReport {
    /// Returns whether every requested entry was produced.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.produced == self.requested
    }
}

/// Copies selected rows of a store group into a new group.
#[derive(Debug, Clone)]
pub struct StoreSubsetExtractor {
    source_path: PathBuf,
    source_group: String,
    dest_path: PathBuf,
    dest_group: String,
    indices: Vec<usize>,
    allow_overwrite: bool,
}

impl StoreSubsetExtractor {
    /// Creates an extraction of `indices` from `source_path`/`source_group`.
    #[must_use]
    pub fn new(
        source_path: impl Into<PathBuf>,
        source_group: impl Into<String>,
        dest_path: impl Into<PathBuf>,
        dest_group: impl Into<String>,
        indices: Vec<usize>,
        allow_overwrite: bool,
    ) -> Self {
        Self {
            source_path: source_path.into(),
            source_group: source_group.into(),
            dest_path: dest_path.into(),
            dest_group: dest_group.into(),
            indices,
            allow_overwrite,
        }
    }
}

impl Conversion for StoreSubsetExtractor {
    type Report = SubsetReport;

    fn run(self) -> Result<SubsetReport> {
        if self.source_group == self.dest_group && same_dir(&self.source_path, &self.dest_path) {
            return Err(Error::InvalidInput(
                "subset destination must differ from its source".to_string(),
            ));
        }
        let source = ColumnarStore::open_read(&self.source_path, &self.source_group)?;
        let len = source.len();
        if let Some(&index) = self.indices.iter().find(|&&i| i >= len) {
            return Err(Error::IndexOutOfRange { index, len });
        }

        tracing::info!(
            source = %source.path().display(),
            requested = self.indices.len(),
            "Extracting store subset"
        );
        let mut dest = ColumnarStore::create_with_len(
            &self.dest_path,
            &self.dest_group,
            source.schema(),
            self.indices.len(),
            self.allow_overwrite,
        )?;
        let dest_dir = dest.path().to_path_buf();

        let outcome = self
            .indices
            .iter()
            .enumerate()
            .try_for_each(|(i, &index)| dest.write_row(i, &source.read_row(index)?));
        let closed = dest.close();
        outcome?;
        closed?;

        Ok(SubsetReport {
            requested: self.indices.len(),
            produced: self.indices.len(),
            missing: DiagnosticReport::new(),
            last_path: Some(dest_dir),
        })
    }
}

/// Copies selected archives into a new, contiguously numbered set.
#[derive(Debug, Clone)]
pub struct ArchiveSubsetExtractor {
    source_dir: PathBuf,
    source_template: NamingTemplate,
    dest_dir: PathBuf,
    dest_template: NamingTemplate,
    indices: Vec<usize>,
    allow_overwrite: bool,
}

impl ArchiveSubsetExtractor {
    /// Creates an extraction of `indices` from `source_dir`.
    #[must_use]
    pub fn new(
        source_dir: impl Into<PathBuf>,
        source_template: NamingTemplate,
        dest_dir: impl Into<PathBuf>,
        dest_template: NamingTemplate,
        indices: Vec<usize>,
        allow_overwrite: bool,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            source_template,
            dest_dir: dest_dir.into(),
            dest_template,
            indices,
            allow_overwrite,
        }
    }
}

impl Conversion for ArchiveSubsetExtractor {
    type Report = SubsetReport;

    fn run(self) -> Result<SubsetReport> {
        self.source_template.require_indexed()?;
        self.dest_template.require_indexed()?;
        let mut writer = ArchiveWriter::new(&self.dest_dir, self.dest_template, self.allow_overwrite, 0);
        let mut report = SubsetReport {
            requested: self.indices.len(),
            ..Default::default()
        };

        tracing::info!(
            source = %self.source_dir.display(),
            dest = %self.dest_dir.display(),
            requested = report.requested,
            "Extracting archive subset"
        );
        for &index in &self.indices {
            let path = self.source_template.resolve(&self.source_dir, index as u64)?;
            if !path.is_file() {
                report.missing.push(Diagnostic::new(
                    DiagnosticKind::MissingIndex,
                    index.to_string(),
                    format!("{} does not exist", path.display()),
                ));
                continue;
            }
            let sample = match ArchiveCodec::load(&path) {
                Ok(sample) => sample,
                Err(e) => {
                    report.missing.push(Diagnostic::new(
                        DiagnosticKind::Unreadable,
                        index.to_string(),
                        e.to_string(),
                    ));
                    continue;
                },
            };
            report.last_path = Some(writer.write(&sample)?);
            report.produced += 1;
        }

        tracing::info!(
            produced = report.produced,
            missing = report.missing.len(),
            "Archive subset complete"
        );
        Ok(report)
    }
}

/// Compares directories by canonical path when both exist.
fn same_dir(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

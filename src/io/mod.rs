//! Conversion and extraction subsystem.
//!
//! Moves samples between columnar stores and archive directories, and
//! extracts index-defined subsets from either representation.
//!
//! # Architecture
//!
//! - **Formats** name the representations and detect them on disk
//! - **Validation** fits archives to a store schema and collects diagnostics
//! - **Services** orchestrate one conversion each, behind [`Conversion`]
//!
//! # Supported Conversions
//!
//! | From | To | Service |
//! |------|----|---------|
//! | Store | Archives | [`StoreToArchives`] |
//! | Archives | Store | [`ArchivesToStore`] |
//! | Store | Store subset | [`StoreSubsetExtractor`] |
//! | Archives | Archive subset | [`ArchiveSubsetExtractor`] |
//! | Archives | Tables | [`TableExporter`] (not supported) |
//!
//! # Examples
//!
//! ## Export a store group to archives
//!
//! ```rust,ignore
//! use sampleconv::io::{Conversion, ExportOptions, StoreToArchives};
//!
//! let report = StoreToArchives::new("dataset", "data", "archives",
//!     ExportOptions::default().with_batch_size(256))?
//!     .run()?;
//! println!("Exported {} samples in {} batches", report.exported, report.batches);
//! ```
//!
//! ## Import archives into a store
//!
//! ```rust,ignore
//! use sampleconv::io::{ArchivesToStore, Conversion, ImportOptions, MissingFieldPolicy};
//!
//! let report = ArchivesToStore::new("archives", "dataset", "data",
//!     ImportOptions::default().with_missing_field(MissingFieldPolicy::ZeroFill))
//!     .run()?;
//! println!("Imported {} samples, rejected {}", report.imported, report.rejected);
//! ```

pub mod formats;
pub mod services;
pub mod validation;

use crate::Result;

/// A one-shot conversion between dataset representations.
///
/// Implementors validate their inputs on construction or at the start of
/// [`Conversion::run`], and report what they did in `Report`.
pub trait Conversion {
    /// Summary returned after a successful run.
    type Report;

    /// Runs the conversion to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversion cannot complete. Partial output
    /// already written is left flushed and consistent.
    fn run(self) -> Result<Self::Report>;
}

// Re-exports for convenience
pub use formats::{Format, TableExporter};
pub use services::export::{ExportOptions, ExportProgress, ExportReport, StoreToArchives, batch_ranges};
pub use services::import::{ArchivesToStore, ImportOptions, ImportProgress, ImportReport};
pub use services::subset::{ArchiveSubsetExtractor, StoreSubsetExtractor, SubsetReport};
pub use services::ProgressCallback;
pub use validation::{
    Diagnostic, DiagnosticKind, DiagnosticReport, ImportValidator, MissingFieldPolicy,
    ValidationResult,
};

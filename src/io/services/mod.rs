//! Conversion service implementations.
//!
//! Each service opens its source, validates options, and writes its
//! destination in one sequential pass.

pub mod export;
pub mod import;
pub mod subset;

/// Progress callback invoked after each processed entry.
pub type ProgressCallback<P> = Box<dyn Fn(&P) + Send>;

pub use export::{ExportOptions, ExportProgress, ExportReport, StoreToArchives};
pub use import::{ArchivesToStore, ImportOptions, ImportProgress, ImportReport};
pub use subset::{ArchiveSubsetExtractor, StoreSubsetExtractor, SubsetReport};

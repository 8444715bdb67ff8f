//! Storage layer.
//!
//! Two on-disk representations of the same data:
//! - **Columnar store**: one growable array per field, grouped by name ([`ColumnarStore`])
//! - **Archive directory**: one self-contained file per sample ([`ArchiveCodec`])
//!
//! [`NamingTemplate`] and [`ArchiveScanner`] map between archive indices and
//! file names in both directions.

// Row and byte counts are converted between usize, u64 and f64 for file offsets
// and growth factors; all values stay far below the lossy range.
#![allow(clippy::cast_possible_truncation)]

mod archive;
mod columnar;
mod naming;
mod scan;

pub use archive::{ArchiveCodec, ArchiveWriter};
pub use columnar::{ColumnarStore, GrowthPolicy, STORE_MANIFEST};
pub use naming::{ARCHIVE_EXTENSION, NamingMode, NamingTemplate};
pub use scan::{ArchiveScanner, matches_glob};

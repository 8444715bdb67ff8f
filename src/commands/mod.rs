//! Command handlers module.
//!
//! This module organizes the CLI command implementations into separate files:
//! - `convert.rs`: Store/archive conversions (export, import, to-table)
//! - `subset.rs`: Subset extraction for stores and archive sets
//! - `inspect.rs`: Store inspection

mod convert;
mod inspect;
mod subset;

use clap::Args;
use std::path::PathBuf;

// Re-export command functions
pub use convert::{cmd_export, cmd_import, cmd_to_table};
pub use inspect::cmd_inspect;
pub use subset::{cmd_subset_archives, cmd_subset_store};

/// Default store group name.
pub const DEFAULT_GROUP: &str = "data";

/// Arguments for `export`.
#[derive(Args)]
pub struct ExportArgs {
    /// Store directory.
    #[arg(long)]
    pub store: PathBuf,

    /// Group inside the store.
    #[arg(long, default_value = DEFAULT_GROUP)]
    pub group: String,

    /// Output directory for archives.
    #[arg(long)]
    pub out: PathBuf,

    /// Rows read per batch (overrides config).
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Archive naming template, e.g. `datapoint_{index:04}.sample`.
    #[arg(long)]
    pub template: Option<String>,

    /// Index of the first archive.
    #[arg(long)]
    pub start_index: Option<u64>,

    /// Replace archives that already exist.
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for `import`.
#[derive(Args)]
pub struct ImportArgs {
    /// Directory holding the archives.
    #[arg(long)]
    pub archives: PathBuf,

    /// Destination store directory.
    #[arg(long)]
    pub store: PathBuf,

    /// Destination group.
    #[arg(long, default_value = DEFAULT_GROUP)]
    pub group: String,

    /// File name glob (overrides config).
    #[arg(long)]
    pub pattern: Option<String>,

    /// Scan subdirectories too.
    #[arg(long)]
    pub recursive: bool,

    /// Missing-field policy: reject, abort, or zero-fill.
    #[arg(long)]
    pub missing_field: Option<String>,

    /// Replace the destination group if it exists.
    #[arg(long, conflicts_with = "append")]
    pub overwrite: bool,

    /// Append to the destination group if it exists.
    #[arg(long)]
    pub append: bool,
}

/// Arguments for `subset-store`.
#[derive(Args)]
pub struct SubsetStoreArgs {
    /// Source store directory.
    #[arg(long)]
    pub store: PathBuf,

    /// Source group.
    #[arg(long, default_value = DEFAULT_GROUP)]
    pub group: String,

    /// Destination store directory.
    #[arg(long)]
    pub dest: PathBuf,

    /// Destination group (defaults to the source group name).
    #[arg(long)]
    pub dest_group: Option<String>,

    /// Row indices to copy, comma-separated. Order and repeats are kept.
    #[arg(long, value_delimiter = ',', required = true)]
    pub indices: Vec<usize>,

    /// Replace the destination group if it exists.
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for `subset-archives`.
#[derive(Args)]
pub struct SubsetArchivesArgs {
    /// Source archive directory.
    #[arg(long)]
    pub archives: PathBuf,

    /// Destination directory.
    #[arg(long)]
    pub dest: PathBuf,

    /// Archive indices to copy, comma-separated.
    #[arg(long, value_delimiter = ',', required = true)]
    pub indices: Vec<usize>,

    /// Source naming template (defaults to the export template).
    #[arg(long)]
    pub template: Option<String>,

    /// Destination naming template (defaults to the source template).
    #[arg(long)]
    pub dest_template: Option<String>,

    /// Replace archives that already exist.
    #[arg(long)]
    pub overwrite: bool,
}

/// Arguments for `inspect`.
#[derive(Args)]
pub struct InspectArgs {
    /// Store or archive directory; the format is detected.
    #[arg(long, visible_alias = "store")]
    pub path: PathBuf,

    /// Store group to describe. Lists all groups when omitted.
    #[arg(long)]
    pub group: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

/// Arguments for `to-table`.
#[derive(Args)]
pub struct ToTableArgs {
    /// Source archive directory.
    #[arg(long)]
    pub archives: PathBuf,

    /// Output directory for tables.
    #[arg(long)]
    pub out: PathBuf,
}

//! Binary entry point for sampleconv.
//!
//! This binary provides the CLI interface for converting datasets between
//! columnar stores and archive directories.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

mod commands;

use clap::{Parser, Subcommand};
use commands::{
    ExportArgs, ImportArgs, InspectArgs, SubsetArchivesArgs, SubsetStoreArgs, ToTableArgs,
};
use sampleconv::config::SampleconvConfig;
use sampleconv::observability::{self, InitOptions};
use std::path::PathBuf;
use std::process::ExitCode;

/// Sampleconv - convert sample datasets between columnar stores and archives.
#[derive(Parser)]
#[command(name = "sampleconv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "SAMPLECONV_CONFIG_PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Export every row of a store group as one archive per sample.
    Export(ExportArgs),

    /// Import a directory of archives into a new store group.
    Import(ImportArgs),

    /// Copy selected rows of a store group into a new group.
    SubsetStore(SubsetStoreArgs),

    /// Copy selected archives into a new, contiguously numbered set.
    SubsetArchives(SubsetArchivesArgs),

    /// Show the groups, length, and schema of a store.
    Inspect(InspectArgs),

    /// Export archives to per-field tables (not supported).
    ToTable(ToTableArgs),
}

/// Main entry point.
fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match SampleconvConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_config(
        &config.observability,
        InitOptions {
            verbose: cli.verbose,
        },
    ) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &SampleconvConfig) -> anyhow::Result<()> {
    match command {
        Commands::Export(args) => commands::cmd_export(config, args),
        Commands::Import(args) => commands::cmd_import(config, args),
        Commands::SubsetStore(args) => commands::cmd_subset_store(args),
        Commands::SubsetArchives(args) => commands::cmd_subset_archives(config, args),
        Commands::Inspect(args) => commands::cmd_inspect(args),
        Commands::ToTable(args) => commands::cmd_to_table(args),
    }
}

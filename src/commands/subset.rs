//! Subset extraction command handlers.

use super::{SubsetArchivesArgs, SubsetStoreArgs};
use anyhow::Context;
use sampleconv::config::SampleconvConfig;
use sampleconv::io::{ArchiveSubsetExtractor, Conversion, StoreSubsetExtractor, SubsetReport};
use sampleconv::storage::NamingTemplate;

/// Executes the subset-store command.
pub fn cmd_subset_store(args: SubsetStoreArgs) -> anyhow::Result<()> {
    let dest_group = args.dest_group.unwrap_or_else(|| args.group.clone());
    let report = StoreSubsetExtractor::new(
        &args.store,
        &args.group,
        &args.dest,
        dest_group,
        args.indices,
        args.overwrite,
    )
    .run()
    .context("store subset failed")?;

    print_report(&report);
    Ok(())
}

/// Executes the subset-archives command.
pub fn cmd_subset_archives(config: &SampleconvConfig, args: SubsetArchivesArgs) -> anyhow::Result<()> {
    let source_template = match args.template.as_deref() {
        Some(template) => template.parse::<NamingTemplate>().context("invalid --template")?,
        None => config.export.template.clone(),
    };
    let dest_template: NamingTemplate = match args.dest_template.as_deref() {
        Some(template) => template.parse::<NamingTemplate>().context("invalid --dest-template")?,
        None => source_template.clone(),
    };

    let report = ArchiveSubsetExtractor::new(
        &args.archives,
        source_template,
        &args.dest,
        dest_template,
        args.indices,
        args.overwrite,
    )
    .run()
    .context("archive subset failed")?;

    print_report(&report);
    Ok(())
}

fn print_report(report: &SubsetReport) {
    println!("Subset completed:");
    println!("  Requested: {}", report.requested);
    println!("  Produced:  {}", report.produced);
    if let Some(path) = &report.last_path {
        println!("  Output:    {}", path.display());
    }
    if !report.missing.is_empty() {
        println!();
        println!("Missing ({}):", report.missing.len());
        for diagnostic in &report.missing {
            println!("  - {diagnostic}");
        }
    }
}

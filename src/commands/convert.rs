//! Store and archive conversion command handlers.

use super::{ExportArgs, ImportArgs, ToTableArgs};
use anyhow::Context;
use sampleconv::config::SampleconvConfig;
use sampleconv::io::{
    ArchivesToStore, Conversion, ExportProgress, ImportProgress, MissingFieldPolicy,
    StoreToArchives, TableExporter,
};
use sampleconv::storage::NamingTemplate;
use std::io::Write;

const MAX_LISTED_DIAGNOSTICS: usize = 10;

/// Executes the export command.
pub fn cmd_export(config: &SampleconvConfig, args: ExportArgs) -> anyhow::Result<()> {
    let mut options = config
        .export
        .clone()
        .with_overwrite(args.overwrite || config.export.allow_overwrite);
    if let Some(batch_size) = args.batch_size {
        options = options.with_batch_size(batch_size);
    }
    if let Some(template) = args.template.as_deref() {
        let template = template
            .parse::<NamingTemplate>()
            .context("invalid --template")?;
        options = options.with_template(template);
    }
    if let Some(start_index) = args.start_index {
        options = options.with_start_index(start_index);
    }

    let progress = Box::new(|progress: &ExportProgress| {
        eprint!(
            "\rExporting: {}/{} (batch {})",
            progress.exported,
            progress.total,
            progress.batch + 1
        );
        let _ = std::io::stderr().flush();
    });

    let report = StoreToArchives::new(&args.store, &args.group, &args.out, options)
        .with_context(|| format!("cannot open {}/{}", args.store.display(), args.group))?
        .with_progress(progress)
        .run()
        .context("export failed")?;

    eprintln!();
    println!("Export completed:");
    println!("  Exported:  {}", report.exported);
    println!("  Batches:   {} {:?}", report.batches, report.batch_sizes);
    if let Some(path) = &report.last_path {
        println!("  Last file: {}", path.display());
    }
    Ok(())
}

/// Executes the import command.
pub fn cmd_import(config: &SampleconvConfig, args: ImportArgs) -> anyhow::Result<()> {
    let mut options = config
        .import
        .clone()
        .with_recursive(args.recursive || config.import.recursive)
        .with_overwrite(args.overwrite || config.import.allow_overwrite)
        .with_append(args.append);
    if let Some(pattern) = args.pattern {
        options = options.with_pattern(pattern);
    }
    if let Some(policy) = args.missing_field.as_deref() {
        let policy = policy
            .parse::<MissingFieldPolicy>()
            .context("invalid --missing-field")?;
        options = options.with_missing_field(policy);
    }

    let progress = Box::new(|progress: &ImportProgress| {
        eprint!(
            "\rImporting: {}/{} ({:.1}%) - Imported: {}, Rejected: {}",
            progress.processed,
            progress.total_estimate.unwrap_or(0),
            progress.percent_complete().unwrap_or(0.0),
            progress.imported,
            progress.rejected,
        );
        let _ = std::io::stderr().flush();
    });

    let report = ArchivesToStore::new(&args.archives, &args.store, &args.group, options)
        .with_progress(progress)
        .run()
        .context("import failed")?;

    eprintln!();
    println!("Import completed:");
    println!("  Imported:        {}", report.imported);
    println!("  Rejected:        {}", report.rejected);
    println!("  Total processed: {}", report.total_processed);
    println!("  Store length:    {}", report.store_len);

    if report.has_diagnostics() {
        println!();
        println!("Diagnostics ({}):", report.diagnostics.len());
        for diagnostic in report.diagnostics.iter().take(MAX_LISTED_DIAGNOSTICS) {
            println!("  - {diagnostic}");
        }
        if report.diagnostics.len() > MAX_LISTED_DIAGNOSTICS {
            println!(
                "  ... and {} more",
                report.diagnostics.len() - MAX_LISTED_DIAGNOSTICS
            );
        }
    }
    Ok(())
}

/// Executes the to-table command.
pub fn cmd_to_table(args: ToTableArgs) -> anyhow::Result<()> {
    TableExporter::new(&args.archives, &args.out)
        .run()
        .context("table export failed")
}

//! Dataset inspection command handler.

use super::InspectArgs;
use anyhow::Context;
use sampleconv::io::Format;
use sampleconv::models::StoreSchema;
use sampleconv::storage::{ARCHIVE_EXTENSION, ArchiveCodec, ArchiveScanner, ColumnarStore};
use std::path::Path;

/// Executes the inspect command.
pub fn cmd_inspect(args: InspectArgs) -> anyhow::Result<()> {
    let format = Format::detect(&args.path)
        .with_context(|| format!("cannot inspect {}", args.path.display()))?;
    match format {
        Format::Store => inspect_store(&args.path, args.group.as_deref(), args.json),
        Format::Archive => inspect_archives(&args.path, args.json),
    }
}

fn inspect_store(path: &Path, group: Option<&str>, json: bool) -> anyhow::Result<()> {
    let Some(group) = group else {
        let groups = ColumnarStore::groups(path)
            .with_context(|| format!("cannot list {}", path.display()))?;
        if json {
            let summary = serde_json::json!({
                "format": Format::Store.to_string(),
                "groups": groups,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        } else {
            println!("Groups in {}:", path.display());
            for group in groups {
                println!("  {group}");
            }
        }
        return Ok(());
    };

    let store = ColumnarStore::open_read(path, group)
        .with_context(|| format!("cannot open {}/{group}", path.display()))?;

    if json {
        let summary = serde_json::json!({
            "format": Format::Store.to_string(),
            "group": group,
            "len": store.len(),
            "schema": serde_json::to_value(store.schema())?,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Group:  {group}");
    println!("Length: {}", store.len());
    println!();
    print_schema(store.schema());
    Ok(())
}

fn inspect_archives(path: &Path, json: bool) -> anyhow::Result<()> {
    let scanner = ArchiveScanner::new(path, &format!("*.{ARCHIVE_EXTENSION}"), false)?;
    let first = scanner.paths().first().cloned();
    let schema = match &first {
        Some(first) => Some(StoreSchema::from_pivot(&ArchiveCodec::load(first)?)?),
        None => None,
    };

    if json {
        let summary = serde_json::json!({
            "format": Format::Archive.to_string(),
            "archives": scanner.len(),
            "first": first.as_ref().map(|p| p.display().to_string()),
            "last": scanner.paths().last().map(|p| p.display().to_string()),
            "schema": serde_json::to_value(&schema)?,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Archives: {}", scanner.len());
    if let (Some(first), Some(last)) = (&first, scanner.paths().last()) {
        println!("First:    {}", first.display());
        println!("Last:     {}", last.display());
    }
    if let Some(schema) = &schema {
        println!();
        println!("Fields of the first archive:");
        print_schema(schema);
    }
    Ok(())
}

fn print_schema(schema: &StoreSchema) {
    println!("{:<24} {:<8} {:<16} {:>10}", "FIELD", "DTYPE", "SHAPE", "ROW BYTES");
    for (name, spec) in schema.iter() {
        println!(
            "{:<24} {:<8} {:<16} {:>10}",
            name,
            spec.dtype.as_str(),
            format!("{:?}", spec.shape),
            spec.row_bytes()
        );
    }
}

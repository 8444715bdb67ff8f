//! End-to-end conversion tests.
//!
//! Covers store export, archive import, both subset extractors, and the
//! overwrite rules shared by every destination.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use sampleconv::io::{
    ArchiveSubsetExtractor, ArchivesToStore, Conversion, DiagnosticKind, ExportOptions, Format,
    ImportOptions, MissingFieldPolicy, StoreSubsetExtractor, StoreToArchives, TableExporter,
};
use sampleconv::models::{ArrayValue, Sample, Scalar, StoreSchema};
use sampleconv::storage::{ArchiveCodec, ArchiveScanner, ColumnarStore, NamingTemplate};
use sampleconv::Error;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// Row `i` of the reference dataset: two (3,) fields with distinct values.
fn row(i: usize) -> Sample {
    #[allow(clippy::cast_precision_loss)]
    let base = i as f32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let n = i as i32;
    Sample::new()
        .with_field(
            "a",
            ArrayValue::from_vec(vec![3], vec![base, base + 0.25, base + 0.5]).unwrap(),
        )
        .with_field("b", ArrayValue::from_vec(vec![3], vec![n, -n, n * 10]).unwrap())
}

/// Creates `<dir>/<group>` holding rows `0..n`.
fn build_store(dir: &Path, group: &str, n: usize) {
    let schema = StoreSchema::from_pivot(&row(0)).unwrap();
    let mut store = ColumnarStore::create_write(dir, group, &schema, false).unwrap();
    for i in 0..n {
        store.append(&row(i)).unwrap();
    }
    store.close().unwrap();
}

fn archive_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

// ============================================================================
// Store -> Archives
// ============================================================================

#[test]
fn test_export_ten_rows_in_batches_of_four() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    let out = tmp.path().join("archives");
    build_store(&store, "data", 10);

    let report = StoreToArchives::new(
        &store,
        "data",
        &out,
        ExportOptions::default().with_batch_size(4),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(report.exported, 10);
    assert_eq!(report.batches, 3);
    assert_eq!(report.batch_sizes, vec![4, 4, 2]);
    assert_eq!(
        report.last_path.unwrap().file_name().unwrap(),
        "datapoint_0009.sample"
    );

    let names = archive_names(&out);
    assert_eq!(names.len(), 10);
    assert_eq!(names[0], "datapoint_0000.sample");
    for (i, name) in names.iter().enumerate() {
        assert_eq!(ArchiveCodec::load(&out.join(name)).unwrap(), row(i));
    }
}

#[test]
fn test_export_respects_start_index_and_template() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    let out = tmp.path().join("archives");
    build_store(&store, "data", 3);

    let template: NamingTemplate = "frame_{index:02}.sample".parse().unwrap();
    StoreToArchives::new(
        &store,
        "data",
        &out,
        ExportOptions::default()
            .with_template(template)
            .with_start_index(7),
    )
    .unwrap()
    .run()
    .unwrap();

    assert_eq!(
        archive_names(&out),
        vec!["frame_07.sample", "frame_08.sample", "frame_09.sample"]
    );
}

#[test]
fn test_export_of_inconsistent_store_fails_before_writing() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    let out = tmp.path().join("archives");
    build_store(&store, "data", 4);

    let manifest_path = store.join("data").join("manifest.json");
    let mut manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifest_path).unwrap()).unwrap();
    manifest["fields"]["a"]["len"] = serde_json::json!(3);
    fs::write(&manifest_path, manifest.to_string()).unwrap();

    let err = StoreToArchives::new(&store, "data", &out, ExportOptions::default()).unwrap_err();
    assert!(matches!(err, Error::Schema(_)), "{err}");
    assert!(!out.exists());
}

#[test]
fn test_export_conflict_is_fatal_and_preserves_file() {
    let tmp = TempDir::new().unwrap();
    let store = tmp.path().join("store");
    let out = tmp.path().join("archives");
    build_store(&store, "data", 3);

    let sentinel = Sample::new().with_metadata("keep", Scalar::Text("me".to_string()));
    let conflicting = out.join("datapoint_0001.sample");
    ArchiveCodec::save(&conflicting, &sentinel, false).unwrap();
    let before = fs::read(&conflicting).unwrap();

    let err = StoreToArchives::new(&store, "data", &out, ExportOptions::default())
        .unwrap()
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::ExistingFile { ref path } if path == &conflicting));
    assert_eq!(fs::read(&conflicting).unwrap(), before);
    assert!(out.join("datapoint_0000.sample").exists());

    let report = StoreToArchives::new(
        &store,
        "data",
        &out,
        ExportOptions::default().with_overwrite(true),
    )
    .unwrap()
    .run()
    .unwrap();
    assert_eq!(report.exported, 3);
    assert_eq!(ArchiveCodec::load(&conflicting).unwrap(), row(1));
}

#[test]
fn test_export_rejects_zero_batch_size() {
    let tmp = TempDir::new().unwrap();
    build_store(tmp.path(), "data", 1);
    let result = StoreToArchives::new(
        tmp.path(),
        "data",
        tmp.path().join("out"),
        ExportOptions::default().with_batch_size(0),
    );
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_export_rejects_timestamp_template() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("out");
    build_store(tmp.path(), "data", 5);

    let options = ExportOptions::default()
        .with_template(NamingTemplate::timestamped("cap_"))
        .with_overwrite(true);
    let err = StoreToArchives::new(tmp.path(), "data", &out, options).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err}");
    assert!(!out.exists());

    let parsed: NamingTemplate = "cap_{timestamp}".parse().unwrap();
    let options = ExportOptions::default().with_template(parsed);
    assert!(StoreToArchives::new(tmp.path(), "data", &out, options).is_err());
}

// ============================================================================
// Archives -> Store
// ============================================================================

#[test]
fn test_round_trip_reproduces_every_field() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    let archives = tmp.path().join("archives");
    let rebuilt = tmp.path().join("rebuilt");
    build_store(&source, "data", 10);

    StoreToArchives::new(&source, "data", &archives, ExportOptions::default().with_batch_size(3))
        .unwrap()
        .run()
        .unwrap();
    let report = ArchivesToStore::new(&archives, &rebuilt, "data", ImportOptions::default())
        .run()
        .unwrap();
    assert_eq!(report.imported, 10);
    assert_eq!(report.store_len, 10);
    assert!(!report.has_diagnostics());

    let original = ColumnarStore::open_read(&source, "data").unwrap();
    let copy = ColumnarStore::open_read(&rebuilt, "data").unwrap();
    assert_eq!(original.schema(), copy.schema());
    assert_eq!(original.read_range(0..10).unwrap(), copy.read_range(0..10).unwrap());
}

/// Writes archives 0..4 where archive 2 lacks field `b`.
fn archives_with_gap(dir: &Path) {
    for i in 0..4 {
        let mut sample = row(i);
        if i == 2 {
            sample.remove("b");
        }
        ArchiveCodec::save(&dir.join(format!("dp_{i:02}.sample")), &sample, false).unwrap();
    }
}

#[test]
fn test_import_rejects_incomplete_archive_by_default() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    archives_with_gap(&archives);

    let report = ArchivesToStore::new(&archives, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap();
    assert_eq!(report.imported, 3);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.total_processed, 4);
    assert_eq!(report.diagnostics.count(DiagnosticKind::MissingField), 1);

    let store = ColumnarStore::open_read(tmp.path(), "data").unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.read_row(2).unwrap(), row(3));
}

#[test]
fn test_import_zero_fill_keeps_every_archive() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    archives_with_gap(&archives);

    let report = ArchivesToStore::new(
        &archives,
        tmp.path(),
        "data",
        ImportOptions::default().with_missing_field(MissingFieldPolicy::ZeroFill),
    )
    .run()
    .unwrap();
    assert_eq!(report.imported, 4);
    assert_eq!(report.diagnostics.count(DiagnosticKind::MissingField), 1);

    let store = ColumnarStore::open_read(tmp.path(), "data").unwrap();
    let filled = store.read_row(2).unwrap();
    assert_eq!(filled.get("a"), row(2).get("a"));
    assert_eq!(filled.get("b").unwrap().to_vec::<i32>().unwrap(), vec![0, 0, 0]);
}

#[test]
fn test_import_abort_flushes_rows_written_so_far() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    archives_with_gap(&archives);

    let err = ArchivesToStore::new(
        &archives,
        tmp.path(),
        "data",
        ImportOptions::default().with_missing_field(MissingFieldPolicy::Abort),
    )
    .run()
    .unwrap_err();
    assert!(matches!(err, Error::Schema(_)));

    let store = ColumnarStore::open_read(tmp.path(), "data").unwrap();
    assert_eq!(store.len(), 2);
    assert_eq!(store.read_row(1).unwrap(), row(1));
}

#[test]
fn test_import_skips_unknown_fields_and_unreadable_archives() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    ArchiveCodec::save(&archives.join("a.sample"), &row(0), false).unwrap();
    let extra = row(1).with_field("c", ArrayValue::scalar(1u8));
    ArchiveCodec::save(&archives.join("b.sample"), &extra, false).unwrap();
    fs::write(archives.join("c.sample"), b"not an archive").unwrap();

    let report = ArchivesToStore::new(&archives, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap();
    assert_eq!(report.imported, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::UnknownField), 1);
    assert_eq!(report.diagnostics.count(DiagnosticKind::Unreadable), 1);
}

#[test]
fn test_import_pivot_is_first_in_sorted_order() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    let narrow = Sample::new().with_field("a", row(0).get("a").unwrap().clone());
    ArchiveCodec::save(&archives.join("z.sample"), &row(1), false).unwrap();
    ArchiveCodec::save(&archives.join("a.sample"), &narrow, false).unwrap();

    ArchivesToStore::new(&archives, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap();
    let store = ColumnarStore::open_read(tmp.path(), "data").unwrap();
    assert_eq!(store.schema().len(), 1);
    assert!(store.schema().contains("a"));
}

#[test]
fn test_import_without_archives_is_invalid_input() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    fs::create_dir_all(&archives).unwrap();

    let err = ArchivesToStore::new(&archives, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[test]
fn test_import_existing_group_requires_overwrite() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    ArchiveCodec::save(&archives.join("a.sample"), &row(0), false).unwrap();
    build_store(tmp.path(), "data", 5);

    let err = ArchivesToStore::new(&archives, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::ExistingFile { .. }));
    assert_eq!(ColumnarStore::open_read(tmp.path(), "data").unwrap().len(), 5);

    let report = ArchivesToStore::new(
        &archives,
        tmp.path(),
        "data",
        ImportOptions::default().with_overwrite(true),
    )
    .run()
    .unwrap();
    assert_eq!(report.store_len, 1);
}

#[test]
fn test_import_appends_to_existing_group() {
    let tmp = TempDir::new().unwrap();
    let first = tmp.path().join("first");
    let second = tmp.path().join("second");
    for i in 0..3 {
        ArchiveCodec::save(&first.join(format!("dp_{i}.sample")), &row(i), false).unwrap();
    }
    for i in 3..5 {
        ArchiveCodec::save(&second.join(format!("dp_{i}.sample")), &row(i), false).unwrap();
    }
    let narrow = Sample::new().with_field("a", row(9).get("a").unwrap().clone());
    ArchiveCodec::save(&second.join("dp_9.sample"), &narrow, false).unwrap();

    ArchivesToStore::new(&first, tmp.path(), "data", ImportOptions::default())
        .run()
        .unwrap();
    let report = ArchivesToStore::new(
        &second,
        tmp.path(),
        "data",
        ImportOptions::default().with_append(true),
    )
    .run()
    .unwrap();

    assert_eq!(report.imported, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.store_len, 5);
    assert_eq!(report.diagnostics.count(DiagnosticKind::MissingField), 1);

    let store = ColumnarStore::open_read(tmp.path(), "data").unwrap();
    assert_eq!(store.len(), 5);
    for i in 0..5 {
        assert_eq!(store.read_row(i).unwrap(), row(i));
    }
}

#[test]
fn test_append_creates_missing_group() {
    let tmp = TempDir::new().unwrap();
    let archives = tmp.path().join("archives");
    ArchiveCodec::save(&archives.join("a.sample"), &row(0), false).unwrap();

    let report = ArchivesToStore::new(
        &archives,
        tmp.path(),
        "data",
        ImportOptions::default().with_append(true),
    )
    .run()
    .unwrap();
    assert_eq!(report.store_len, 1);
}

// ============================================================================
// Subset extraction
// ============================================================================

#[test]
fn test_store_subset_gathers_with_duplicates_and_reordering() {
    let tmp = TempDir::new().unwrap();
    build_store(tmp.path(), "data", 5);

    let report = StoreSubsetExtractor::new(
        tmp.path(),
        "data",
        tmp.path().join("subset"),
        "data",
        vec![2, 0, 2],
        false,
    )
    .run()
    .unwrap();
    assert_eq!(report.requested, 3);
    assert_eq!(report.produced, 3);
    assert!(report.is_complete());

    let subset = ColumnarStore::open_read(tmp.path().join("subset"), "data").unwrap();
    assert_eq!(subset.len(), 3);
    assert_eq!(subset.read_row(0).unwrap(), row(2));
    assert_eq!(subset.read_row(1).unwrap(), row(0));
    assert_eq!(subset.read_row(2).unwrap(), row(2));
}

#[test]
fn test_store_subset_out_of_range_is_fatal() {
    let tmp = TempDir::new().unwrap();
    build_store(tmp.path(), "data", 5);

    let err = StoreSubsetExtractor::new(tmp.path(), "data", tmp.path(), "subset", vec![1, 5], false)
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::IndexOutOfRange { index: 5, len: 5 }));
    assert!(!tmp.path().join("subset").exists());
}

#[test]
fn test_archive_subset_reports_missing_index() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    build_store(tmp.path(), "data", 3);
    StoreToArchives::new(tmp.path(), "data", &source, ExportOptions::default())
        .unwrap()
        .run()
        .unwrap();

    let report = ArchiveSubsetExtractor::new(
        &source,
        NamingTemplate::default(),
        &dest,
        NamingTemplate::default(),
        vec![0, 1, 99],
        false,
    )
    .run()
    .unwrap();

    assert_eq!(report.requested, 3);
    assert_eq!(report.produced, 2);
    assert_eq!(report.missing.len(), 1);
    let missing = report.missing.iter().next().unwrap();
    assert_eq!(missing.kind, DiagnosticKind::MissingIndex);
    assert_eq!(missing.subject, "99");

    assert_eq!(
        archive_names(&dest),
        vec!["datapoint_0000.sample", "datapoint_0001.sample"]
    );
    assert_eq!(
        ArchiveCodec::load(&dest.join("datapoint_0001.sample")).unwrap(),
        row(1)
    );
}

#[test]
fn test_archive_subset_skips_unreadable_archive() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    build_store(tmp.path(), "data", 2);
    StoreToArchives::new(tmp.path(), "data", &source, ExportOptions::default())
        .unwrap()
        .run()
        .unwrap();

    let truncated = source.join("datapoint_0001.sample");
    let bytes = fs::read(&truncated).unwrap();
    fs::write(&truncated, &bytes[..bytes.len() / 2]).unwrap();

    let report = ArchiveSubsetExtractor::new(
        &source,
        NamingTemplate::default(),
        &dest,
        NamingTemplate::default(),
        vec![0, 1],
        false,
    )
    .run()
    .unwrap();

    assert_eq!(report.produced, 1);
    assert_eq!(report.missing.count(DiagnosticKind::Unreadable), 1);
    assert_eq!(report.missing.iter().next().unwrap().subject, "1");
    assert!(!report.is_complete());
    assert_eq!(archive_names(&dest), vec!["datapoint_0000.sample"]);
}

#[test]
fn test_archive_subset_numbers_output_contiguously() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    build_store(tmp.path(), "data", 4);
    StoreToArchives::new(tmp.path(), "data", &source, ExportOptions::default())
        .unwrap()
        .run()
        .unwrap();

    let dest_template: NamingTemplate = "pick_{index}.sample".parse().unwrap();
    ArchiveSubsetExtractor::new(
        &source,
        NamingTemplate::default(),
        &dest,
        dest_template,
        vec![3, 7, 1],
        false,
    )
    .run()
    .unwrap();

    assert_eq!(archive_names(&dest), vec!["pick_0.sample", "pick_1.sample"]);
    assert_eq!(ArchiveCodec::load(&dest.join("pick_0.sample")).unwrap(), row(3));
    assert_eq!(ArchiveCodec::load(&dest.join("pick_1.sample")).unwrap(), row(1));
}

#[test]
fn test_archive_subset_preserves_metadata() {
    let tmp = TempDir::new().unwrap();
    let source = tmp.path().join("source");
    let dest = tmp.path().join("dest");
    let sample = row(0).with_metadata("camera", Scalar::Text("left".to_string()));
    ArchiveCodec::save(&source.join("datapoint_0000.sample"), &sample, false).unwrap();

    ArchiveSubsetExtractor::new(
        &source,
        NamingTemplate::default(),
        &dest,
        NamingTemplate::default(),
        vec![0],
        false,
    )
    .run()
    .unwrap();
    assert_eq!(
        ArchiveCodec::load(&dest.join("datapoint_0000.sample")).unwrap(),
        sample
    );
}

// ============================================================================
// Misc
// ============================================================================

#[test]
fn test_scanner_order_is_reproducible() {
    let tmp = TempDir::new().unwrap();
    for name in ["c.sample", "a.sample", "b.sample"] {
        ArchiveCodec::save(&tmp.path().join(name), &row(0), false).unwrap();
    }
    let first: Vec<_> = ArchiveScanner::new(tmp.path(), "*.sample", false)
        .unwrap()
        .paths()
        .to_vec();
    let second: Vec<_> = ArchiveScanner::new(tmp.path(), "*.sample", false)
        .unwrap()
        .paths()
        .to_vec();
    assert_eq!(first, second);
    assert!(first.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_format_detection_of_conversion_outputs() {
    let tmp = TempDir::new().unwrap();
    let out = tmp.path().join("archives");
    build_store(&tmp.path().join("store"), "data", 2);
    StoreToArchives::new(tmp.path().join("store"), "data", &out, ExportOptions::default())
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(Format::detect(&tmp.path().join("store")).unwrap(), Format::Store);
    assert_eq!(Format::detect(&out).unwrap(), Format::Archive);
}

#[test]
fn test_table_export_is_not_supported() {
    let tmp = TempDir::new().unwrap();
    let err = TableExporter::new(tmp.path(), tmp.path().join("tables"))
        .run()
        .unwrap_err();
    assert!(matches!(err, Error::NotSupported(_)));
}

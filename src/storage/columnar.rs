//! Growable on-disk columnar store.
//!
//! A store is a directory holding one or more named groups. Each group keeps
//! one raw data file per field plus a manifest:
//!
//! ```text
//! <store>/
//!   <group>/
//!     manifest.json      field name -> {dtype, shape, len}
//!     <field>.bin        rows of (*shape) little-endian elements
//! ```
//!
//! Every field of a group has the same number of rows. Writers grow the
//! data files geometrically and track capacity separately from length, so
//! appending one row at a time does not reallocate on every call. Spare
//! capacity is trimmed when the store is closed or dropped.

use crate::models::{ArrayValue, FieldSpec, RowBatch, Sample, StoreSchema};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// File name of a group manifest.
pub const STORE_MANIFEST: &str = "manifest.json";
const MANIFEST_VERSION: u32 = 1;
const DATA_EXTENSION: &str = "bin";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    fields: BTreeMap<String, FieldManifest>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldManifest {
    #[serde(flatten)]
    spec: FieldSpec,
    len: usize,
}

/// Capacity growth settings for writable stores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowthPolicy {
    /// Rows reserved the first time a field grows.
    pub initial_capacity: usize,
    /// Multiplier applied to the capacity whenever it is exhausted.
    pub factor: f64,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            initial_capacity: 64,
            factor: 2.0,
        }
    }
}

impl GrowthPolicy {
    /// Capacity to reserve so that at least `needed` rows fit.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn next_capacity(&self, current: usize, needed: usize) -> usize {
        let factor = self.factor.max(1.0);
        let grown = (current as f64 * factor).ceil() as usize;
        needed.max(grown).max(self.initial_capacity)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Read,
    Write,
}

struct Column {
    spec: FieldSpec,
    file: File,
}

impl Column {
    fn row_offset(&self, index: usize) -> u64 {
        (index * self.spec.row_bytes()) as u64
    }

    fn read_rows(&self, range: Range<usize>) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; range.len() * self.spec.row_bytes()];
        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.row_offset(range.start)))?;
        file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write_rows(&self, start: usize, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.row_offset(start)))?;
        file.write_all(bytes)
    }

    fn resize(&self, rows: usize) -> std::io::Result<()> {
        self.file.set_len((rows * self.spec.row_bytes()) as u64)
    }
}

/// A group of equal-length fields stored on disk.
///
/// Open with [`ColumnarStore::open_read`] for export and subset reads, or
/// create with [`ColumnarStore::create_write`] for imports. Writable stores
/// flush on [`ColumnarStore::close`] and, as a fallback, on drop, so a run
/// that fails midway still leaves a readable group behind.
pub struct ColumnarStore {
    root: PathBuf,
    group: String,
    schema: StoreSchema,
    columns: BTreeMap<String, Column>,
    len: usize,
    capacity: usize,
    growth: GrowthPolicy,
    growth_events: usize,
    mode: Mode,
    dirty: bool,
    closed: bool,
}

impl std::fmt::Debug for ColumnarStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ColumnarStore")
            .field("root", &self.root)
            .field("group", &self.group)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl ColumnarStore {
    /// Opens an existing group for reading.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the group's fields have unequal lengths
    /// or a data file is shorter than its recorded length.
    pub fn open_read(path: impl AsRef<Path>, group: &str) -> Result<Self> {
        Self::open(path.as_ref(), group, Mode::Read)
    }

    /// Opens an existing group for appending more rows.
    ///
    /// # Errors
    ///
    /// Same as [`ColumnarStore::open_read`].
    pub fn open_append(path: impl AsRef<Path>, group: &str) -> Result<Self> {
        Self::open(path.as_ref(), group, Mode::Write)
    }

    /// Creates an empty group whose fields follow `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExistingFile`] if the group exists and
    /// `allow_overwrite` is false. With `allow_overwrite` the old group is
    /// removed first.
    pub fn create_write(
        path: impl AsRef<Path>,
        group: &str,
        schema: &StoreSchema,
        allow_overwrite: bool,
    ) -> Result<Self> {
        Self::create_with_len(path, group, schema, 0, allow_overwrite)
    }

    /// Creates a group preallocated with `len` zero rows.
    ///
    /// # Errors
    ///
    /// Same as [`ColumnarStore::create_write`].
    pub fn create_with_len(
        path: impl AsRef<Path>,
        group: &str,
        schema: &StoreSchema,
        len: usize,
        allow_overwrite: bool,
    ) -> Result<Self> {
        validate_name("group", group)?;
        if schema.is_empty() {
            return Err(Error::Schema(format!(
                "cannot create group '{group}' without fields"
            )));
        }
        for (name, spec) in schema.iter() {
            validate_name("field", name)?;
            spec.checked_row_bytes()?;
        }

        let root = path.as_ref().join(group);
        if root.exists() {
            if !allow_overwrite {
                return Err(Error::ExistingFile { path: root });
            }
            fs::remove_dir_all(&root).map_err(|e| Error::op("remove_store_group", e))?;
        }
        fs::create_dir_all(&root).map_err(|e| Error::op("create_store_group", e))?;

        let mut columns = BTreeMap::new();
        for (name, spec) in schema.iter() {
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create_new(true)
                .open(data_path(&root, name))
                .map_err(|e| Error::op("create_field_file", format!("{name}: {e}")))?;
            let column = Column {
                spec: spec.clone(),
                file,
            };
            column
                .resize(len)
                .map_err(|e| Error::op("allocate_field", format!("{name}: {e}")))?;
            columns.insert(name.to_string(), column);
        }

        let mut store = Self {
            root,
            group: group.to_string(),
            schema: schema.clone(),
            columns,
            len,
            capacity: len,
            growth: GrowthPolicy::default(),
            growth_events: 0,
            mode: Mode::Write,
            dirty: true,
            closed: false,
        };
        store.write_manifest()?;
        tracing::debug!(
            group = %store.root.display(),
            fields = store.schema.len(),
            rows = len,
            "Created store group"
        );
        Ok(store)
    }

    fn open(path: &Path, group: &str, mode: Mode) -> Result<Self> {
        validate_name("group", group)?;
        let root = path.join(group);
        let manifest_path = root.join(STORE_MANIFEST);
        let raw = fs::read_to_string(&manifest_path).map_err(|e| {
            Error::op(
                "read_store_manifest",
                format!("{}: {e}", manifest_path.display()),
            )
        })?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            Error::Schema(format!("{}: malformed manifest: {e}", root.display()))
        })?;
        if manifest.version != MANIFEST_VERSION {
            return Err(Error::Schema(format!(
                "{}: unsupported manifest version {}",
                root.display(),
                manifest.version
            )));
        }
        if manifest.fields.is_empty() {
            return Err(Error::Schema(format!("{}: group has no fields", root.display())));
        }

        let lengths: BTreeMap<&str, usize> = manifest
            .fields
            .iter()
            .map(|(name, field)| (name.as_str(), field.len))
            .collect();
        let mut distinct: Vec<usize> = lengths.values().copied().collect();
        distinct.sort_unstable();
        distinct.dedup();
        let len = match distinct.as_slice() {
            [len] => *len,
            _ => {
                return Err(Error::Schema(format!(
                    "{}: all fields must have the same length, found {lengths:?}",
                    root.display()
                )));
            },
        };

        let mut schema = StoreSchema::new();
        let mut columns = BTreeMap::new();
        for (name, field) in manifest.fields {
            validate_name("field", &name)?;
            let file = OpenOptions::new()
                .read(true)
                .write(mode == Mode::Write)
                .open(data_path(&root, &name))
                .map_err(|e| Error::op("open_field_file", format!("{name}: {e}")))?;
            let on_disk = file
                .metadata()
                .map_err(|e| Error::op("stat_field_file", format!("{name}: {e}")))?
                .len();
            let needed = field
                .spec
                .checked_row_bytes()
                .ok()
                .and_then(|row_bytes| row_bytes.checked_mul(len))
                .ok_or_else(|| {
                    Error::Schema(format!(
                        "field '{name}' with shape {:?} and {len} rows is too large",
                        field.spec.shape
                    ))
                })? as u64;
            if on_disk < needed {
                return Err(Error::Schema(format!(
                    "field '{name}' holds {on_disk} bytes, {len} rows need {needed}"
                )));
            }
            schema = schema.with_field(name.clone(), field.spec.clone());
            columns.insert(
                name,
                Column {
                    spec: field.spec,
                    file,
                },
            );
        }

        tracing::debug!(group = %root.display(), rows = len, "Opened store group");
        Ok(Self {
            root,
            group: group.to_string(),
            schema,
            columns,
            len,
            capacity: len,
            growth: GrowthPolicy::default(),
            growth_events: 0,
            mode,
            dirty: false,
            closed: false,
        })
    }

    /// Lists the groups of the store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` cannot be listed.
    pub fn groups(path: impl AsRef<Path>) -> Result<Vec<String>> {
        let path = path.as_ref();
        let entries = fs::read_dir(path)
            .map_err(|e| Error::op("list_store", format!("{}: {e}", path.display())))?;
        let mut groups: Vec<String> = entries
            .flatten()
            .filter(|entry| entry.path().join(STORE_MANIFEST).is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        groups.sort();
        Ok(groups)
    }

    /// Replaces the capacity growth policy.
    #[must_use]
    pub const fn with_growth(mut self, growth: GrowthPolicy) -> Self {
        self.growth = growth;
        self
    }

    /// Number of rows shared by every field.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the group has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows that fit before the next growth step.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the data files have been grown.
    #[must_use]
    pub const fn growth_events(&self) -> usize {
        self.growth_events
    }

    /// Field layouts.
    #[must_use]
    pub const fn schema(&self) -> &StoreSchema {
        &self.schema
    }

    /// Group name.
    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Directory holding this group.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Reads row `index` of every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len`.
    pub fn read_row(&self, index: usize) -> Result<Sample> {
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        let mut sample = Sample::new();
        for (name, column) in &self.columns {
            let bytes = column
                .read_rows(index..index + 1)
                .map_err(|e| Error::op("read_row", format!("{name}[{index}]: {e}")))?;
            let value = ArrayValue::from_bytes(column.spec.dtype, column.spec.shape.clone(), bytes)?;
            sample.insert(name.clone(), value);
        }
        Ok(sample)
    }

    /// Reads a contiguous range of rows of one field, stacked along a new leading axis.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown field and
    /// [`Error::IndexOutOfRange`] if the range ends past `len`.
    pub fn read_field_range(&self, name: &str, range: Range<usize>) -> Result<ArrayValue> {
        let column = self
            .columns
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown field '{name}'")))?;
        self.check_range(&range)?;
        let bytes = column
            .read_rows(range.clone())
            .map_err(|e| Error::op("read_range", format!("{name}[{range:?}]: {e}")))?;
        let mut shape = Vec::with_capacity(column.spec.shape.len() + 1);
        shape.push(range.len());
        shape.extend_from_slice(&column.spec.shape);
        ArrayValue::from_bytes(column.spec.dtype, shape, bytes)
    }

    /// Reads a contiguous range of rows of every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if the range ends past `len`.
    pub fn read_range(&self, range: Range<usize>) -> Result<RowBatch> {
        self.check_range(&range)?;
        let mut batch = RowBatch::new(range.len());
        for name in self.columns.keys() {
            batch.insert(name.clone(), self.read_field_range(name, range.clone())?)?;
        }
        Ok(batch)
    }

    /// Appends one row to every field.
    ///
    /// The row is validated against the schema before anything is written,
    /// so a rejected row leaves all fields at their previous length.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the row does not carry exactly the schema
    /// fields with matching layouts.
    pub fn append(&mut self, row: &Sample) -> Result<()> {
        self.ensure_writable()?;
        self.schema.check_row(row)?;
        let index = self.len;
        self.reserve(index + 1)?;
        self.write_sample(index, row)?;
        self.len += 1;
        self.dirty = true;
        metrics::counter!("sampleconv_rows_appended_total").increment(1);
        Ok(())
    }

    /// Overwrites existing row `index` of every field.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IndexOutOfRange`] if `index >= len` and
    /// [`Error::Schema`] for a row that does not match the schema.
    pub fn write_row(&mut self, index: usize, row: &Sample) -> Result<()> {
        self.ensure_writable()?;
        if index >= self.len {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        self.schema.check_row(row)?;
        self.write_sample(index, row)?;
        self.dirty = true;
        Ok(())
    }

    /// Writes a contiguous batch starting at row `start`.
    ///
    /// `start` may be at most `len`; rows past the current end extend the store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the batch does not carry exactly the
    /// schema fields, and [`Error::InvalidInput`] if `start > len`.
    pub fn write_range(&mut self, start: usize, batch: &RowBatch) -> Result<()> {
        self.ensure_writable()?;
        if start > self.len {
            return Err(Error::InvalidInput(format!(
                "write at row {start} would leave a gap after row {}",
                self.len
            )));
        }
        for (name, spec) in self.schema.iter() {
            let column = batch
                .column(name)
                .ok_or_else(|| Error::Schema(format!("batch is missing field '{name}'")))?;
            if column.dtype() != spec.dtype || column.shape()[1..] != spec.shape[..] {
                return Err(Error::Schema(format!(
                    "batch field '{name}' has {} {:?}, expected {} (rows, {:?})",
                    column.dtype(),
                    column.shape(),
                    spec.dtype,
                    spec.shape
                )));
            }
        }
        if let Some((extra, _)) = batch.columns().find(|(name, _)| !self.schema.contains(name)) {
            return Err(Error::Schema(format!("batch has unexpected field '{extra}'")));
        }

        let end = start + batch.rows();
        self.reserve(end)?;
        for (name, column) in &self.columns {
            if let Some(values) = batch.column(name) {
                column
                    .write_rows(start, values.as_bytes())
                    .map_err(|e| Error::op("write_range", format!("{name}: {e}")))?;
            }
        }
        self.len = self.len.max(end);
        self.dirty = true;
        Ok(())
    }

    /// Syncs data files and rewrites the manifest.
    ///
    /// Spare capacity is kept; see [`ColumnarStore::close`].
    ///
    /// # Errors
    ///
    /// Returns an error if syncing or writing the manifest fails.
    pub fn flush(&mut self) -> Result<()> {
        if self.mode == Mode::Read || !self.dirty {
            return Ok(());
        }
        for (name, column) in &self.columns {
            column
                .file
                .sync_data()
                .map_err(|e| Error::op("sync_field_file", format!("{name}: {e}")))?;
        }
        self.write_manifest()?;
        self.dirty = false;
        Ok(())
    }

    /// Trims spare capacity, flushes, and releases the store.
    ///
    /// # Errors
    ///
    /// Returns an error if trimming or flushing fails.
    pub fn close(mut self) -> Result<()> {
        let result = self.finish();
        self.closed = true;
        result
    }

    fn finish(&mut self) -> Result<()> {
        if self.mode == Mode::Read {
            return Ok(());
        }
        if self.capacity > self.len {
            for (name, column) in &self.columns {
                column
                    .resize(self.len)
                    .map_err(|e| Error::op("trim_field_file", format!("{name}: {e}")))?;
            }
            self.capacity = self.len;
            self.dirty = true;
        }
        self.flush()?;
        tracing::debug!(group = %self.root.display(), rows = self.len, "Closed store group");
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.mode == Mode::Read {
            return Err(Error::InvalidInput(format!(
                "store group '{}' is opened read-only",
                self.group
            )));
        }
        Ok(())
    }

    fn check_range(&self, range: &Range<usize>) -> Result<()> {
        if range.start > range.end || range.end > self.len {
            return Err(Error::IndexOutOfRange {
                index: range.end.saturating_sub(1).max(range.start),
                len: self.len,
            });
        }
        Ok(())
    }

    fn reserve(&mut self, needed: usize) -> Result<()> {
        if needed <= self.capacity {
            return Ok(());
        }
        let capacity = self.growth.next_capacity(self.capacity, needed);
        for (name, column) in &self.columns {
            column
                .resize(capacity)
                .map_err(|e| Error::op("grow_field_file", format!("{name}: {e}")))?;
        }
        tracing::trace!(
            group = %self.group,
            from = self.capacity,
            to = capacity,
            "Grew store capacity"
        );
        self.capacity = capacity;
        self.growth_events += 1;
        metrics::counter!("sampleconv_store_grow_total").increment(1);
        Ok(())
    }

    fn write_sample(&self, index: usize, row: &Sample) -> Result<()> {
        for (name, column) in &self.columns {
            if let Some(value) = row.get(name) {
                column
                    .write_rows(index, value.as_bytes())
                    .map_err(|e| Error::op("write_row", format!("{name}[{index}]: {e}")))?;
            }
        }
        Ok(())
    }

    fn write_manifest(&self) -> Result<()> {
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            fields: self
                .columns
                .iter()
                .map(|(name, column)| {
                    (
                        name.clone(),
                        FieldManifest {
                            spec: column.spec.clone(),
                            len: self.len,
                        },
                    )
                })
                .collect(),
        };
        let content = serde_json::to_string_pretty(&manifest)
            .map_err(|e| Error::op("serialize_store_manifest", e))?;
        let tmp = self.root.join(format!("{STORE_MANIFEST}.tmp"));
        fs::write(&tmp, content).map_err(|e| Error::op("write_store_manifest", e))?;
        fs::rename(&tmp, self.root.join(STORE_MANIFEST))
            .map_err(|e| Error::op("write_store_manifest", e))
    }
}

impl Drop for ColumnarStore {
    fn drop(&mut self) {
        if self.closed || self.mode == Mode::Read {
            return;
        }
        if let Err(e) = self.finish() {
            tracing::error!(group = %self.root.display(), error = %e, "Failed to flush store on drop");
        }
    }
}

fn data_path(root: &Path, field: &str) -> PathBuf {
    root.join(format!("{field}.{DATA_EXTENSION}"))
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || name.starts_with(STORE_MANIFEST);
    if invalid {
        return Err(Error::InvalidInput(format!("invalid {kind} name '{name}'")));
    }
    Ok(())
}

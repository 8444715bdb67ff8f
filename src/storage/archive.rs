//! Single-sample archive files.
//!
//! An archive stores one [`Sample`] in one self-contained file:
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Magic: "SMPARCH\0" (8 bytes)                 │
//! │ Version: u32 LE                              │
//! │ Header length: u64 LE                        │
//! ├──────────────────────────────────────────────┤
//! │ JSON header                                  │
//! │   fields: [{name, dtype, shape, offset,      │
//! │             nbytes}]                         │
//! │   metadata: {key: scalar}                    │
//! ├──────────────────────────────────────────────┤
//! │ Payload: raw little-endian field data,       │
//! │ addressed by (offset, nbytes)                │
//! └──────────────────────────────────────────────┘
//! ```

use super::naming::NamingTemplate;
use crate::models::{ArrayValue, DType, Sample, Scalar};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

const MAGIC: &[u8; 8] = b"SMPARCH\0";
const FORMAT_VERSION: u32 = 1;
const PREAMBLE_LEN: usize = 8 + 4 + 8;

#[derive(Debug, Serialize, Deserialize)]
struct ArchiveHeader {
    fields: Vec<FieldEntry>,
    #[serde(default)]
    metadata: BTreeMap<String, Scalar>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FieldEntry {
    name: String,
    dtype: DType,
    shape: Vec<usize>,
    offset: u64,
    nbytes: u64,
}

/// Loads and saves single-sample archive files.
pub struct ArchiveCodec;

impl ArchiveCodec {
    /// Saves `sample` to `path`, creating parent directories as needed.
    ///
    /// With `allow_overwrite == false` the file is created exclusively, so an
    /// existing file is never modified.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExistingFile`] if `path` exists and overwriting is
    /// disallowed, or [`Error::OperationFailed`] on I/O failure.
    pub fn save(path: &Path, sample: &Sample, allow_overwrite: bool) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::op("create_archive_dir", e))?;
        }

        let mut options = OpenOptions::new();
        options.write(true);
        if allow_overwrite {
            options.create(true).truncate(true);
        } else {
            options.create_new(true);
        }
        let file = options.open(path).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                Error::ExistingFile {
                    path: path.to_path_buf(),
                }
            } else {
                Error::op("open_archive", format!("{}: {e}", path.display()))
            }
        })?;

        let bytes = Self::encode(sample)?;
        let mut writer = BufWriter::new(file);
        writer
            .write_all(&bytes)
            .and_then(|()| writer.flush())
            .map_err(|e| Error::op("write_archive", format!("{}: {e}", path.display())))
    }

    /// Loads the sample stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchive`] if the file is malformed, or
    /// [`Error::OperationFailed`] if it cannot be read.
    pub fn load(path: &Path) -> Result<Sample> {
        let bytes = fs::read(path)
            .map_err(|e| Error::op("read_archive", format!("{}: {e}", path.display())))?;
        Self::decode(&bytes).map_err(|reason| Error::InvalidArchive {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Encodes a sample into archive bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the header cannot be serialized.
    pub fn encode(sample: &Sample) -> Result<Vec<u8>> {
        let mut fields = Vec::with_capacity(sample.len());
        let mut offset = 0u64;
        for (name, value) in sample.fields() {
            let nbytes = value.as_bytes().len() as u64;
            fields.push(FieldEntry {
                name: name.to_string(),
                dtype: value.dtype(),
                shape: value.shape().to_vec(),
                offset,
                nbytes,
            });
            offset += nbytes;
        }
        let header = ArchiveHeader {
            fields,
            metadata: sample.metadata().clone(),
        };
        let header_bytes =
            serde_json::to_vec(&header).map_err(|e| Error::op("serialize_archive_header", e))?;

        let payload_len = usize::try_from(offset).map_err(|e| Error::op("encode_archive", e))?;
        let mut out = Vec::with_capacity(PREAMBLE_LEN + header_bytes.len() + payload_len);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
        out.extend_from_slice(&header_bytes);
        for (_, value) in sample.fields() {
            out.extend_from_slice(value.as_bytes());
        }
        Ok(out)
    }

    /// Decodes archive bytes. Errors are returned as a plain reason string.
    fn decode(bytes: &[u8]) -> std::result::Result<Sample, String> {
        if bytes.len() < PREAMBLE_LEN {
            return Err(format!("file is {} bytes, shorter than the preamble", bytes.len()));
        }
        if &bytes[..8] != MAGIC {
            return Err("bad magic bytes".to_string());
        }
        let version = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
        if version != FORMAT_VERSION {
            return Err(format!("unsupported format version {version}"));
        }
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&bytes[12..20]);
        let header_len = usize::try_from(u64::from_le_bytes(len_bytes))
            .map_err(|e| format!("header length: {e}"))?;
        let payload_start = PREAMBLE_LEN
            .checked_add(header_len)
            .filter(|end| *end <= bytes.len())
            .ok_or_else(|| "header extends past end of file".to_string())?;

        let header: ArchiveHeader = serde_json::from_slice(&bytes[PREAMBLE_LEN..payload_start])
            .map_err(|e| format!("header: {e}"))?;
        let payload = &bytes[payload_start..];

        let mut sample = Sample::new();
        for entry in header.fields {
            let start = usize::try_from(entry.offset).map_err(|e| e.to_string())?;
            let len = usize::try_from(entry.nbytes).map_err(|e| e.to_string())?;
            let end = start
                .checked_add(len)
                .filter(|end| *end <= payload.len())
                .ok_or_else(|| format!("field '{}' extends past end of file", entry.name))?;
            let value =
                ArrayValue::from_bytes(entry.dtype, entry.shape, payload[start..end].to_vec())
                    .map_err(|e| format!("field '{}': {e}", entry.name))?;
            if sample.insert(entry.name.clone(), value).is_some() {
                return Err(format!("field '{}' appears twice", entry.name));
            }
        }
        *sample.metadata_mut() = header.metadata;
        Ok(sample)
    }
}

/// Writes a sequence of samples as numbered archives in one directory.
///
/// Each call to [`ArchiveWriter::write`] names a new file from the template
/// and the running counter, then advances the counter.
pub struct ArchiveWriter {
    output_dir: PathBuf,
    template: NamingTemplate,
    allow_overwrite: bool,
    next_index: u64,
}

impl ArchiveWriter {
    /// Creates a writer whose first archive gets index `start_index`.
    #[must_use]
    pub fn new(
        output_dir: impl Into<PathBuf>,
        template: NamingTemplate,
        allow_overwrite: bool,
        start_index: u64,
    ) -> Self {
        Self {
            output_dir: output_dir.into(),
            template,
            allow_overwrite,
            next_index: start_index,
        }
    }

    /// Index the next archive will get.
    #[must_use]
    pub const fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes one sample and returns the path it was saved to.
    ///
    /// # Errors
    ///
    /// Propagates [`ArchiveCodec::save`] errors. The counter only advances on success.
    pub fn write(&mut self, sample: &Sample) -> Result<PathBuf> {
        let path = self
            .output_dir
            .join(self.template.file_name(self.next_index));
        ArchiveCodec::save(&path, sample, self.allow_overwrite)?;
        self.next_index += 1;
        metrics::counter!("sampleconv_archives_written_total").increment(1);
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> Sample {
        Sample::new()
            .with_field(
                "pos",
                ArrayValue::from_vec(vec![2, 3], vec![1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap(),
            )
            .with_field("label", ArrayValue::scalar(7u8))
            .with_metadata("stamp", Scalar::Float(12.5))
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("a.sample");

        ArchiveCodec::save(&path, &sample(), false).unwrap();
        let loaded = ArchiveCodec::load(&path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_existing_file_is_left_unchanged() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.sample");
        ArchiveCodec::save(&path, &sample(), false).unwrap();
        let before = fs::read(&path).unwrap();

        let other = Sample::new().with_field("x", ArrayValue::scalar(1i32));
        let err = ArchiveCodec::save(&path, &other, false).unwrap_err();
        assert!(matches!(err, Error::ExistingFile { .. }));
        assert_eq!(fs::read(&path).unwrap(), before);

        ArchiveCodec::save(&path, &other, true).unwrap();
        assert_eq!(ArchiveCodec::load(&path).unwrap(), other);
    }

    #[test]
    fn test_truncated_archive_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.sample");
        let bytes = ArchiveCodec::encode(&sample()).unwrap();
        fs::write(&path, &bytes[..bytes.len() - 3]).unwrap();

        let err = ArchiveCodec::load(&path).unwrap_err();
        assert!(matches!(err, Error::InvalidArchive { .. }));
    }

    #[test]
    fn test_overflowing_shape_is_invalid_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("huge.sample");
        let header = ArchiveHeader {
            fields: vec![FieldEntry {
                name: "x".to_string(),
                dtype: DType::U8,
                shape: vec![1 << 63, 2],
                offset: 0,
                nbytes: 0,
            }],
            metadata: BTreeMap::new(),
        };
        let header_bytes = serde_json::to_vec(&header).unwrap();
        let mut bytes = MAGIC.to_vec();
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(header_bytes.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&header_bytes);
        fs::write(&path, bytes).unwrap();

        let err = ArchiveCodec::load(&path).unwrap_err();
        assert!(
            matches!(err, Error::InvalidArchive { ref reason, .. } if reason.contains("too large")),
            "{err}"
        );
    }

    #[test]
    fn test_bad_magic_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.sample");
        fs::write(&path, b"PK\x03\x04 definitely not an archive").unwrap();
        assert!(matches!(
            ArchiveCodec::load(&path),
            Err(Error::InvalidArchive { .. })
        ));
    }

    #[test]
    fn test_writer_numbers_files() {
        let dir = TempDir::new().unwrap();
        let mut writer = ArchiveWriter::new(dir.path(), NamingTemplate::indexed("dp", 3), false, 5);

        let first = writer.write(&sample()).unwrap();
        let second = writer.write(&sample()).unwrap();
        assert_eq!(first.file_name().unwrap(), "dp005.sample");
        assert_eq!(second.file_name().unwrap(), "dp006.sample");
        assert_eq!(writer.next_index(), 7);
    }

    #[test]
    fn test_writer_does_not_advance_on_conflict() {
        let dir = TempDir::new().unwrap();
        let template = NamingTemplate::indexed("dp", 1);
        ArchiveCodec::save(&dir.path().join("dp0.sample"), &sample(), false).unwrap();

        let mut writer = ArchiveWriter::new(dir.path(), template, false, 0);
        assert!(writer.write(&sample()).is_err());
        assert_eq!(writer.next_index(), 0);
    }
}

//! Sorted iteration over a directory of archives.

use super::archive::ArchiveCodec;
use crate::models::Sample;
use crate::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Lazy, finite iterator over the archives in a directory.
///
/// Candidate files are collected once at construction and sorted by path,
/// so pivot selection and row order are reproducible across runs and
/// filesystems. Each archive is loaded only when the iterator reaches it.
/// The scanner cannot be restarted; build a new one to rescan.
pub struct ArchiveScanner {
    paths: Vec<PathBuf>,
    skipped: usize,
    cursor: usize,
}

impl ArchiveScanner {
    /// Scans `dir` for files whose name matches the `*`-glob `pattern`.
    ///
    /// With `recursive` the whole tree below `dir` is scanned.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` (or a subdirectory) cannot be listed.
    pub fn new(dir: &Path, pattern: &str, recursive: bool) -> Result<Self> {
        let mut paths = Vec::new();
        let mut skipped = 0;
        collect(dir, pattern, recursive, &mut paths, &mut skipped)?;
        paths.sort();
        tracing::debug!(
            dir = %dir.display(),
            pattern,
            recursive,
            count = paths.len(),
            skipped,
            "Scanned archive directory"
        );
        Ok(Self {
            paths,
            skipped,
            cursor: 0,
        })
    }

    /// All matched paths in iteration order.
    #[must_use]
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// Total number of matched archives, consumed or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Directory entries that could not be inspected and were left out.
    ///
    /// Each one is logged at `warn`. Entries that merely do not match the
    /// pattern are not counted.
    #[must_use]
    pub const fn skipped(&self) -> usize {
        self.skipped
    }

    /// Returns whether no archives matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path of the archive most recently yielded.
    #[must_use]
    pub fn last_path(&self) -> Option<&Path> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.paths.get(i))
            .map(PathBuf::as_path)
    }
}

impl Iterator for ArchiveScanner {
    type Item = (PathBuf, Result<Sample>);

    fn next(&mut self) -> Option<Self::Item> {
        let path = self.paths.get(self.cursor)?.clone();
        self.cursor += 1;
        let sample = ArchiveCodec::load(&path);
        Some((path, sample))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.paths.len() - self.cursor;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArchiveScanner {}

fn collect(
    dir: &Path,
    pattern: &str,
    recursive: bool,
    out: &mut Vec<PathBuf>,
    skipped: &mut usize,
) -> Result<()> {
    let entries = fs::read_dir(dir)
        .map_err(|e| Error::op("list_archive_dir", format!("{}: {e}", dir.display())))?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory entry");
                *skipped += 1;
                continue;
            },
        };
        let path = entry.path();
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Skipping entry of unknown type");
                *skipped += 1;
                continue;
            },
        };
        if file_type.is_dir() {
            if recursive {
                collect(&path, pattern, recursive, out, skipped)?;
            }
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            tracing::warn!(path = %path.display(), "Skipping entry with a non UTF-8 name");
            *skipped += 1;
            continue;
        };
        if matches_glob(pattern, &name) {
            out.push(path);
        }
    }
    Ok(())
}

/// Simple glob pattern matching with `*` wildcards.
#[must_use]
pub fn matches_glob(pattern: &str, text: &str) -> bool {
    if !pattern.contains('*') {
        return pattern == text;
    }

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts.first().copied().unwrap_or("");
    let last = parts.last().copied().unwrap_or("");

    if !text.starts_with(first) {
        return false;
    }
    let mut remaining = &text[first.len()..];

    // Middle parts must appear in order; the suffix is anchored at the end.
    for part in &parts[1..parts.len() - 1] {
        if part.is_empty() {
            continue;
        }
        match remaining.find(part) {
            Some(pos) => remaining = &remaining[pos + part.len()..],
            None => return false,
        }
    }

    remaining.len() >= last.len() && remaining.ends_with(last)
}

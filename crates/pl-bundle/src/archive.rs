//! ZIP writer for fragment directories.
//!
//! Remote filesystem streams are append-only while the ZIP writer needs to
//! seek, so each archive is spooled to an anonymous temp file first and then
//! copied to the output in one pass.

use crate::{BundleError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Largest file size accepted into an archive, exclusive.
///
/// Keeping every entry below the signed 32-bit ceiling keeps the container
/// readable without ZIP64 extensions.
pub const MAX_ENTRY_SIZE: u64 = i32::MAX as u64;

/// Per-entry compression of the archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    #[default]
    Deflated,
    Stored,
}

impl Compression {
    fn method(self) -> CompressionMethod {
        match self {
            Compression::Deflated => CompressionMethod::Deflated,
            Compression::Stored => CompressionMethod::Stored,
        }
    }
}

/// Summary of one written archive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub entries: usize,
    /// Bytes read from the fragment directory.
    pub uncompressed_bytes: u64,
}

/// Packs the files of one fragment directory into a ZIP container.
#[derive(Debug, Clone)]
pub struct FragmentArchiver {
    compression: Compression,
    size_limit: u64,
}

impl Default for FragmentArchiver {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentArchiver {
    pub fn new() -> Self {
        Self {
            compression: Compression::default(),
            size_limit: MAX_ENTRY_SIZE,
        }
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Override the entry size ceiling.
    pub fn with_size_limit(mut self, limit: u64) -> Self {
        self.size_limit = limit;
        self
    }

    pub fn size_limit(&self) -> u64 {
        self.size_limit
    }

    /// Write every regular file directly inside `directory` into `out`.
    ///
    /// Subdirectories are not descended into. Entries are added in file name
    /// order. A file whose size is at or above the size limit aborts the
    /// archive with [`BundleError::EntryTooLarge`] before its entry is started.
    /// Nothing reaches `out` unless the whole archive was built. The caller
    /// owns `out` and is responsible for closing it.
    pub fn write<W: Write>(&self, directory: &Path, out: &mut W) -> Result<ArchiveStats> {
        if !directory.is_dir() {
            return Err(BundleError::NotADirectory(directory.to_path_buf()));
        }

        let files = list_files(directory)?;
        let options = SimpleFileOptions::default().compression_method(self.compression.method());
        let mut zip = ZipWriter::new(tempfile::tempfile()?);
        let mut stats = ArchiveStats::default();

        for (path, size) in files {
            info!(
                file = %path.display(),
                size,
                total = stats.uncompressed_bytes,
                "adding file to archive"
            );
            if size >= self.size_limit {
                return Err(BundleError::EntryTooLarge {
                    path,
                    size,
                    limit: self.size_limit,
                });
            }
            let name = entry_name(&path)?;
            zip.start_file(name, options)?;
            let mut source = File::open(&path)?;
            stats.uncompressed_bytes += io::copy(&mut source, &mut zip)?;
            stats.entries += 1;
        }

        let mut spool = zip.finish()?;
        spool.seek(SeekFrom::Start(0))?;
        io::copy(&mut spool, out)?;
        out.flush()?;
        debug!(
            directory = %directory.display(),
            entries = stats.entries,
            bytes = stats.uncompressed_bytes,
            "archive finished"
        );
        Ok(stats)
    }
}

/// Regular files directly inside `directory`, sorted by name, with sizes.
fn list_files(directory: &Path) -> Result<Vec<(PathBuf, u64)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(directory)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        files.push((entry.path(), metadata.len()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn entry_name(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| BundleError::InvalidEntryName(path.to_path_buf()))
}

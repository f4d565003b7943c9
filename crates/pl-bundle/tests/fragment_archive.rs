//! Integration tests for fragment archiving.
//!
//! Archives are written to in-memory sinks and read back with the ZIP reader.

use pl_bundle::{BundleError, Compression, FragmentArchiver};
use std::fs;
use std::io::{Cursor, Read, Write};
use tempfile::TempDir;

fn make_fragment() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("columns.txt"), "columns format version: 1\n").unwrap();
    fs::write(dir.path().join("count.txt"), "3").unwrap();
    fs::write(dir.path().join("data.bin"), vec![7u8; 4096]).unwrap();
    fs::create_dir(dir.path().join("projections")).unwrap();
    fs::write(dir.path().join("projections").join("inner.bin"), b"skip").unwrap();
    dir
}

fn read_entries(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive.by_index(i).unwrap();
        let mut content = Vec::new();
        file.read_to_end(&mut content).unwrap();
        entries.push((file.name().to_string(), content));
    }
    entries
}

#[test]
fn archives_top_level_files_by_base_name() {
    let fragment = make_fragment();
    let mut out = Vec::new();
    let stats = FragmentArchiver::new()
        .write(fragment.path(), &mut out)
        .unwrap();

    assert_eq!(stats.entries, 3);
    assert_eq!(stats.uncompressed_bytes, 26 + 1 + 4096);

    let entries = read_entries(out);
    let names: Vec<_> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(names, vec!["columns.txt", "count.txt", "data.bin"]);
    assert_eq!(entries[1].1, b"3");
    assert_eq!(entries[2].1.len(), 4096);
}

#[test]
fn stored_archives_are_readable() {
    let fragment = make_fragment();
    let mut out = Vec::new();
    FragmentArchiver::new()
        .with_compression(Compression::Stored)
        .write(fragment.path(), &mut out)
        .unwrap();

    let mut archive = zip::ZipArchive::new(Cursor::new(out)).unwrap();
    let file = archive.by_name("data.bin").unwrap();
    assert_eq!(file.compression(), zip::CompressionMethod::Stored);
    assert_eq!(file.size(), 4096);
}

#[test]
fn empty_fragment_yields_empty_archive() {
    let dir = TempDir::new().unwrap();
    let mut out = Vec::new();
    let stats = FragmentArchiver::new().write(dir.path(), &mut out).unwrap();
    assert_eq!(stats.entries, 0);
    assert!(read_entries(out).is_empty());
}

#[test]
fn oversized_file_aborts_before_its_entry() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("a_small.txt"), b"ok").unwrap();
    fs::write(dir.path().join("b_huge.bin"), vec![1u8; 64]).unwrap();
    fs::write(dir.path().join("c_after.txt"), b"never").unwrap();

    let mut out = Vec::new();
    let err = FragmentArchiver::new()
        .with_size_limit(64)
        .write(dir.path(), &mut out)
        .unwrap_err();

    match err {
        BundleError::EntryTooLarge { path, size, .. } => {
            assert!(path.ends_with("b_huge.bin"));
            assert_eq!(size, 64);
        }
        other => panic!("unexpected error: {other}"),
    }
    // A failed archive leaves the destination untouched.
    assert!(out.is_empty());
}

/// Destination that is append-only, like a remote upload stream.
struct AppendOnly(Vec<u8>);

impl Write for AppendOnly {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn archives_into_a_non_seekable_output() {
    let dir = make_fragment();
    let mut out = AppendOnly(Vec::new());
    let stats = FragmentArchiver::new().write(dir.path(), &mut out).unwrap();
    let entries = read_entries(out.0);
    assert_eq!(entries.len(), stats.entries);
    assert!(stats.entries > 0);
}

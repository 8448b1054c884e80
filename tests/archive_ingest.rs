//! Archive and compression ingestion matrix.
//!
//! # Scope
//! These tests synthesize real archives on disk (tar and cpio from raw
//! bytes, zip via the `zip` writer) with and without compression wrappers,
//! run the full walker/pool pipeline, and assert on member attribution
//! (`archive::member` display names) and member filtering.

use lexgrep::config::{CategorySet, Config};
use lexgrep::{Matcher, Pool, Summary, Walker};
use regex::bytes::Regex;
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Fixture builders
// ---------------------------------------------------------------------------

/// Append one ustar member.
fn tar_member(out: &mut Vec<u8>, name: &str, data: &[u8]) {
    let mut header = [0u8; 512];
    header[..name.len()].copy_from_slice(name.as_bytes());
    header[100..107].copy_from_slice(b"0000644");
    let size = format!("{:011o}", data.len());
    header[124..135].copy_from_slice(size.as_bytes());
    header[136..147].copy_from_slice(b"00000000000");
    header[156] = b'0';
    header[257..263].copy_from_slice(b"ustar\0");
    header[263..265].copy_from_slice(b"00");
    header[148..156].fill(b' ');
    let sum: u32 = header.iter().map(|&b| b as u32).sum();
    header[148..156].copy_from_slice(format!("{sum:06o}\0 ").as_bytes());

    out.extend_from_slice(&header);
    out.extend_from_slice(data);
    out.resize(out.len() + (512 - data.len() % 512) % 512, 0);
}

fn tar_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in members {
        tar_member(&mut out, name, data);
    }
    out.resize(out.len() + 1024, 0);
    out
}

/// Append one newc cpio member.
fn cpio_member(out: &mut Vec<u8>, name: &str, mode: u64, data: &[u8]) {
    out.extend_from_slice(b"070701");
    for field in [
        1,
        mode,
        0,
        0,
        1,
        0,
        data.len() as u64,
        0,
        0,
        0,
        0,
        name.len() as u64 + 1,
        0,
    ] {
        out.extend_from_slice(format!("{field:08X}").as_bytes());
    }
    out.extend_from_slice(name.as_bytes());
    out.push(0);
    while out.len() % 4 != 0 {
        out.push(0);
    }
    out.extend_from_slice(data);
    while out.len() % 4 != 0 {
        out.push(0);
    }
}

fn cpio_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, data) in members {
        cpio_member(&mut out, name, 0o100644, data);
    }
    cpio_member(&mut out, "TRAILER!!!", 0, b"");
    out
}

fn zip_bytes(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(io::Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn gz_bytes(data: &[u8]) -> Vec<u8> {
    let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn bz2_bytes(data: &[u8]) -> Vec<u8> {
    let mut enc = bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
    enc.write_all(data).unwrap();
    enc.finish().unwrap()
}

fn zst_bytes(data: &[u8]) -> Vec<u8> {
    zstd::encode_all(io::Cursor::new(data), 0).unwrap()
}

// ---------------------------------------------------------------------------
// Pipeline driver
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct VecSink(Arc<Mutex<Vec<u8>>>);

impl io::Write for VecSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn scan_paths<P: AsRef<Path>>(paths: &[P], selector: &str, pattern: &str) -> (String, Summary) {
    let (cats, _) = CategorySet::parse(selector);
    let cfg = Config {
        cats,
        pattern: pattern.into(),
        paths: paths
            .iter()
            .map(|p| p.as_ref().to_string_lossy().into_owned())
            .collect(),
        workers: 2,
        subject_only: true,
        recursive: false,
        visible_only: true,
        header: true,
        line_numbers: false,
        list: String::new(),
        log: String::new(),
        output: String::new(),
        grep: false,
        unordered: false,
        summary: false,
    };
    let matcher = Arc::new(Matcher::new(Regex::new(pattern).unwrap(), cats, None));
    let sink = VecSink::default();
    let mut pool = Pool::new(Arc::new(cfg.clone()), matcher, Box::new(sink.clone()));
    Walker::new(&cfg, &mut pool).run();
    let summary = pool.finish();
    let out = String::from_utf8(sink.0.lock().unwrap().clone()).unwrap();
    (out, summary)
}

const WITH_IF: &[u8] = b"package a\n\nif x == 1 {}\n";
const WITHOUT_IF: &[u8] = b"package b\n\nvar y = 2\n";

/// `tempfile`'s default `.tmp` prefix is a hidden path segment, which the
/// walker's visibility filter would prune; use a visible prefix.
fn scratch_dir() -> TempDir {
    tempfile::Builder::new()
        .prefix("lexgrep-archive")
        .tempdir()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn tar_members_are_attributed() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.tar");
    std::fs::write(&path, tar_bytes(&[("a.go", WITH_IF), ("b.go", WITHOUT_IF)])).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.files, 2);
    assert_eq!(summary.matches, 1);
    assert!(out.contains("pkg.tar::a.go:if x == 1 {}"));
    assert!(!out.contains("b.go"));
}

#[test]
fn gzipped_tar_keeps_original_display_name() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.tar.gz");
    std::fs::write(
        &path,
        gz_bytes(&tar_bytes(&[("a.go", WITH_IF), ("b.go", WITHOUT_IF)])),
    )
    .unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.matches, 1);
    assert!(out.contains("pkg.tar.gz::a.go:"));
    assert!(!out.contains("b.go"));
}

#[test]
fn zip_members_are_attributed() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.zip");
    std::fs::write(&path, zip_bytes(&[("a.go", WITH_IF), ("b.go", WITHOUT_IF)])).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.files, 2);
    assert!(out.contains("pkg.zip::a.go:if x == 1 {}"));
}

#[test]
fn zstd_zip_is_unwrapped_then_iterated() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.zip.zst");
    std::fs::write(&path, zst_bytes(&zip_bytes(&[("a.go", WITH_IF)]))).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.matches, 1);
    assert!(out.contains("pkg.zip.zst::a.go:"));
}

#[test]
fn cpio_members_are_attributed() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.cpio");
    std::fs::write(&path, cpio_bytes(&[("a.go", WITH_IF), ("b.go", WITHOUT_IF)])).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.files, 2);
    assert!(out.contains("pkg.cpio::a.go:"));
}

#[test]
fn bzipped_cpio_is_unwrapped() {
    let dir = scratch_dir();
    let path = dir.path().join("pkg.cpio.bz2");
    std::fs::write(&path, bz2_bytes(&cpio_bytes(&[("a.go", WITH_IF)]))).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.matches, 1);
    assert!(out.contains("pkg.cpio.bz2::a.go:"));
}

#[test]
fn non_subject_members_are_skipped() {
    let dir = scratch_dir();
    let path = dir.path().join("mixed.tar");
    std::fs::write(
        &path,
        tar_bytes(&[("a.go", WITH_IF), ("README.md", WITH_IF)]),
    )
    .unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.files, 1);
    assert!(out.contains("a.go"));
    assert!(!out.contains("README"));
}

#[test]
fn compressed_member_inside_archive_is_decompressed() {
    let dir = scratch_dir();
    let path = dir.path().join("deep.tar");
    std::fs::write(&path, tar_bytes(&[("m.go.gz", &gz_bytes(WITH_IF))])).unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert_eq!(summary.matches, 1);
    // The worker strips the member's compression suffix for display.
    assert!(out.contains("deep.tar::m.go:if x == 1 {}"));
}

#[test]
fn corrupt_archive_is_skipped_without_aborting() {
    let dir = scratch_dir();
    let bad = dir.path().join("bad.tar.gz");
    std::fs::write(&bad, b"definitely not gzip").unwrap();
    let good = dir.path().join("good.go");
    std::fs::write(&good, WITH_IF).unwrap();

    let (out, summary) = scan_paths(&[&bad, &good], "k", "if");
    assert_eq!(summary.matches, 1);
    assert!(out.contains("good.go:"));
}

#[test]
fn corrupt_compressed_source_counts_as_error() {
    let dir = scratch_dir();
    let path = dir.path().join("bad.go.gz");
    std::fs::write(&path, b"junk junk junk").unwrap();

    let (out, summary) = scan_paths(&[&path], "k", "if");
    assert!(out.is_empty());
    assert_eq!(summary.files, 1);
    assert_eq!(summary.errors, 1);
}

#[test]
fn plain_compressed_sources_scan() {
    let dir = scratch_dir();
    for (name, bytes) in [
        ("a.go.gz", gz_bytes(WITH_IF)),
        ("a.go.bz2", bz2_bytes(WITH_IF)),
        ("a.go.zst", zst_bytes(WITH_IF)),
    ] {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        let (out, summary) = scan_paths(&[&path], "k", "if");
        assert_eq!(summary.matches, 1, "{name}");
        // Display name is the decompressed spelling.
        assert!(out.contains("a.go:"), "{name}: {out}");
    }
}

#[test]
fn archives_found_in_directory_walks_are_not_expanded() {
    let dir = scratch_dir();
    std::fs::write(dir.path().join("a.go"), WITH_IF).unwrap();
    std::fs::write(
        dir.path().join("pkg.tar"),
        tar_bytes(&[("inner.go", WITH_IF)]),
    )
    .unwrap();

    let (out, summary) = scan_paths(&[dir.path()], "k", "if");
    // Only explicitly named archives are iterated; the directory walk
    // filters on the subject extension.
    assert_eq!(summary.files, 1);
    assert!(out.contains("a.go:"));
    assert!(!out.contains("inner.go"));
}

#![cfg(feature = "cli")]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a mimedb command
fn mimedb_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mimedb"))
}

fn write_mime_file(data_dir: &Path, name: &str, contents: &[u8]) {
    let mime_dir = data_dir.join("mime");
    fs::create_dir_all(&mime_dir).unwrap();
    fs::write(mime_dir.join(name), contents).unwrap();
}

fn sample_tree() -> TempDir {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"55:application/x-compressed-tar:*.tar.gz\n50:application/gzip:*.gz\n50:text/x-python:*.py\n",
    );
    write_mime_file(tmp.path(), "subclasses", b"text/x-python text/plain\n");
    write_mime_file(tmp.path(), "icons", b"text/x-python:python-icon\n");
    let mut magic = Vec::from(&b"MIME-Magic\0\n"[..]);
    magic.extend_from_slice(b"[50:image/png]\n>0=");
    magic.extend_from_slice(&8u16.to_be_bytes());
    magic.extend_from_slice(b"\x89PNG\r\n\x1a\n");
    magic.push(b'\n');
    write_mime_file(tmp.path(), "magic", &magic);
    tmp
}

#[test]
fn test_help() {
    mimedb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Resolve MIME types from the shared MIME database",
        ));
}

#[test]
fn test_version() {
    mimedb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mimedb"));
}

#[test]
fn test_filename_lookup() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["filename", "archive.tar.gz"])
        .assert()
        .success()
        .stdout("application/x-compressed-tar\n");
}

#[test]
fn test_filename_ranked_candidates() {
    let tree = TempDir::new().unwrap();
    write_mime_file(
        tree.path(),
        "globs2",
        b"80:application/x-high:*.foo\n50:application/x-low:*.foo\n",
    );
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["filename", "-c", "5", "x.foo"])
        .assert()
        .success()
        .stdout("application/x-high\napplication/x-low\n");
}

#[test]
fn test_filename_unknown_falls_back() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["filename", "mystery.zzz"])
        .assert()
        .success()
        .stdout("application/octet-stream\n");
}

#[test]
fn test_query_file() {
    let tree = sample_tree();
    let work = TempDir::new().unwrap();
    let file = work.path().join("shot");
    fs::write(&file, b"\x89PNG\r\n\x1a\n....").unwrap();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .arg("query")
        .arg(&file)
        .assert()
        .success()
        .stdout("image/png\n");
}

#[test]
fn test_data_sniffing() {
    let tree = sample_tree();
    let work = TempDir::new().unwrap();
    let file = work.path().join("blob.py");
    fs::write(&file, b"\x89PNG\r\n\x1a\n....").unwrap();
    // The name is ignored by the data subcommand
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .arg("data")
        .arg(&file)
        .assert()
        .success()
        .stdout("image/png (priority 50)\n");
}

#[test]
fn test_parents() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["parents", "text/x-python"])
        .assert()
        .success()
        .stdout("text/plain\n");
}

#[test]
fn test_icon() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["icon", "text/x-python"])
        .assert()
        .success()
        .stdout("python-icon\n");
}

#[test]
fn test_icon_missing_fails() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .args(["icon", "image/png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no icon registered"));
}

#[test]
fn test_dump() {
    let tree = sample_tree();
    mimedb_cmd()
        .args(["--dir", tree.path().to_str().unwrap()])
        .arg("dump")
        .assert()
        .success()
        .stdout(predicate::str::contains("55:application/x-compressed-tar:*.tar.gz"))
        .stdout(predicate::str::contains("[50:image/png]"));
}

//! End-to-end resolver tests over real on-disk XDG data trees
//!
//! These tests build `mime/` directories in temp dirs and exercise the
//! public `MimeDb` API the way a file manager would: name-only lookups,
//! content sniffing, the fused file query, hierarchy queries, and
//! shutdown-driven reloads.

use mimedb::{MimeDb, EMPTY_TYPE, TEXT_PLAIN, UNKNOWN_TYPE};
use proptest::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_mime_file(data_dir: &Path, name: &str, contents: &[u8]) {
    let mime_dir = data_dir.join("mime");
    fs::create_dir_all(&mime_dir).unwrap();
    fs::write(mime_dir.join(name), contents).unwrap();
}

fn magic_file(sections: &[(&str, u32, usize, &[u8])]) -> Vec<u8> {
    let mut out = Vec::from(&b"MIME-Magic\0\n"[..]);
    for (mime, priority, offset, value) in sections {
        out.extend_from_slice(format!("[{priority}:{mime}]\n").as_bytes());
        out.extend_from_slice(format!(">{offset}=").as_bytes());
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
        out.push(b'\n');
    }
    out
}

#[test]
fn test_glob_weight_ordering() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"50:application/x-low:*.foo\n80:application/x-high:*.foo\n",
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    let mimes = db.mime_types_from_file_name("x.foo", 5);
    assert_eq!(mimes, vec!["application/x-high", "application/x-low"]);
}

#[test]
fn test_literal_beats_suffix_beats_full_glob() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"50:text/x-literal:Makefile\n50:text/x-suffix:*.mk\n50:text/x-full:Makefile.*\n",
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);

    // The literal stage short-circuits the rest
    assert_eq!(db.mime_types_from_file_name("Makefile", 5), ["text/x-literal"]);
    // Suffix stage still reachable for other names
    assert_eq!(db.mime_types_from_file_name("build.mk", 5), ["text/x-suffix"]);
    // Full-glob stage only when nothing else matched
    assert_eq!(db.mime_types_from_file_name("Makefile.am", 5), ["text/x-full"]);
}

#[test]
fn test_case_sensitive_glob_does_not_leak() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"50:text/x-c++src:*.C:cs\n50:text/x-csrc:*.c\n",
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    assert_eq!(db.mime_types_from_file_name("foo.c", 5), ["text/x-csrc"]);
    assert_eq!(db.mime_types_from_file_name("foo.C", 5), ["text/x-c++src"]);
}

#[test]
fn test_longest_suffix_wins() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"55:application/x-compressed-tar:*.tar.gz\n50:application/gzip:*.gz\n",
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    assert_eq!(
        db.mime_types_from_file_name("archive.tar.gz", 5),
        ["application/x-compressed-tar"]
    );
    assert_eq!(db.mime_types_from_file_name("data.gz", 5), ["application/gzip"]);
}

#[test]
fn test_shebang_scenario_end_to_end() {
    // globs map *.py; magic matches the env-python shebang. A named file
    // resolves through the glob fast path, an extensionless one through
    // the magic path.
    let tmp = TempDir::new().unwrap();
    write_mime_file(tmp.path(), "globs", b"text/x-python:*.py\n");
    write_mime_file(
        tmp.path(),
        "magic",
        &magic_file(&[("text/x-python", 50, 0, b"#!/usr/bin/env python\n")]),
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);

    let work = TempDir::new().unwrap();
    let shebang = b"#!/usr/bin/env python\nprint('hi')\n";

    let named = work.path().join("script.py");
    fs::write(&named, shebang).unwrap();
    assert_eq!(db.mime_type_for_file(&named, None).unwrap(), "text/x-python");

    let bare = work.path().join("script");
    fs::write(&bare, shebang).unwrap();
    assert_eq!(db.mime_type_for_file(&bare, None).unwrap(), "text/x-python");
}

#[test]
fn test_magic_vetoes_wrong_glob_candidates() {
    // Both globs match *.img; magic proves the content is PNG, which
    // vetoes neither candidate directly but outranks them.
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"50:application/x-raw-disk-image:*.img\n50:application/x-apple-diskimage:*.img\n",
    );
    write_mime_file(
        tmp.path(),
        "magic",
        &magic_file(&[("image/png", 50, 0, b"\x89PNG\r\n\x1a\n")]),
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);

    let work = TempDir::new().unwrap();
    let path = work.path().join("shot.img");
    fs::write(&path, b"\x89PNG\r\n\x1a\n....").unwrap();
    assert_eq!(db.mime_type_for_file(&path, None).unwrap(), "image/png");
}

#[test]
fn test_empty_and_fallback_classification() {
    let tmp = TempDir::new().unwrap();
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    let work = TempDir::new().unwrap();

    let empty = work.path().join("empty");
    fs::write(&empty, b"").unwrap();
    assert_eq!(db.mime_type_for_file(&empty, None).unwrap(), EMPTY_TYPE);

    assert_eq!(db.mime_type_for_data(b"hello\tworld\n"), (TEXT_PLAIN.into(), 0));
    assert_eq!(db.mime_type_for_data(b"\x00"), (UNKNOWN_TYPE.into(), 0));

    // The text scan window is 32 bytes; a control byte at index 31 is
    // inside it, one at index 32 is not
    let mut edge = vec![b'a'; 32];
    edge[31] = 0x01;
    assert_eq!(db.mime_type_for_data(&edge), (UNKNOWN_TYPE.into(), 0));

    let mut past = vec![b'a'; 33];
    past[32] = 0x01;
    assert_eq!(db.mime_type_for_data(&past), (TEXT_PLAIN.into(), 0));
}

#[test]
fn test_hierarchy_and_alias_queries() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(tmp.path(), "aliases", b"text/xml application/xml\n");
    write_mime_file(
        tmp.path(),
        "subclasses",
        b"application/xml text/plain\nimage/svg+xml application/xml\n",
    );
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);

    assert!(db.mime_type_subclass("image/svg+xml", "image/svg+xml"));
    assert!(db.mime_type_subclass("image/svg+xml", "application/xml"));
    // Transitive through application/xml, and via an alias as the base
    assert!(db.mime_type_subclass("image/svg+xml", "text/plain"));
    assert!(db.mime_type_subclass("image/svg+xml", "text/xml"));
    assert!(db.mime_type_subclass("image/svg+xml", "application/octet-stream"));
    assert!(db.mime_type_subclass("image/svg+xml", "image/*"));
    assert!(!db.mime_type_subclass("application/xml", "image/svg+xml"));

    assert_eq!(db.parents("image/svg+xml"), ["application/xml"]);
    // Parent lookup unaliases its argument first
    assert_eq!(db.parents("text/xml"), ["text/plain"]);
}

#[test]
fn test_first_directory_takes_precedence() {
    let home = TempDir::new().unwrap();
    let system = TempDir::new().unwrap();
    write_mime_file(home.path(), "globs2", b"60:text/x-mine:*.conf\n");
    write_mime_file(system.path(), "globs2", b"50:text/x-system:*.conf\n");
    let mut db =
        MimeDb::new_with_dirs([home.path().to_path_buf(), system.path().to_path_buf()]);
    let mimes = db.mime_types_from_file_name("app.conf", 5);
    assert_eq!(mimes, vec!["text/x-mine", "text/x-system"]);
}

#[test]
fn test_shutdown_picks_up_new_rules() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(tmp.path(), "globs", b"text/x-python:*.py\n");
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    assert_eq!(db.mime_type_from_file_name("lib.rs"), UNKNOWN_TYPE);

    write_mime_file(tmp.path(), "globs", b"text/x-python:*.py\ntext/x-rust:*.rs\n");
    db.shutdown();
    assert_eq!(db.mime_type_from_file_name("lib.rs"), "text/x-rust");
}

#[test]
fn test_reload_callback_fires_on_shutdown() {
    use std::cell::Cell;
    use std::rc::Rc;

    let tmp = TempDir::new().unwrap();
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    let fired = Rc::new(Cell::new(0));
    let counter = Rc::clone(&fired);
    let id = db.register_reload_callback(move || counter.set(counter.get() + 1));

    db.shutdown();
    db.shutdown();
    assert_eq!(fired.get(), 2);

    assert!(db.remove_callback(id));
    db.shutdown();
    assert_eq!(fired.get(), 2);
}

#[test]
fn test_malformed_lines_are_skipped() {
    let tmp = TempDir::new().unwrap();
    write_mime_file(
        tmp.path(),
        "globs2",
        b"# comment\nnot-a-weight:text/x-a:*.aa\n50:text/x-ok:*.ok\n\n",
    );
    write_mime_file(tmp.path(), "aliases", b"just-one-field\ntext/xml application/xml\n");
    let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
    assert_eq!(db.mime_types_from_file_name("f.ok", 5), ["text/x-ok"]);
    assert_eq!(db.unalias("text/xml"), "application/xml");
}

proptest! {
    // Unaliasing is idempotent for any query string
    #[test]
    fn prop_unalias_idempotent(mime in "[a-z]{1,8}/[a-z.+-]{1,12}") {
        let tmp = TempDir::new().unwrap();
        write_mime_file(
            tmp.path(),
            "aliases",
            b"text/xml application/xml\napplication/x-gzip application/gzip\n",
        );
        let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
        let once = db.unalias(&mime);
        let twice = db.unalias(&once);
        prop_assert_eq!(once, twice);
    }

    // Every type is its own subclass and a subclass of the unknown type
    #[test]
    fn prop_subclass_reflexive_and_universal(mime in "[a-z]{1,8}/[a-z.+-]{1,12}") {
        let tmp = TempDir::new().unwrap();
        let mut db = MimeDb::new_with_dirs([tmp.path().to_path_buf()]);
        prop_assert!(db.mime_type_subclass(&mime, &mime));
        prop_assert!(db.mime_type_subclass(&mime, "application/octet-stream"));
    }
}

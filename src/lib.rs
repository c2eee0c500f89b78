//! mimedb - Shared MIME-Info Database Resolver
//!
//! mimedb resolves file names and file contents to MIME types using the
//! freedesktop.org shared MIME database: glob patterns, content-sniffing
//! magic rules, alias and subclass tables, and icon mappings, loaded from
//! an XDG-style search path of data directories. Directories shipping a
//! pre-compiled `mime.cache` are memory-mapped and queried in place;
//! directories without one fall back to their text source files.
//!
//! # Quick Start
//!
//! ```rust
//! use mimedb::MimeDb;
//!
//! # let tmp = std::env::temp_dir().join("mimedb_doctest");
//! # std::fs::create_dir_all(tmp.join("mime"))?;
//! # std::fs::write(tmp.join("mime/globs"), "text/x-python:*.py\n")?;
//! // Honors $XDG_DATA_HOME and $XDG_DATA_DIRS; nothing is read until the
//! // first lookup.
//! # /*
//! let mut db = MimeDb::new();
//! # */
//! # let mut db = MimeDb::new_with_dirs([tmp.clone()]);
//!
//! assert_eq!(db.mime_type_from_file_name("run.py"), "text/x-python");
//!
//! let (mime, _priority) = db.mime_type_for_data(b"hello world\n");
//! assert_eq!(mime, "text/plain");
//! # let _ = std::fs::remove_dir_all(&tmp);
//! # Ok::<(), std::io::Error>(())
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  MimeDb (db)                                │
//! │  search path, invalidation, glob/magic      │
//! │  fusion, public query API                   │
//! ├──────────────────┬──────────────────────────┤
//! │  mime.cache      │  text tables             │
//! │  (cache, mmap)   │  globs / magic / alias / │
//! │                  │  parent / icon           │
//! ├──────────────────┴──────────────────────────┤
//! │  glob (fnmatch)  endian  text (heuristics)  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Resolution for a file fuses both engines: glob candidates ranked by
//! weight short-circuit when unambiguous, otherwise the file's leading
//! bytes are sniffed against the magic rules with the glob candidates as
//! a veto filter.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Module declarations
pub mod alias;
/// Memory-mapped binary `mime.cache` reader
pub mod cache;
/// Top-level resolver over the XDG search path
pub mod db;
mod endian;
/// Error types for database loading
pub mod error;
pub mod glob;
/// Filename glob tables (literal, suffix, full)
pub mod globs;
pub mod icon;
/// Content-sniffing magic rules
pub mod magic;
pub mod parent;
pub mod text;

// Re-exports for consumers

/// MIME database resolver, the primary entry point
pub use crate::db::MimeDb;

pub use crate::error::{MimeError, Result};
pub use crate::glob::MatchMode;
pub use crate::globs::MimeWeight;

/// Fallback type for content that cannot be classified; every MIME type
/// is considered one of its subclasses.
pub const UNKNOWN_TYPE: &str = "application/octet-stream";

/// Fallback type for printable textual content; every `text/*` type is
/// considered one of its subclasses.
pub const TEXT_PLAIN: &str = "text/plain";

/// Distinguished type reported for zero-length regular files.
pub const EMPTY_TYPE: &str = "application/x-zerosize";

/// Whether a byte string is acceptable as a MIME type name.
///
/// Only UTF-8 validity is checked; structural validation of the
/// `media/subtype` form is intentionally not performed, matching the
/// permissive behavior of the wider shared-mime-info ecosystem.
pub fn is_valid_mime_type(s: &[u8]) -> bool {
    std::str::from_utf8(s).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_mime_type() {
        assert!(is_valid_mime_type(b"text/plain"));
        assert!(is_valid_mime_type(b"not a mime type but valid utf-8"));
        assert!(!is_valid_mime_type(&[0x74, 0xFF, 0x65]));
    }
}

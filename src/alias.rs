//! MIME type alias table
//!
//! Maps an alias MIME type (for example `text/xml`) to its canonical form
//! (`application/xml`). Backed by a sorted vec that is binary-searched by
//! alias. Loaded from the line-oriented `mime/aliases` files found in each
//! data directory: one `alias canonical` pair per line, `#` comments skipped.
//!
//! The table is append-then-sort: it is populated from every cache-less data
//! directory, finalized once, and immutable until a full reload. Entries from
//! higher-priority directories are loaded first and win on duplicates.

use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sorted alias -> canonical MIME type table.
#[derive(Debug, Default)]
pub struct AliasTable {
    /// (alias, canonical), sorted ascending by alias after `finish`
    entries: Vec<(String, String)>,
    sorted: bool,
}

impl AliasTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one alias pair. Call `finish` before lookups.
    pub fn add(&mut self, alias: &str, canonical: &str) {
        self.entries.push((alias.to_string(), canonical.to_string()));
        self.sorted = false;
    }

    /// Parse an `aliases` file, appending its well-formed lines.
    ///
    /// A missing or unreadable file contributes nothing; malformed lines are
    /// skipped individually.
    pub fn load_from(&mut self, path: &Path) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return,
        };
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => return,
            };
            if line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            match (fields.next(), fields.next()) {
                (Some(alias), Some(canonical)) => self.add(alias, canonical),
                _ => {
                    if !line.trim().is_empty() {
                        debug!("skipping malformed alias line in {}: {:?}", path.display(), line);
                    }
                }
            }
        }
    }

    /// Sort by alias; on duplicates the first-loaded (highest-priority
    /// directory) entry wins. Idempotent.
    pub fn finish(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries.dedup_by(|a, b| a.0 == b.0);
        self.sorted = true;
    }

    /// Binary-search for the canonical type of `alias`.
    ///
    /// `None` means the type is already canonical as far as this table knows.
    pub fn lookup(&self, alias: &str) -> Option<&str> {
        debug_assert!(self.sorted || self.entries.is_empty());
        self.entries
            .binary_search_by(|(a, _)| a.as_str().cmp(alias))
            .ok()
            .map(|idx| self.entries[idx].1.as_str())
    }

    /// Normalize `mime` to its canonical form, or return it unchanged.
    pub fn unalias<'a>(&'a self, mime: &'a str) -> &'a str {
        self.lookup(mime).unwrap_or(mime)
    }

    /// Iterate all `(alias, canonical)` pairs, for `dump`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(a, c)| (a.as_str(), c.as_str()))
    }

    /// Number of aliases in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no aliases were loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

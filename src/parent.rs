//! MIME type parent/subclass table
//!
//! Maps a MIME type to its direct parents, loaded from `mime/subclasses`
//! files (`child parent` lines, repeatable per child). Backed by a sorted
//! vec binary-searched by child type.
//!
//! The parents list keeps file append order and is not deduplicated here;
//! the resolver dedups at consumption time when merging sources, matching
//! what the binary cache variant does.

use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sorted mime -> direct parents table.
#[derive(Debug, Default)]
pub struct ParentTable {
    /// (mime, parents in file order), sorted ascending by mime after `finish`
    entries: Vec<(String, Vec<String>)>,
    sorted: bool,
}

impl ParentTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one `child -> parent` edge. A child already present gets the
    /// parent appended to its list.
    pub fn add(&mut self, mime: &str, parent: &str) {
        if let Some((_, parents)) = self.entries.iter_mut().find(|(m, _)| m == mime) {
            parents.push(parent.to_string());
        } else {
            self.entries
                .push((mime.to_string(), vec![parent.to_string()]));
        }
        self.sorted = false;
    }

    /// Parse a `subclasses` file, appending its well-formed lines.
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
                (Some(child), Some(parent)) => self.add(child, parent),
                _ => {
                    if !line.trim().is_empty() {
                        debug!(
                            "skipping malformed subclass line in {}: {:?}",
                            path.display(),
                            line
                        );
                    }
                }
            }
        }
    }

    /// Sort by mime type for binary search. Idempotent.
    pub fn finish(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.sorted = true;
    }

    /// Direct parents of `mime`, in file order. Empty if absent.
    pub fn direct_parents(&self, mime: &str) -> &[String] {
        debug_assert!(self.sorted || self.entries.is_empty());
        match self
            .entries
            .binary_search_by(|(m, _)| m.as_str().cmp(mime))
        {
            Ok(idx) => &self.entries[idx].1,
            Err(_) => &[],
        }
    }

    /// Iterate all `(mime, parents)` entries, for `dump`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(m, p)| (m.as_str(), p.as_slice()))
    }

    /// True if no subclass edges were loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

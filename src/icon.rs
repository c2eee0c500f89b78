//! MIME type icon name tables
//!
//! Two independent tables with identical structure: `mime/icons` maps a type
//! to its specific icon name, `mime/generic-icons` to its generic fallback.
//! Line format is `mime:icon-name`. No unaliasing is performed here; callers
//! unalias first if they want canonical lookups.

use log::debug;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Sorted mime -> icon name table.
#[derive(Debug, Default)]
pub struct IconTable {
    /// (mime, icon), sorted ascending by mime after `finish`
    entries: Vec<(String, String)>,
    sorted: bool,
}

impl IconTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `icons` / `generic-icons` file, appending well-formed lines.
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
            match line.split_once(':') {
                Some((mime, icon)) if !mime.is_empty() && !icon.is_empty() => {
                    self.entries.push((mime.to_string(), icon.to_string()));
                    self.sorted = false;
                }
                _ => {
                    if !line.trim().is_empty() {
                        debug!("skipping malformed icon line in {}: {:?}", path.display(), line);
                    }
                }
            }
        }
    }

    /// Sort by mime; first-loaded entry wins on duplicates. Idempotent.
    pub fn finish(&mut self) {
        self.entries.sort_by(|a, b| a.0.cmp(&b.0));
        self.entries.dedup_by(|a, b| a.0 == b.0);
        self.sorted = true;
    }

    /// Binary-search the icon name for `mime`.
    pub fn lookup(&self, mime: &str) -> Option<&str> {
        debug_assert!(self.sorted || self.entries.is_empty());
        self.entries
            .binary_search_by(|(m, _)| m.as_str().cmp(mime))
            .ok()
            .map(|idx| self.entries[idx].1.as_str())
    }

    /// Iterate all `(mime, icon)` pairs, for `dump`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(m, i)| (m.as_str(), i.as_str()))
    }

    /// True if no icon entries were loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

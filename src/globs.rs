//! Filename glob engine
//!
//! Maps filenames to candidate MIME types. Every glob from the `globs` /
//! `globs2` data files is classified once at insertion time into one of
//! three buckets:
//!
//! - **literal**: no wildcard character at all; matched by string equality
//! - **simple**: a single leading `*` and nothing else special (`*.ext`);
//!   stored in a trie keyed on the reversed suffix so a lookup walks the
//!   filename backwards in O(suffix length)
//! - **full**: everything else; matched with the fnmatch-style
//!   [`GlobPattern`](crate::glob::GlobPattern) slow path
//!
//! Lookup runs the buckets in that order and stops at the first stage that
//! produces candidates: literals are unambiguous and cheapest, suffixes are
//! the overwhelmingly common case, and full wildcard scans are attempted
//! last. Multi-candidate results are ranked by weight, descending, stable on
//! insertion order.

use crate::glob::{GlobPattern, MatchMode};
use crate::text::ascii_lowercase;
use log::debug;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Default weight for entries from the unweighted `globs` format.
pub const DEFAULT_GLOB_WEIGHT: u32 = 50;

/// A ranked glob result: candidate MIME type plus its weight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeWeight {
    /// Candidate MIME type
    pub mime: String,
    /// Integer priority; higher wins
    pub weight: u32,
}

/// Which bucket a glob pattern belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobKind {
    Literal,
    Simple,
    Full,
}

fn classify(pattern: &str) -> GlobKind {
    let is_wild = |c: char| matches!(c, '*' | '?' | '[' | '\\');
    let mut chars = pattern.chars();
    match chars.next() {
        Some('*') if !chars.clone().any(is_wild) => GlobKind::Simple,
        _ if !pattern.chars().any(is_wild) => GlobKind::Literal,
        _ => GlobKind::Full,
    }
}

#[derive(Debug)]
struct LiteralGlob {
    pattern: String,
    /// ASCII-folded copy used by the case-insensitive pass
    folded: String,
    mime: String,
    weight: u32,
    case_sensitive: bool,
}

#[derive(Debug)]
struct FullGlob {
    glob: GlobPattern,
    mime: String,
    weight: u32,
    case_sensitive: bool,
}

/// Terminal payload of a suffix-trie node.
#[derive(Debug)]
struct SuffixLeaf {
    mime: String,
    weight: u32,
    case_sensitive: bool,
}

#[derive(Debug, Default)]
struct SuffixNode {
    children: FxHashMap<char, SuffixNode>,
    leaves: Vec<SuffixLeaf>,
}

impl SuffixNode {
    fn insert(&mut self, suffix_rev: &[char], leaf: SuffixLeaf) {
        match suffix_rev.split_first() {
            None => self.leaves.push(leaf),
            Some((&c, rest)) => self.children.entry(c).or_default().insert(rest, leaf),
        }
    }
}

/// The composite glob store: literal list, reversed-suffix trie, full list.
#[derive(Debug, Default)]
pub struct GlobMap {
    literals: Vec<LiteralGlob>,
    suffixes: SuffixNode,
    fulls: Vec<FullGlob>,
    entry_count: usize,
}

impl GlobMap {
    /// Create an empty glob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one glob, classifying it into its bucket.
    ///
    /// A pattern that fails to parse as a full glob is dropped; data files
    /// are shared system state and one bad line must not break loading.
    pub fn add(&mut self, pattern: &str, mime: &str, weight: u32, case_sensitive: bool) {
        match classify(pattern) {
            GlobKind::Literal => self.literals.push(LiteralGlob {
                pattern: pattern.to_string(),
                folded: ascii_lowercase(pattern),
                mime: mime.to_string(),
                weight,
                case_sensitive,
            }),
            GlobKind::Simple => {
                let suffix: String = pattern[1..].to_string();
                let stored = if case_sensitive {
                    suffix
                } else {
                    ascii_lowercase(&suffix)
                };
                let rev: Vec<char> = stored.chars().rev().collect();
                self.suffixes.insert(
                    &rev,
                    SuffixLeaf {
                        mime: mime.to_string(),
                        weight,
                        case_sensitive,
                    },
                );
            }
            GlobKind::Full => {
                let mode = if case_sensitive {
                    MatchMode::CaseSensitive
                } else {
                    MatchMode::CaseInsensitive
                };
                match GlobPattern::new(pattern, mode) {
                    Ok(glob) => self.fulls.push(FullGlob {
                        glob,
                        mime: mime.to_string(),
                        weight,
                        case_sensitive,
                    }),
                    Err(e) => {
                        debug!("dropping unparsable glob {:?}: {}", pattern, e);
                        return;
                    }
                }
            }
        }
        self.entry_count += 1;
    }

    /// Parse a `globs` file: `mime:glob` lines, implicit weight 50.
    pub fn load_globs(&mut self, path: &Path) {
        self.load_lines(path, false)
    }

    /// Parse a `globs2` file: `weight:mime:glob[:flags]` lines; the only
    /// recognized flag token is `cs`.
    pub fn load_globs2(&mut self, path: &Path) {
        self.load_lines(path, true)
    }

    fn load_lines(&mut self, path: &Path, weighted: bool) {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(_) => return,
        };
        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => return,
            };
            if line.starts_with('#') || line.trim().is_empty() {
                continue;
            }
            let parsed = if weighted {
                Self::parse_globs2_line(&line)
            } else {
                line.split_once(':')
                    .map(|(mime, glob)| (glob.to_string(), mime.to_string(), DEFAULT_GLOB_WEIGHT, false))
            };
            match parsed {
                Some((glob, mime, weight, cs)) if !glob.is_empty() && !mime.is_empty() => {
                    self.add(&glob, &mime, weight, cs)
                }
                _ => debug!("skipping malformed glob line in {}: {:?}", path.display(), line),
            }
        }
    }

    /// `weight:mime:glob[:flags]` -> (glob, mime, weight, case_sensitive)
    fn parse_globs2_line(line: &str) -> Option<(String, String, u32, bool)> {
        let mut fields = line.splitn(4, ':');
        let weight: u32 = fields.next()?.parse().ok()?;
        let mime = fields.next()?;
        let glob = fields.next()?;
        let case_sensitive = fields
            .next()
            .map(|flags| flags.split(',').any(|f| f == "cs"))
            .unwrap_or(false);
        Some((glob.to_string(), mime.to_string(), weight, case_sensitive))
    }

    /// Resolve a filename to a ranked candidate list, at most `max_count`
    /// entries, highest weight first.
    pub fn lookup_file_name(&self, name: &str, max_count: usize) -> Vec<MimeWeight> {
        if max_count == 0 || name.is_empty() {
            return Vec::new();
        }
        let lower = ascii_lowercase(name);

        // Stage 1: exact literal match on the original name
        let mut results: Vec<MimeWeight> = self
            .literals
            .iter()
            .filter(|l| l.pattern == name)
            .map(|l| MimeWeight {
                mime: l.mime.clone(),
                weight: l.weight,
            })
            .collect();

        // Stage 2: folded literal match, case-insensitive entries only
        if results.is_empty() {
            results = self
                .literals
                .iter()
                .filter(|l| !l.case_sensitive && l.folded == lower)
                .map(|l| MimeWeight {
                    mime: l.mime.clone(),
                    weight: l.weight,
                })
                .collect();
        }

        // Stage 3: suffix trie, exact walk first (any entry may match),
        // then a folded retry restricted to case-insensitive entries
        if results.is_empty() {
            let rev: Vec<char> = name.chars().rev().collect();
            results = self.lookup_suffix(&rev, false);
            if results.is_empty() {
                let rev: Vec<char> = lower.chars().rev().collect();
                results = self.lookup_suffix(&rev, true);
            }
        }

        // Stage 4: full fnmatch scan, folded/ci then original/cs
        if results.is_empty() {
            for f in &self.fulls {
                let ok = if f.case_sensitive {
                    f.glob.matches(name)
                } else {
                    f.glob.matches(&lower)
                };
                if ok {
                    results.push(MimeWeight {
                        mime: f.mime.clone(),
                        weight: f.weight,
                    });
                }
            }
        }

        // Rank: weight descending, stable on insertion order for ties
        results.sort_by(|a, b| b.weight.cmp(&a.weight));
        results.truncate(max_count);
        results
    }

    /// Walk the reversed filename down the trie; collect leaves at the
    /// deepest node that has any leaf passing the case filter. The exact
    /// pass (`folded` false) accepts every leaf it reaches; the folded
    /// retry only case-insensitive ones, since case-sensitive suffixes are
    /// stored with their original characters and were already tried.
    fn lookup_suffix(&self, name_rev: &[char], folded: bool) -> Vec<MimeWeight> {
        let mut chain: Vec<&SuffixNode> = vec![&self.suffixes];
        let mut node = &self.suffixes;
        for &c in name_rev {
            match node.children.get(&c) {
                Some(child) => {
                    chain.push(child);
                    node = child;
                }
                None => break,
            }
        }
        for node in chain.iter().rev() {
            let hits: Vec<MimeWeight> = node
                .leaves
                .iter()
                .filter(|l| !folded || !l.case_sensitive)
                .map(|l| MimeWeight {
                    mime: l.mime.clone(),
                    weight: l.weight,
                })
                .collect();
            if !hits.is_empty() {
                return hits;
            }
        }
        Vec::new()
    }

    /// Total number of stored globs across all three buckets.
    pub fn len(&self) -> usize {
        self.entry_count
    }

    /// True if nothing was loaded.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Flattened view of every entry as `(pattern, mime, weight, cs)`, for
    /// the debug dump. Suffix entries are reported in `*.ext` form.
    pub fn entries(&self) -> Vec<(String, String, u32, bool)> {
        let mut out = Vec::with_capacity(self.entry_count);
        for l in &self.literals {
            out.push((l.pattern.clone(), l.mime.clone(), l.weight, l.case_sensitive));
        }
        fn walk(node: &SuffixNode, rev: &mut Vec<char>, out: &mut Vec<(String, String, u32, bool)>) {
            for leaf in &node.leaves {
                let suffix: String = rev.iter().rev().collect();
                out.push((
                    format!("*{}", suffix),
                    leaf.mime.clone(),
                    leaf.weight,
                    leaf.case_sensitive,
                ));
            }
            for (&c, child) in &node.children {
                rev.push(c);
                walk(child, rev, out);
                rev.pop();
            }
        }
        walk(&self.suffixes, &mut Vec::new(), &mut out);
        for f in &self.fulls {
            out.push((
                f.glob.pattern().to_string(),
                f.mime.clone(),
                f.weight,
                f.case_sensitive,
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mimes(results: &[MimeWeight]) -> Vec<&str> {
        results.iter().map(|r| r.mime.as_str()).collect()
    }

    #[test]
    fn test_classification_routing() {
        let mut map = GlobMap::new();
        map.add("Makefile", "text/x-makefile", 50, false);
        map.add("*.c", "text/x-csrc", 50, false);
        map.add("*.[ch]", "text/x-c-any", 50, false);
        assert_eq!(map.len(), 3);

        // Literal wins over suffix and full for the exact name
        map.add("*.mk", "make/y", 50, false);
        map.add("Makefile.*", "make/z", 50, false);
        let r = map.lookup_file_name("Makefile", 5);
        assert_eq!(mimes(&r), vec!["text/x-makefile"]);
    }

    #[test]
    fn test_suffix_lookup() {
        let mut map = GlobMap::new();
        map.add("*.tar", "application/x-tar", 50, false);
        map.add("*.tar.gz", "application/x-compressed-tar", 55, false);
        map.add("*.gz", "application/gzip", 50, false);

        // Deepest matching suffix wins
        let r = map.lookup_file_name("backup.tar.gz", 5);
        assert_eq!(mimes(&r), vec!["application/x-compressed-tar"]);

        let r = map.lookup_file_name("data.gz", 5);
        assert_eq!(mimes(&r), vec!["application/gzip"]);
    }

    #[test]
    fn test_shared_suffix_collects_all() {
        let mut map = GlobMap::new();
        map.add("*.foo", "application/x-a", 50, false);
        map.add("*.foo", "application/x-b", 80, false);
        let r = map.lookup_file_name("x.foo", 5);
        // Both returned, higher weight first
        assert_eq!(mimes(&r), vec!["application/x-b", "application/x-a"]);
    }

    #[test]
    fn test_weight_ties_stable_on_insertion() {
        let mut map = GlobMap::new();
        map.add("*.bar", "first/type", 50, false);
        map.add("*.bar", "second/type", 50, false);
        let r = map.lookup_file_name("x.bar", 5);
        assert_eq!(mimes(&r), vec!["first/type", "second/type"]);
    }

    #[test]
    fn test_case_sensitivity() {
        let mut map = GlobMap::new();
        map.add("*.C", "text/x-c++src", 50, true);
        map.add("*.c", "text/x-csrc", 50, false);

        let r = map.lookup_file_name("foo.c", 5);
        assert_eq!(mimes(&r), vec!["text/x-csrc"]);
        let r = map.lookup_file_name("foo.C", 5);
        // Exact pass walks the stored uppercase suffix before any folding
        assert_eq!(mimes(&r), vec!["text/x-c++src"]);
    }

    #[test]
    fn test_case_sensitive_only_suffix() {
        let mut map = GlobMap::new();
        map.add("*.C", "text/x-c++src", 50, true);
        assert!(map.lookup_file_name("foo.c", 5).is_empty());
        let r = map.lookup_file_name("foo.C", 5);
        assert_eq!(mimes(&r), vec!["text/x-c++src"]);
    }

    #[test]
    fn test_full_glob_is_last_resort() {
        let mut map = GlobMap::new();
        map.add("*.txt", "text/plain", 50, false);
        map.add("core*", "application/x-core", 50, false);
        let r = map.lookup_file_name("core.1234", 5);
        assert_eq!(mimes(&r), vec!["application/x-core"]);
    }

    #[test]
    fn test_max_count_truncation() {
        let mut map = GlobMap::new();
        map.add("*.multi", "a/a", 10, false);
        map.add("*.multi", "b/b", 20, false);
        map.add("*.multi", "c/c", 30, false);
        let r = map.lookup_file_name("x.multi", 2);
        assert_eq!(mimes(&r), vec!["c/c", "b/b"]);
    }

    #[test]
    fn test_globs2_line_parsing() {
        assert_eq!(
            GlobMap::parse_globs2_line("80:text/x-c++src:*.C:cs"),
            Some(("*.C".to_string(), "text/x-c++src".to_string(), 80, true))
        );
        assert_eq!(
            GlobMap::parse_globs2_line("50:text/plain:*.txt"),
            Some(("*.txt".to_string(), "text/plain".to_string(), 50, false))
        );
        assert_eq!(GlobMap::parse_globs2_line("notanumber:a/b:*.x"), None);
    }

    #[test]
    fn test_star_only_pattern() {
        let mut map = GlobMap::new();
        map.add("*", "application/x-anything", 1, false);
        let r = map.lookup_file_name("whatever", 5);
        assert_eq!(mimes(&r), vec!["application/x-anything"]);
    }
}

//! Memory-mapped `mime.cache` reader
//!
//! A `mime.cache` file is the pre-compiled form of a directory's MIME data:
//! aliases, the parent hierarchy, all three glob buckets, magic rules, and
//! both icon tables, laid out as sorted arrays and node trees of big-endian
//! 32-bit offsets. When a directory carries a valid cache it supersedes the
//! directory's text files entirely, and lookups walk the mapped buffer
//! directly with no intermediate parsed objects.
//!
//! # Layout
//!
//! ```text
//! [Header]
//!   major_version: u16 BE      // must be 1
//!   minor_version: u16 BE      // 1 or 2
//!   alias_list_offset: u32 BE
//!   parent_list_offset: u32 BE
//!   literal_list_offset: u32 BE
//!   reverse_suffix_tree_offset: u32 BE
//!   glob_list_offset: u32 BE
//!   magic_list_offset: u32 BE
//!   namespace_list_offset: u32 BE
//!   icons_list_offset: u32 BE
//!   generic_icons_list_offset: u32 BE   // minor >= 2 only
//!
//! [Alias/Icon lists]    count, then (string_offset, string_offset) pairs,
//!                       sorted by the first string
//! [Parent list]         count, then (mime_offset, parents_offset) pairs;
//!                       parents: count, then mime_offsets
//! [Literal/Glob lists]  count, then (string_offset, mime_offset,
//!                       weight_and_flags) triples
//! [Suffix tree]         n_roots, first_root_offset; nodes are
//!                       (character, n_children, first_child_offset);
//!                       a character of 0 marks a leaf carrying
//!                       (0, mime_offset, weight_and_flags)
//! [Magic list]          n_matches, max_extent, first_match_offset
//! ```
//!
//! `weight_and_flags` packs the glob weight in the low byte and the
//! case-sensitive flag at bit 8. All strings are NUL-terminated.
//!
//! The original C reader trusted these offsets blindly; here every read is
//! bounds-checked and a corrupt offset makes the affected lookup come back
//! empty instead of faulting.

use crate::endian::{read_str, read_u16_be, read_u32_be};
use crate::error::MimeError;
use crate::glob::{GlobPattern, MatchMode};
use crate::globs::MimeWeight;
use crate::text::{ascii_lowercase, codepoint_to_lower};
use memmap2::Mmap;
use std::cmp::Ordering;
use std::fs::File;
use std::path::{Path, PathBuf};
use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::FromBytes;

/// Case-sensitive flag bit inside a `weight_and_flags` word.
const CASE_SENSITIVE_FLAG: u32 = 0x100;
/// Weight mask inside a `weight_and_flags` word.
const WEIGHT_MASK: u32 = 0xFF;

/// Fixed-layout cache header (minor-version-1 portion; the generic icon
/// list offset that minor 2 appends is read separately).
#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes)]
struct CacheHeader {
    major_version: U16,
    minor_version: U16,
    alias_list_offset: U32,
    parent_list_offset: U32,
    literal_list_offset: U32,
    reverse_suffix_tree_offset: U32,
    glob_list_offset: U32,
    magic_list_offset: U32,
    namespace_list_offset: U32,
    icons_list_offset: U32,
}

/// Byte offset of the minor-2 generic icon list offset field.
const GENERIC_ICONS_OFFSET_POS: usize = 36;

/// One open, validated `mime.cache` mapping.
///
/// The mapping is released when the `Cache` is dropped; `MimeDb` owns one
/// per cache-backed directory.
pub struct Cache {
    mmap: Mmap,
    path: PathBuf,
    minor: u16,
    header: CacheHeader,
    generic_icons_list_offset: u32,
}

impl Cache {
    /// Open and validate a `mime.cache` file.
    ///
    /// Rejects files smaller than the version header and files whose
    /// version is not 1.1 or 1.2. The caller treats any error as "this
    /// directory has no cache" and falls back to its text files.
    pub fn open(path: &Path) -> Result<Self, MimeError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| MimeError::Mmap(e.to_string()))?;
        let size = mmap.len();

        if size < 4 {
            return Err(MimeError::CacheTooSmall { size, required: 4 });
        }
        let major = read_u16_be(&mmap, 0).unwrap_or(0);
        let minor = read_u16_be(&mmap, 2).unwrap_or(0);
        if major != 1 || !(1..=2).contains(&minor) {
            return Err(MimeError::UnsupportedCacheVersion { major, minor });
        }

        let required = if minor >= 2 {
            GENERIC_ICONS_OFFSET_POS + 4
        } else {
            std::mem::size_of::<CacheHeader>()
        };
        if size < required {
            return Err(MimeError::CacheTooSmall { size, required });
        }

        let (header, _) = CacheHeader::read_from_prefix(&mmap[..])
            .map_err(|_| MimeError::Format("cache header truncated".to_string()))?;
        let generic_icons_list_offset = if minor >= 2 {
            read_u32_be(&mmap, GENERIC_ICONS_OFFSET_POS).unwrap_or(0)
        } else {
            0
        };

        Ok(Self {
            mmap,
            path: path.to_path_buf(),
            minor,
            header,
            generic_icons_list_offset,
        })
    }

    /// Path this cache was mapped from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cache format minor version (1 or 2).
    pub fn minor_version(&self) -> u16 {
        self.minor
    }

    #[inline]
    fn buf(&self) -> &[u8] {
        &self.mmap[..]
    }

    // ----- sorted pair lists (aliases, icons, parents) -----

    /// Binary-search a `(string_offset, payload...)` list whose entries are
    /// `entry_size` bytes, sorted by the referenced string. Returns the
    /// matching entry's byte offset.
    fn search_pair_list(&self, list_offset: u32, key: &str, entry_size: usize) -> Option<usize> {
        let buf = self.buf();
        let base = list_offset as usize;
        if base == 0 {
            return None;
        }
        let count = read_u32_be(buf, base)? as usize;
        let mut lo = 0usize;
        let mut hi = count;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = base + 4 + mid * entry_size;
            let str_offset = read_u32_be(buf, entry)? as usize;
            let s = read_str(buf, str_offset)?;
            match s.cmp(key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(entry),
            }
        }
        None
    }

    /// Canonical type for `alias`, if this cache maps it.
    pub fn alias_lookup(&self, alias: &str) -> Option<String> {
        let entry = self.search_pair_list(self.header.alias_list_offset.get(), alias, 8)?;
        let mime_offset = read_u32_be(self.buf(), entry + 4)? as usize;
        Some(read_str(self.buf(), mime_offset)?.to_string())
    }

    /// Direct parents of `mime` recorded in this cache, in list order.
    pub fn parent_lookup(&self, mime: &str) -> Vec<String> {
        let mut parents = Vec::new();
        let entry = match self.search_pair_list(self.header.parent_list_offset.get(), mime, 8) {
            Some(e) => e,
            None => return parents,
        };
        let buf = self.buf();
        let list = match read_u32_be(buf, entry + 4) {
            Some(o) => o as usize,
            None => return parents,
        };
        let count = read_u32_be(buf, list).unwrap_or(0) as usize;
        for i in 0..count {
            let mime_offset = match read_u32_be(buf, list + 4 + i * 4) {
                Some(o) => o as usize,
                None => break,
            };
            match read_str(buf, mime_offset) {
                Some(p) => parents.push(p.to_string()),
                None => break,
            }
        }
        parents
    }

    /// Specific icon name for `mime`.
    pub fn icon_lookup(&self, mime: &str) -> Option<String> {
        let entry = self.search_pair_list(self.header.icons_list_offset.get(), mime, 8)?;
        let icon_offset = read_u32_be(self.buf(), entry + 4)? as usize;
        Some(read_str(self.buf(), icon_offset)?.to_string())
    }

    /// Generic icon name for `mime` (minor version 2 caches only).
    pub fn generic_icon_lookup(&self, mime: &str) -> Option<String> {
        let entry = self.search_pair_list(self.generic_icons_list_offset, mime, 8)?;
        let icon_offset = read_u32_be(self.buf(), entry + 4)? as usize;
        Some(read_str(self.buf(), icon_offset)?.to_string())
    }

    // ----- glob lookups -----

    /// Staged filename lookup over this cache's literal list, suffix tree,
    /// and full glob list; same stage order and ranking as the text-table
    /// engine.
    pub fn glob_lookup_file_name(&self, name: &str, max_count: usize) -> Vec<MimeWeight> {
        if max_count == 0 || name.is_empty() {
            return Vec::new();
        }
        let lower = ascii_lowercase(name);

        let mut results = self.literal_lookup(name, true);
        if results.is_empty() {
            results = self.literal_lookup(&lower, false);
        }
        if results.is_empty() {
            let rev: Vec<char> = name.chars().rev().collect();
            results = self.suffix_lookup(&rev, false);
            if results.is_empty() {
                let rev: Vec<char> = lower.chars().rev().collect();
                results = self.suffix_lookup(&rev, true);
            }
        }
        if results.is_empty() {
            results = self.full_glob_lookup(name, &lower);
        }

        results.sort_by(|a, b| b.weight.cmp(&a.weight));
        results.truncate(max_count);
        results
    }

    /// Exact-match pass over the literal list. When `case_sensitive_check`
    /// is false only entries without the `cs` flag may match.
    fn literal_lookup(&self, name: &str, case_sensitive_check: bool) -> Vec<MimeWeight> {
        let entry = match self.search_pair_list(self.header.literal_list_offset.get(), name, 12) {
            Some(e) => e,
            None => return Vec::new(),
        };
        let buf = self.buf();
        let weight_flags = match read_u32_be(buf, entry + 8) {
            Some(w) => w,
            None => return Vec::new(),
        };
        if !case_sensitive_check && weight_flags & CASE_SENSITIVE_FLAG != 0 {
            return Vec::new();
        }
        let mime_offset = match read_u32_be(buf, entry + 4) {
            Some(o) => o as usize,
            None => return Vec::new(),
        };
        match read_str(buf, mime_offset) {
            Some(mime) => vec![MimeWeight {
                mime: mime.to_string(),
                weight: weight_flags & WEIGHT_MASK,
            }],
            None => Vec::new(),
        }
    }

    /// Walk the reversed filename down the on-disk suffix tree, collecting
    /// the leaf entries of the deepest matching node. The exact pass
    /// (`folded` false) walks the name's own characters and accepts every
    /// leaf; the folded retry lowercases each character and skips
    /// case-sensitive leaves, whose stored characters were already tried.
    fn suffix_lookup(&self, name_rev: &[char], folded: bool) -> Vec<MimeWeight> {
        let buf = self.buf();
        let base = self.header.reverse_suffix_tree_offset.get() as usize;
        if base == 0 {
            return Vec::new();
        }
        let n_roots = match read_u32_be(buf, base) {
            Some(n) => n,
            None => return Vec::new(),
        };
        let first_root = match read_u32_be(buf, base + 4) {
            Some(o) => o,
            None => return Vec::new(),
        };
        self.suffix_node_lookup(n_roots, first_root, name_rev, folded)
    }

    fn suffix_node_lookup(
        &self,
        n_children: u32,
        child_list_offset: u32,
        name_rev: &[char],
        folded: bool,
    ) -> Vec<MimeWeight> {
        let (&ch, rest) = match name_rev.split_first() {
            Some(split) => split,
            None => return Vec::new(),
        };
        let target = if folded {
            codepoint_to_lower(ch as u32)
        } else {
            ch as u32
        };

        // Children are sorted ascending by character; leaves (character 0)
        // sort first and never collide with a real character.
        let buf = self.buf();
        let base = child_list_offset as usize;
        let mut lo = 0usize;
        let mut hi = n_children as usize;
        let mut found: Option<usize> = None;
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = base + mid * 12;
            let character = match read_u32_be(buf, entry) {
                Some(c) => c,
                None => return Vec::new(),
            };
            match character.cmp(&target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    found = Some(entry);
                    break;
                }
            }
        }
        let entry = match found {
            Some(e) => e,
            None => return Vec::new(),
        };
        let sub_count = read_u32_be(buf, entry + 4).unwrap_or(0);
        let sub_offset = read_u32_be(buf, entry + 8).unwrap_or(0);

        // Prefer the longest suffix chain
        if !rest.is_empty() && sub_count > 0 {
            let deeper = self.suffix_node_lookup(sub_count, sub_offset, rest, folded);
            if !deeper.is_empty() {
                return deeper;
            }
        }

        // No deeper match: collect this node's leaf entries
        let mut results = Vec::new();
        for i in 0..sub_count as usize {
            let leaf = sub_offset as usize + i * 12;
            let character = match read_u32_be(buf, leaf) {
                Some(c) => c,
                None => break,
            };
            if character != 0 {
                // Leaves sort before real characters
                break;
            }
            let mime_offset = read_u32_be(buf, leaf + 4).unwrap_or(0) as usize;
            let weight_flags = read_u32_be(buf, leaf + 8).unwrap_or(0);
            let case_sensitive = weight_flags & CASE_SENSITIVE_FLAG != 0;
            if folded && case_sensitive {
                continue;
            }
            if let Some(mime) = read_str(buf, mime_offset) {
                results.push(MimeWeight {
                    mime: mime.to_string(),
                    weight: weight_flags & WEIGHT_MASK,
                });
            }
        }
        results
    }

    /// fnmatch scan of the full glob list: folded name against
    /// case-insensitive entries, original name against case-sensitive ones.
    fn full_glob_lookup(&self, name: &str, lower: &str) -> Vec<MimeWeight> {
        let buf = self.buf();
        let base = self.header.glob_list_offset.get() as usize;
        if base == 0 {
            return Vec::new();
        }
        let count = read_u32_be(buf, base).unwrap_or(0) as usize;
        let mut results = Vec::new();
        for i in 0..count {
            let entry = base + 4 + i * 12;
            let glob_offset = match read_u32_be(buf, entry) {
                Some(o) => o as usize,
                None => break,
            };
            let pattern = match read_str(buf, glob_offset) {
                Some(p) => p,
                None => continue,
            };
            let weight_flags = read_u32_be(buf, entry + 8).unwrap_or(0);
            let case_sensitive = weight_flags & CASE_SENSITIVE_FLAG != 0;
            let mode = if case_sensitive {
                MatchMode::CaseSensitive
            } else {
                MatchMode::CaseInsensitive
            };
            let glob = match GlobPattern::new(pattern, mode) {
                Ok(g) => g,
                Err(_) => continue,
            };
            let candidate = if case_sensitive { name } else { lower };
            if glob.matches(candidate) {
                let mime_offset = read_u32_be(buf, entry + 4).unwrap_or(0) as usize;
                if let Some(mime) = read_str(buf, mime_offset) {
                    results.push(MimeWeight {
                        mime: mime.to_string(),
                        weight: weight_flags & WEIGHT_MASK,
                    });
                }
            }
        }
        results
    }

    // ----- magic lookups -----

    /// Largest byte count any magic rule in this cache may inspect.
    pub fn max_extent(&self) -> usize {
        let base = self.header.magic_list_offset.get() as usize;
        if base == 0 {
            return 0;
        }
        read_u32_be(self.buf(), base + 4).unwrap_or(0) as usize
    }

    /// Sniff `data` against this cache's magic rules, highest priority
    /// first. Non-matching rules veto their MIME type out of `filter`,
    /// identical to [`MagicSet::lookup_data`](crate::magic::MagicSet::lookup_data).
    pub fn magic_lookup_data(
        &self,
        data: &[u8],
        mut filter: Option<&mut Vec<String>>,
    ) -> Option<(String, u32)> {
        let buf = self.buf();
        let base = self.header.magic_list_offset.get() as usize;
        if base == 0 {
            return None;
        }
        let n_matches = read_u32_be(buf, base)? as usize;
        let first_match = read_u32_be(buf, base + 8)? as usize;
        for i in 0..n_matches {
            let entry = first_match + i * 16;
            let priority = read_u32_be(buf, entry)?;
            let mime_offset = read_u32_be(buf, entry + 4)? as usize;
            let n_matchlets = read_u32_be(buf, entry + 8)?;
            let first_matchlet = read_u32_be(buf, entry + 12)?;
            let mime = read_str(buf, mime_offset)?;
            if self.magic_matchlets_match(data, n_matchlets, first_matchlet) {
                return Some((mime.to_string(), priority));
            }
            if let Some(list) = filter.as_deref_mut() {
                list.retain(|candidate| candidate != mime);
            }
        }
        None
    }

    /// Any-of over a matchlet list.
    fn magic_matchlets_match(&self, data: &[u8], n_matchlets: u32, list_offset: u32) -> bool {
        (0..n_matchlets as usize)
            .any(|i| self.magic_matchlet_match(data, list_offset as usize + i * 32))
    }

    /// One on-disk matchlet: masked compare over the offset range, then the
    /// recursive child requirement.
    fn magic_matchlet_match(&self, data: &[u8], entry: usize) -> bool {
        let buf = self.buf();
        let range_start = match read_u32_be(buf, entry) {
            Some(v) => v as usize,
            None => return false,
        };
        let range_length = read_u32_be(buf, entry + 4).unwrap_or(1).max(1) as usize;
        let value_length = read_u32_be(buf, entry + 12).unwrap_or(0) as usize;
        let value_offset = read_u32_be(buf, entry + 16).unwrap_or(0) as usize;
        let mask_offset = read_u32_be(buf, entry + 20).unwrap_or(0) as usize;
        let n_children = read_u32_be(buf, entry + 24).unwrap_or(0);
        let first_child = read_u32_be(buf, entry + 28).unwrap_or(0);

        let value = match buf.get(value_offset..value_offset + value_length) {
            Some(v) if value_offset != 0 => v,
            _ => return false,
        };
        let mask = if mask_offset != 0 {
            match buf.get(mask_offset..mask_offset + value_length) {
                Some(m) => Some(m),
                None => return false,
            }
        } else {
            None
        };

        for start in range_start..range_start + range_length {
            let end = match start.checked_add(value_length) {
                Some(e) if e <= data.len() => e,
                _ => break,
            };
            let window = &data[start..end];
            let hit = match mask {
                Some(mask) => window
                    .iter()
                    .zip(value.iter())
                    .zip(mask.iter())
                    .all(|((&d, &v), &m)| d & m == v & m),
                None => window == value,
            };
            if !hit {
                continue;
            }
            if n_children == 0 || self.magic_matchlets_match(data, n_children, first_child) {
                return true;
            }
        }
        false
    }

    // ----- dump support -----

    /// Entry counts per list: (aliases, parents, literals, globs, magic,
    /// icons, generic icons).
    pub fn stats(&self) -> (u32, u32, u32, u32, u32, u32, u32) {
        let count = |offset: u32| -> u32 {
            if offset == 0 {
                0
            } else {
                read_u32_be(self.buf(), offset as usize).unwrap_or(0)
            }
        };
        (
            count(self.header.alias_list_offset.get()),
            count(self.header.parent_list_offset.get()),
            count(self.header.literal_list_offset.get()),
            count(self.header.glob_list_offset.get()),
            count(self.header.magic_list_offset.get()),
            count(self.header.icons_list_offset.get()),
            count(self.generic_icons_list_offset),
        )
    }
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cache")
            .field("path", &self.path)
            .field("minor", &self.minor)
            .field("size", &self.mmap.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cache_file(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_too_small_rejected() {
        let file = cache_file(&[0, 1]);
        assert!(matches!(
            Cache::open(file.path()),
            Err(MimeError::CacheTooSmall { .. })
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        // major 2
        let mut data = vec![0u8; 40];
        data[1] = 2;
        data[3] = 2;
        let file = cache_file(&data);
        assert!(matches!(
            Cache::open(file.path()),
            Err(MimeError::UnsupportedCacheVersion { major: 2, minor: 2 })
        ));

        // minor 3
        let mut data = vec![0u8; 40];
        data[1] = 1;
        data[3] = 3;
        let file = cache_file(&data);
        assert!(matches!(
            Cache::open(file.path()),
            Err(MimeError::UnsupportedCacheVersion { major: 1, minor: 3 })
        ));
    }

    #[test]
    fn test_empty_valid_cache() {
        // Valid 1.2 header with all list offsets zero
        let mut data = vec![0u8; 40];
        data[1] = 1;
        data[3] = 2;
        let cache = Cache::open(cache_file(&data).path()).unwrap();
        assert_eq!(cache.minor_version(), 2);
        assert_eq!(cache.alias_lookup("text/xml"), None);
        assert!(cache.parent_lookup("text/x-python").is_empty());
        assert!(cache.glob_lookup_file_name("foo.txt", 5).is_empty());
        assert_eq!(cache.magic_lookup_data(b"data", None), None);
        assert_eq!(cache.max_extent(), 0);
    }

    #[test]
    fn test_truncated_list_offset_is_harmless() {
        // Alias list offset points past end of file
        let mut data = vec![0u8; 40];
        data[1] = 1;
        data[3] = 2;
        data[4..8].copy_from_slice(&0xFFFF_0000u32.to_be_bytes());
        let cache = Cache::open(cache_file(&data).path()).unwrap();
        assert_eq!(cache.alias_lookup("text/xml"), None);
    }
}

//! Content-sniffing magic engine
//!
//! Parses `mime/magic` files and evaluates their byte-pattern rules against
//! file content. A magic file starts with the exact 12-byte header
//! `MIME-Magic\0\n`, followed by `[priority:mime/type]` sections. Each
//! section holds one or more matchlet lines:
//!
//! ```text
//! [indent] '>' offset '=' <len:u16 BE> <value bytes> ['&' <mask bytes>] ['~' word] ['+' range] '\n'
//! ```
//!
//! Matchlets form a tree through their indent levels: a matchlet with
//! deeper-indented followers only succeeds if at least one child subtree
//! also matches; a leaf matchlet matching is sufficient on its own.
//!
//! Rules are kept sorted by priority, descending, with ties in insertion
//! order, so the first structural match during a scan is the winner.

use log::{debug, warn};
use std::fs;
use std::path::Path;

/// Exact magic-file header.
pub const MAGIC_FILE_HEADER: &[u8; 12] = b"MIME-Magic\0\n";

/// One node in a magic rule's byte-pattern tree.
#[derive(Debug, Clone)]
pub struct MagicMatchlet {
    /// Base byte offset into the sniffed data
    pub offset: usize,
    /// Expected bytes, already swapped to native order for multi-byte words
    pub value: Vec<u8>,
    /// Optional mask, same length as `value`
    pub mask: Option<Vec<u8>>,
    /// 1, 2, or 4
    pub word_size: usize,
    /// Number of start offsets to try: `[offset, offset + range_length)`
    pub range_length: usize,
    /// Deeper-indented matchlets; at least one must match if non-empty
    pub children: Vec<MagicMatchlet>,
}

impl MagicMatchlet {
    /// Largest byte index this subtree can inspect.
    fn extent(&self) -> usize {
        let own = self.offset + self.value.len() + self.range_length;
        self.children
            .iter()
            .map(|c| c.extent())
            .fold(own, usize::max)
    }

    /// Test this matchlet (and, recursively, its children) against `data`.
    fn matches(&self, data: &[u8]) -> bool {
        for start in self.offset..self.offset + self.range_length {
            let end = match start.checked_add(self.value.len()) {
                Some(e) if e <= data.len() => e,
                // Later offsets only reach further; stop the range scan
                _ => break,
            };
            let window = &data[start..end];
            let hit = match &self.mask {
                Some(mask) => window
                    .iter()
                    .zip(self.value.iter())
                    .zip(mask.iter())
                    .all(|((&d, &v), &m)| d & m == v & m),
                None => window == self.value.as_slice(),
            };
            if !hit {
                continue;
            }
            if self.children.is_empty() || self.children.iter().any(|c| c.matches(data)) {
                return true;
            }
            // Value matched here but no child subtree did; try the next
            // offset in the range.
        }
        false
    }
}

/// One magic rule: a MIME type, a priority, and a matchlet tree.
#[derive(Debug, Clone)]
pub struct MagicMatch {
    /// The type this rule sniffs
    pub mime: String,
    /// Rule priority, 0-100 by convention
    pub priority: u32,
    /// Top-level (indent 0) matchlets; any one matching wins
    pub matchlets: Vec<MagicMatchlet>,
}

impl MagicMatch {
    fn matches(&self, data: &[u8]) -> bool {
        self.matchlets.iter().any(|m| m.matches(data))
    }
}

/// Priority-ordered set of magic rules.
#[derive(Debug, Default)]
pub struct MagicSet {
    /// Sorted descending by priority; ties keep insertion order
    matches: Vec<MagicMatch>,
    max_extent: usize,
}

impl MagicSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a rule at its priority position.
    pub fn add(&mut self, entry: MagicMatch) {
        for m in &entry.matchlets {
            self.max_extent = self.max_extent.max(m.extent());
        }
        let idx = self
            .matches
            .partition_point(|m| m.priority >= entry.priority);
        self.matches.insert(idx, entry);
    }

    /// Parse a `mime/magic` file, appending its rules.
    ///
    /// A missing file, bad header, or short file contributes nothing; a
    /// malformed section is skipped up to the next section start.
    pub fn load_from(&mut self, path: &Path) {
        let data = match fs::read(path) {
            Ok(d) => d,
            Err(_) => return,
        };
        if data.len() < MAGIC_FILE_HEADER.len() || &data[..MAGIC_FILE_HEADER.len()] != MAGIC_FILE_HEADER
        {
            warn!("{} is not a MIME magic file, skipping", path.display());
            return;
        }
        let mut cursor = MAGIC_FILE_HEADER.len();
        while cursor < data.len() {
            match parse_section(&data, cursor) {
                Ok((entry, next)) => {
                    self.add(entry);
                    cursor = next;
                }
                Err(next) => {
                    debug!("skipping malformed magic section in {}", path.display());
                    cursor = next;
                }
            }
        }
    }

    /// Maximum byte count needed from a file to evaluate every rule.
    pub fn max_extent(&self) -> usize {
        self.max_extent
    }

    /// Sniff `data`, returning the highest-priority matching rule's MIME
    /// type and priority.
    ///
    /// `filter` is the glob-candidate veto list: every rule that is checked
    /// and does **not** match has its MIME type removed from the list,
    /// letting content sniffing disqualify demonstrably-wrong name-based
    /// guesses.
    pub fn lookup_data(
        &self,
        data: &[u8],
        mut filter: Option<&mut Vec<String>>,
    ) -> Option<(String, u32)> {
        for rule in &self.matches {
            if rule.matches(data) {
                return Some((rule.mime.clone(), rule.priority));
            }
            if let Some(list) = filter.as_deref_mut() {
                list.retain(|candidate| candidate != &rule.mime);
            }
        }
        None
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// True if no rules were loaded.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// `(mime, priority)` view in scan order, for the debug dump.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.matches.iter().map(|m| (m.mime.as_str(), m.priority))
    }
}

/// Parse one `[priority:mime]` section plus its matchlet lines.
///
/// Returns the rule and the cursor position after it. On a malformed
/// section, returns `Err` with the position of the next section start (or
/// end of data) so the caller can resync.
fn parse_section(data: &[u8], start: usize) -> Result<(MagicMatch, usize), usize> {
    let resync = |from: usize| -> usize {
        let mut i = from;
        while i + 1 < data.len() {
            if data[i] == b'\n' && data[i + 1] == b'[' {
                return i + 1;
            }
            i += 1;
        }
        data.len()
    };

    let mut cursor = start;
    if data.get(cursor) != Some(&b'[') {
        return Err(resync(cursor));
    }
    cursor += 1;
    let (priority, next) = parse_digits(data, cursor).ok_or_else(|| resync(cursor))?;
    cursor = next;
    if data.get(cursor) != Some(&b':') {
        return Err(resync(cursor));
    }
    cursor += 1;
    let mime_end = memchr::memchr(b']', &data[cursor..]).ok_or(data.len())? + cursor;
    let mime = std::str::from_utf8(&data[cursor..mime_end])
        .map_err(|_| resync(mime_end))?
        .to_string();
    cursor = mime_end + 1;
    if data.get(cursor) == Some(&b'\n') {
        cursor += 1;
    }

    // Flat matchlet list with indents, then fold into a tree
    let mut flat: Vec<(u32, MagicMatchlet)> = Vec::new();
    while cursor < data.len() && data[cursor] != b'[' {
        match parse_matchlet(data, cursor) {
            Ok((parsed, next)) => {
                if let Some(m) = parsed {
                    flat.push(m);
                }
                cursor = next;
            }
            Err(_) => return Err(resync(cursor)),
        }
    }
    if flat.is_empty() {
        return Err(cursor);
    }

    Ok((
        MagicMatch {
            mime,
            priority,
            matchlets: build_tree(&mut flat.into_iter().peekable(), 0),
        },
        cursor,
    ))
}

/// Fold the flat `(indent, matchlet)` stream into the indent tree.
fn build_tree(
    flat: &mut std::iter::Peekable<impl Iterator<Item = (u32, MagicMatchlet)>>,
    level: u32,
) -> Vec<MagicMatchlet> {
    let mut out: Vec<MagicMatchlet> = Vec::new();
    while let Some(&(indent, _)) = flat.peek() {
        if indent < level {
            break;
        }
        if indent > level {
            // Deeper matchlet without a parent at this level: attach to the
            // previous sibling if any, otherwise drop the orphan.
            match out.last_mut() {
                Some(prev) => {
                    let deeper = build_tree(flat, indent);
                    prev.children.extend(deeper);
                }
                None => {
                    flat.next();
                }
            }
            continue;
        }
        let (_, mut matchlet) = flat.next().unwrap();
        if let Some(&(next_indent, _)) = flat.peek() {
            if next_indent > level {
                matchlet.children = build_tree(flat, next_indent);
            }
        }
        out.push(matchlet);
    }
    out
}

/// Parse a run of ASCII digits. `None` if empty.
fn parse_digits(data: &[u8], start: usize) -> Option<(u32, usize)> {
    let mut cursor = start;
    let mut value: u32 = 0;
    while let Some(&b) = data.get(cursor) {
        if !b.is_ascii_digit() {
            break;
        }
        value = value.saturating_mul(10).saturating_add((b - b'0') as u32);
        cursor += 1;
    }
    if cursor == start {
        None
    } else {
        Some((value, cursor))
    }
}

/// Parse one matchlet line starting at `start`.
///
/// `Ok((None, next))` means the line parsed but is unusable (bad word size
/// or a value length not divisible by the word size) and was discarded.
#[allow(clippy::type_complexity)]
fn parse_matchlet(
    data: &[u8],
    start: usize,
) -> Result<(Option<(u32, MagicMatchlet)>, usize), ()> {
    let mut cursor = start;

    // Optional indent digits, default 0
    let indent = match parse_digits(data, cursor) {
        Some((v, next)) => {
            cursor = next;
            v
        }
        None => 0,
    };
    if data.get(cursor) != Some(&b'>') {
        return Err(());
    }
    cursor += 1;
    let (offset, next) = parse_digits(data, cursor).ok_or(())?;
    cursor = next;
    if data.get(cursor) != Some(&b'=') {
        return Err(());
    }
    cursor += 1;

    let len_bytes = data.get(cursor..cursor + 2).ok_or(())?;
    let value_len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
    cursor += 2;
    let mut value = data.get(cursor..cursor + value_len).ok_or(())?.to_vec();
    cursor += value_len;

    let mut mask: Option<Vec<u8>> = None;
    if data.get(cursor) == Some(&b'&') {
        cursor += 1;
        mask = Some(data.get(cursor..cursor + value_len).ok_or(())?.to_vec());
        cursor += value_len;
    }

    let mut word_size: usize = 1;
    if data.get(cursor) == Some(&b'~') {
        cursor += 1;
        let (w, next) = parse_digits(data, cursor).ok_or(())?;
        word_size = w as usize;
        cursor = next;
    }

    let mut range_length: usize = 1;
    if data.get(cursor) == Some(&b'+') {
        cursor += 1;
        let (r, next) = parse_digits(data, cursor).ok_or(())?;
        range_length = r as usize;
        cursor = next;
    }

    // Consume through end of line
    match memchr::memchr(b'\n', &data[cursor..]) {
        Some(nl) => cursor += nl + 1,
        None => cursor = data.len(),
    }

    if !matches!(word_size, 1 | 2 | 4) {
        return Ok((None, cursor));
    }
    if word_size > 1 {
        if value_len % word_size != 0 {
            // Cannot be swapped to native order; discard the matchlet
            return Ok((None, cursor));
        }
        // Values are stored big-endian in the file; swap once at load time
        // on little-endian hosts so matching is a plain byte compare.
        if cfg!(target_endian = "little") {
            for chunk in value.chunks_mut(word_size) {
                chunk.reverse();
            }
            if let Some(mask) = mask.as_mut() {
                for chunk in mask.chunks_mut(word_size) {
                    chunk.reverse();
                }
            }
        }
    }

    Ok((
        Some((
            indent,
            MagicMatchlet {
                offset: offset as usize,
                value,
                mask,
                word_size,
                range_length: range_length.max(1),
                children: Vec::new(),
            },
        )),
        cursor,
    ))
}

//! Byte and UTF-8 utilities shared by the glob and sniffing engines
//!
//! The shared-mime-info database predates the modern 4-byte UTF-8 cap, so the
//! decoder here accepts the legacy 1-6 byte scheme: suffix-tree characters in
//! `mime.cache` files are stored as the UCS-4 values this decoder produces.
//! Case folding is deliberately ASCII-only; glob matching never does locale
//! or full-Unicode folding.

use memchr::memrchr;

/// Number of leading bytes inspected by [`binary_or_text_fallback`].
pub const TEXT_SCAN_WINDOW: usize = 32;

/// Decode one legacy UTF-8 sequence starting at `bytes[0]`.
///
/// Returns the code point and the sequence length in bytes. Decoding is
/// best-effort: a malformed or truncated sequence yields the leading byte's
/// payload bits and whatever continuation bytes are present, never an error.
pub fn utf8_to_codepoint(bytes: &[u8]) -> (u32, usize) {
    let first = match bytes.first() {
        Some(&b) => b,
        None => return (0, 0),
    };

    let (mut cp, len) = match first {
        b if b < 0x80 => (b as u32, 1),
        b if b & 0xE0 == 0xC0 => ((b & 0x1F) as u32, 2),
        b if b & 0xF0 == 0xE0 => ((b & 0x0F) as u32, 3),
        b if b & 0xF8 == 0xF0 => ((b & 0x07) as u32, 4),
        b if b & 0xFC == 0xF8 => ((b & 0x03) as u32, 5),
        b if b & 0xFE == 0xFC => ((b & 0x01) as u32, 6),
        // Stray continuation byte: consume it as-is
        b => return (b as u32, 1),
    };

    let mut consumed = 1;
    for &b in bytes.iter().take(len).skip(1) {
        if b & 0xC0 != 0x80 {
            break;
        }
        cp = (cp << 6) | (b & 0x3F) as u32;
        consumed += 1;
    }
    (cp, consumed)
}

/// Lower-case a UCS-4 code point, ASCII range only.
#[inline]
pub fn codepoint_to_lower(cp: u32) -> u32 {
    if (0x41..=0x5A).contains(&cp) {
        cp + 0x20
    } else {
        cp
    }
}

/// Lower-case a string, mapping only ASCII `A-Z`.
pub fn ascii_lowercase(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_uppercase() {
                c.to_ascii_lowercase()
            } else {
                c
            }
        })
        .collect()
}

/// Return the substring after the last `/`, or the whole string if none.
pub fn base_name(path: &str) -> &str {
    match memrchr(b'/', path.as_bytes()) {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Last-resort classifier when no glob or magic rule matched.
///
/// Scans at most the first 32 bytes: any control byte other than tab, LF, or
/// CR means binary. Returns `"application/octet-stream"` or `"text/plain"`.
pub fn binary_or_text_fallback(data: &[u8]) -> &'static str {
    let window = &data[..data.len().min(TEXT_SCAN_WINDOW)];
    for &b in window {
        if b < 32 && b != b'\t' && b != b'\n' && b != b'\r' {
            return crate::UNKNOWN_TYPE;
        }
    }
    crate::TEXT_PLAIN
}

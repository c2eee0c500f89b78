//! fnmatch-style glob pattern matching
//!
//! This is the slow path of filename matching, used only for patterns that
//! are neither plain literals nor simple `*.ext` suffixes: wildcards (`*`,
//! `?`), character classes (`[...]`, `[!...]`, ranges), and backslash
//! escapes. Patterns are parsed once into segments and matched against
//! filenames with a backtracking walk.
//!
//! Case folding is ASCII-only throughout, matching the rest of the glob
//! engine.

use crate::error::MimeError;
use std::fmt;

/// Match mode for glob patterns.
///
/// Comes from the `cs` token in a `globs2` flags field; the default is
/// case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// Case-sensitive matching
    CaseSensitive,
    /// ASCII case-insensitive matching
    CaseInsensitive,
}

/// A segment of a parsed glob pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// Literal run with no wildcards
    Literal(Vec<char>),
    /// `*` - zero or more of any character
    Star,
    /// `?` - exactly one character
    Question,
    /// `[...]` character class
    CharClass { items: Vec<ClassItem>, negated: bool },
}

/// One alternative inside a character class.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ClassItem {
    Char(char),
    /// Inclusive range
    Range(char, char),
}

/// A parsed glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    pattern: String,
    segments: Vec<Segment>,
    mode: MatchMode,
}

#[inline]
fn fold(c: char, mode: MatchMode) -> char {
    match mode {
        MatchMode::CaseSensitive => c,
        MatchMode::CaseInsensitive => c.to_ascii_lowercase(),
    }
}

impl GlobPattern {
    /// Parse a glob pattern.
    ///
    /// Returns an error for malformed patterns (unclosed or empty character
    /// class, inverted range, trailing backslash); the glob loader skips
    /// such lines.
    pub fn new(pattern: &str, mode: MatchMode) -> Result<Self, MimeError> {
        let segments = Self::parse(pattern)?;
        Ok(Self {
            pattern: pattern.to_string(),
            segments,
            mode,
        })
    }

    /// The original pattern string.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The match mode this pattern was built with.
    pub fn mode(&self) -> MatchMode {
        self.mode
    }

    /// Test the pattern against a filename.
    pub fn matches(&self, name: &str) -> bool {
        let chars: Vec<char> = name.chars().collect();
        // Step budget bounds backtracking on pathological patterns like
        // *a*b*c*...; an exhausted budget counts as no match.
        let mut steps = 100_000usize;
        self.match_at(&chars, 0, 0, &mut steps)
    }

    fn match_at(&self, name: &[char], pos: usize, seg: usize, steps: &mut usize) -> bool {
        if *steps == 0 {
            return false;
        }
        *steps -= 1;

        let segment = match self.segments.get(seg) {
            Some(s) => s,
            // All segments consumed: match iff the name is too
            None => return pos >= name.len(),
        };

        match segment {
            Segment::Literal(lit) => {
                if pos + lit.len() > name.len() {
                    return false;
                }
                for (i, &lc) in lit.iter().enumerate() {
                    if fold(name[pos + i], self.mode) != fold(lc, self.mode) {
                        return false;
                    }
                }
                self.match_at(name, pos + lit.len(), seg + 1, steps)
            }

            Segment::Question => {
                pos < name.len() && self.match_at(name, pos + 1, seg + 1, steps)
            }

            Segment::CharClass { items, negated } => {
                let ch = match name.get(pos) {
                    Some(&c) => fold(c, self.mode),
                    None => return false,
                };
                let in_class = items.iter().any(|item| match item {
                    ClassItem::Char(c) => ch == fold(*c, self.mode),
                    ClassItem::Range(lo, hi) => {
                        ch >= fold(*lo, self.mode) && ch <= fold(*hi, self.mode)
                    }
                });
                if in_class == *negated {
                    return false;
                }
                self.match_at(name, pos + 1, seg + 1, steps)
            }

            Segment::Star => {
                // Trailing star swallows the rest of the name
                if seg + 1 >= self.segments.len() {
                    return true;
                }
                for start in pos..=name.len() {
                    if self.match_at(name, start, seg + 1, steps) {
                        return true;
                    }
                }
                false
            }
        }
    }

    fn parse(pattern: &str) -> Result<Vec<Segment>, MimeError> {
        let mut segments = Vec::new();
        let mut literal = Vec::new();
        let mut chars = pattern.chars().peekable();

        fn flush(literal: &mut Vec<char>, segments: &mut Vec<Segment>) {
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(literal)));
            }
        }

        while let Some(ch) = chars.next() {
            match ch {
                '*' => {
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Star);
                }
                '?' => {
                    flush(&mut literal, &mut segments);
                    segments.push(Segment::Question);
                }
                '\\' => match chars.next() {
                    Some(escaped) => literal.push(escaped),
                    None => {
                        return Err(MimeError::Format(format!(
                            "trailing backslash in glob {:?}",
                            pattern
                        )))
                    }
                },
                '[' => {
                    flush(&mut literal, &mut segments);

                    let negated = matches!(chars.peek(), Some('!') | Some('^'));
                    if negated {
                        chars.next();
                    }

                    let mut items = Vec::new();
                    let mut pending: Option<char> = None;
                    loop {
                        let c = chars.next().ok_or_else(|| {
                            MimeError::Format(format!("unclosed character class in {:?}", pattern))
                        })?;
                        match c {
                            ']' if !items.is_empty() || pending.is_some() => {
                                if let Some(p) = pending.take() {
                                    items.push(ClassItem::Char(p));
                                }
                                break;
                            }
                            '-' if pending.is_some()
                                && chars.peek().is_some()
                                && chars.peek() != Some(&']') =>
                            {
                                let lo = pending.take().unwrap();
                                let hi = chars.next().unwrap();
                                if lo > hi {
                                    return Err(MimeError::Format(format!(
                                        "inverted range {}-{} in {:?}",
                                        lo, hi, pattern
                                    )));
                                }
                                items.push(ClassItem::Range(lo, hi));
                            }
                            _ => {
                                if let Some(p) = pending.replace(c) {
                                    items.push(ClassItem::Char(p));
                                }
                            }
                        }
                    }
                    if items.is_empty() {
                        return Err(MimeError::Format(format!(
                            "empty character class in {:?}",
                            pattern
                        )));
                    }
                    segments.push(Segment::CharClass { items, negated });
                }
                _ => literal.push(ch),
            }
        }
        flush(&mut literal, &mut segments);
        Ok(segments)
    }
}

impl fmt::Display for GlobPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern)
    }
}

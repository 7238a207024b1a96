//! Small byte-string helpers used by the header parser and the ASCII codec.

/// Returns `true` if both strings are byte-wise identical.
#[inline]
pub fn string_equals(a: &[u8], b: &[u8]) -> bool {
    a == b
}

/// Returns `true` if the first `n` bytes of both strings are identical. Like
/// `strncmp`, the end of a string acts as a terminator: a string shorter than
/// `n` only matches another string of the same length.
#[inline]
pub fn string_equals_upto(a: &[u8], b: &[u8], n: usize) -> bool {
    let a = &a[..a.len().min(n)];
    let b = &b[..b.len().min(n)];
    a == b
}

/// Whitespace that separates tokens inside a line.
#[inline]
pub(crate) fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t' || b == 0x0b || b == 0x0c
}

/// Bytes that terminate a line.
#[inline]
pub(crate) fn is_line_end(b: u8) -> bool {
    b == b'\n' || b == b'\r' || b == b'\0'
}

pub(crate) fn trim_start(mut s: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = s {
        if !is_blank(*first) {
            break;
        }
        s = rest;
    }
    s
}

pub(crate) fn trim(s: &[u8]) -> &[u8] {
    let mut s = trim_start(s);
    while let [rest @ .., last] = s {
        if !is_blank(*last) {
            break;
        }
        s = rest;
    }
    s
}

/// Splits a line into whitespace separated tokens.
pub(crate) fn tokens(line: &[u8]) -> impl Iterator<Item = &[u8]> {
    line.split(|&b| is_blank(b)).filter(|t| !t.is_empty())
}

/// If `line` starts with the word `keyword` (followed by whitespace or the end
/// of the line), returns the rest of the line after the single separator
/// byte. Further whitespace is kept.
pub(crate) fn strip_keyword<'a>(line: &'a [u8], keyword: &str) -> Option<&'a [u8]> {
    let kw = keyword.as_bytes();
    if !string_equals_upto(line, kw, kw.len()) || line.len() < kw.len() {
        return None;
    }

    match line.get(kw.len()) {
        None => Some(&line[kw.len()..]),
        Some(&b) if is_blank(b) => Some(&line[kw.len() + 1..]),
        Some(_) => None,
    }
}

/// Renders bytes for error messages, cutting them off after `max` bytes.
pub(crate) fn debug_fmt_bytes(data: &[u8], max: usize) -> String {
    let data = &data[..data.len().min(max)];
    match std::str::from_utf8(data) {
        Ok(s) => format!("{:?}", s),
        Err(_) => format!("{:?}", data),
    }
}

/// Segments a byte buffer into lines.
///
/// A line is the run of bytes up to the first `'\0'`, `'\r'` or `'\n'`. A
/// `"\r\n"` pair counts as one terminator. The header parser and the ASCII
/// codec both walk the input with this type, so they agree on where every
/// line starts and ends.
#[derive(Debug, Clone)]
pub(crate) struct Lines<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Lines<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Offset of the first byte not yet consumed.
    pub(crate) fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the next line without its terminator and untrimmed, or `None`
    /// at the end of the input.
    pub(crate) fn next_raw(&mut self) -> Option<&'a [u8]> {
        if self.pos >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| is_line_end(b)).unwrap_or(rest.len());
        let line = &rest[..len];

        let mut consumed = len;
        if let Some(&term) = rest.get(len) {
            consumed += 1;
            if term == b'\r' && rest.get(len + 1) == Some(&b'\n') {
                consumed += 1;
            }
        }
        self.pos += consumed;

        Some(line)
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    /// Returns the next non-blank line, trimmed.
    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = trim(self.next_raw()?);
            if !line.is_empty() {
                return Some(line);
            }
        }
    }
}

//! SIMD-accelerated XML scanning using memchr
//!
//! The scanner is a cursor over an immutable input buffer. The parser never
//! writes into the input; every token is a `(start, end)` span.
//!
//! Also hosts the nesting-aware close-tag matcher used by the recursive parser.

use memchr::{memchr, memmem};

/// Which quote characters delimit attribute values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuotePolicy {
    /// Only `"` delimits values; `'` is an ordinary character
    Double,
    /// Only `'` delimits values; `"` is an ordinary character
    Single,
    /// Either quote character, closed by the same character
    #[default]
    Both,
}

impl QuotePolicy {
    /// Check if a byte opens a quoted value under this policy
    #[inline]
    pub fn is_quote(self, b: u8) -> bool {
        match self {
            QuotePolicy::Double => b == b'"',
            QuotePolicy::Single => b == b'\'',
            QuotePolicy::Both => b == b'"' || b == b'\'',
        }
    }
}

/// Span of a matched closing tag `</name>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CloseTag {
    /// Offset of the `<`
    pub start: usize,
    /// Offset just past the `>`
    pub end: usize,
}

/// Scanner for XML delimiter detection
pub struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    /// Create a new scanner for the given input
    #[inline]
    pub fn new(input: &'a [u8]) -> Self {
        Scanner { input, pos: 0 }
    }

    /// Create a scanner starting at `pos`
    #[inline]
    pub fn at(input: &'a [u8], pos: usize) -> Self {
        Scanner {
            input,
            pos: pos.min(input.len()),
        }
    }

    /// Get the current position
    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Set the current position
    #[inline]
    pub fn set_position(&mut self, pos: usize) {
        self.pos = pos.min(self.input.len());
    }

    /// Get remaining bytes
    #[inline]
    pub fn remaining(&self) -> &'a [u8] {
        &self.input[self.pos..]
    }

    /// Advance by n bytes
    #[inline]
    pub fn advance(&mut self, n: usize) {
        self.pos = (self.pos + n).min(self.input.len());
    }

    /// Skip whitespace characters (space, tab, newline, carriage return)
    #[inline]
    pub fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() {
            match self.input[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.pos += 1,
                _ => break,
            }
        }
    }

    /// Find next '<' (tag start) using SIMD
    #[inline]
    pub fn find_tag_start(&self) -> Option<usize> {
        memchr(b'<', &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Find next '>' (tag end) using SIMD
    /// Note: Does not handle '>' inside quotes - use find_tag_end_quoted for that
    #[inline]
    pub fn find_tag_end(&self) -> Option<usize> {
        memchr(b'>', &self.input[self.pos..]).map(|i| self.pos + i)
    }

    /// Find tag end while handling quotes properly
    /// Returns the position of '>' that is not inside a quoted value
    pub fn find_tag_end_quoted(&self, quotes: QuotePolicy) -> Option<usize> {
        let mut pos = self.pos;
        let mut open_quote: Option<u8> = None;

        while pos < self.input.len() {
            let b = self.input[pos];
            match open_quote {
                Some(q) if b == q => open_quote = None,
                Some(_) => {}
                None if quotes.is_quote(b) => open_quote = Some(b),
                None if b == b'>' => return Some(pos),
                None => {}
            }
            pos += 1;
        }
        None
    }

    /// Find the end of a `<!...>` markup declaration, honoring an internal
    /// `[...]` subset and quoted literals. Returns the position of the final '>'.
    pub fn find_declaration_end(&self) -> Option<usize> {
        let mut pos = self.pos;
        let mut brackets = 0usize;
        let mut open_quote: Option<u8> = None;

        while pos < self.input.len() {
            let b = self.input[pos];
            match open_quote {
                Some(q) if b == q => open_quote = None,
                Some(_) => {}
                None => match b {
                    b'"' | b'\'' => open_quote = Some(b),
                    b'[' => brackets += 1,
                    b']' => brackets = brackets.saturating_sub(1),
                    b'>' if brackets == 0 => return Some(pos),
                    _ => {}
                },
            }
            pos += 1;
        }
        None
    }

    /// Find next occurrence of a byte sequence
    #[inline]
    pub fn find_seq(&self, needle: &[u8]) -> Option<usize> {
        memmem::find(&self.input[self.pos..], needle).map(|i| self.pos + i)
    }

    /// Check if input starts with a byte sequence at current position
    #[inline]
    pub fn starts_with(&self, needle: &[u8]) -> bool {
        self.input[self.pos..].starts_with(needle)
    }

    /// Read an XML name (starts with letter/underscore, continues with letters/digits/hyphens/underscores/periods)
    pub fn read_name(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;

        if start >= self.input.len() {
            return None;
        }

        let first = self.input[start];
        if !is_name_start_char(first) {
            return None;
        }

        self.pos += 1;

        while self.pos < self.input.len() && is_name_char(self.input[self.pos]) {
            self.pos += 1;
        }

        Some(&self.input[start..self.pos])
    }
}

/// Check if byte is valid XML name start character
/// Allows ASCII letters, underscore, colon, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_start_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'_' | b':') || b >= 0x80
}

/// Check if byte is valid XML name character
/// Allows ASCII alphanumeric, punctuation, and non-ASCII (UTF-8 Unicode)
#[inline]
pub fn is_name_char(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b'.' | b':') || b >= 0x80
}

#[inline]
pub fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

/// Find the `</name>` that closes an element whose opening tag ends just
/// before `from`.
///
/// Nested elements with the same name are counted so the match is the
/// balanced one. Comments, CDATA sections, processing instructions,
/// declarations and quoted attribute values are skipped whole, so `>` and `/`
/// inside them are ordinary characters. Returns `None` if the element is
/// never closed.
pub fn find_xml_close(
    input: &[u8],
    from: usize,
    name: &[u8],
    quotes: QuotePolicy,
) -> Option<CloseTag> {
    let mut scanner = Scanner::at(input, from);
    let mut depth = 1usize;

    while let Some(lt) = scanner.find_tag_start() {
        scanner.set_position(lt);

        if scanner.starts_with(b"<!--") {
            scanner.advance(4);
            let end = scanner.find_seq(b"-->")?;
            scanner.set_position(end + 3);
        } else if scanner.starts_with(b"<![CDATA[") {
            scanner.advance(9);
            let end = scanner.find_seq(b"]]>")?;
            scanner.set_position(end + 3);
        } else if scanner.starts_with(b"<?") {
            scanner.advance(2);
            let end = scanner.find_seq(b"?>")?;
            scanner.set_position(end + 2);
        } else if scanner.starts_with(b"<!") {
            let end = scanner.find_declaration_end()?;
            scanner.set_position(end + 1);
        } else if scanner.starts_with(b"</") {
            scanner.advance(2);
            let tag_name = scanner.read_name();
            let gt = scanner.find_tag_end()?;
            if tag_name == Some(name) {
                depth -= 1;
                if depth == 0 {
                    return Some(CloseTag { start: lt, end: gt + 1 });
                }
            }
            scanner.set_position(gt + 1);
        } else {
            scanner.advance(1);
            let Some(tag_name) = scanner.read_name() else {
                // A stray '<' in text
                continue;
            };
            let gt = scanner.find_tag_end_quoted(quotes)?;
            let self_closing = input[gt - 1] == b'/';
            if tag_name == name && !self_closing {
                depth += 1;
            }
            scanner.set_position(gt + 1);
        }
    }
    None
}

//! Streaming Quoted-Printable filters
//!
//! Bytes outside printable ASCII, `=` and a `.` at the start of a line are
//! written as `=HH`. Lines are kept under [`LINE_WIDTH`] columns with soft
//! breaks (`=\r\n`). A space is held back one byte so a trailing space at the
//! end of the data is escaped instead of being left bare.

use super::{StreamFilter, LINE_WIDTH};

const HEX: &[u8; 16] = b"0123456789ABCDEF";

/// Quoted-Printable encoder
#[derive(Debug, Clone)]
pub struct QuotedPrintableEncoder {
    column: usize,
    held_space: bool,
}

impl QuotedPrintableEncoder {
    pub fn new() -> Self {
        QuotedPrintableEncoder {
            column: 0,
            held_space: false,
        }
    }

    fn literal(b: u8, line_start: bool) -> bool {
        matches!(b, b' '..=b'~') && b != b'=' && !(b == b'.' && line_start)
    }

    fn put(&mut self, b: u8, escape_space: bool, output: &mut Vec<u8>) {
        let literal = |line_start: bool| {
            Self::literal(b, line_start) && !(escape_space && b == b' ')
        };
        let width = |lit: bool| if lit { 1 } else { 3 };

        // Keep room for the soft break marker
        if self.column + width(literal(self.column == 0)) > LINE_WIDTH - 1 {
            output.extend_from_slice(b"=\r\n");
            self.column = 0;
        }

        if literal(self.column == 0) {
            output.push(b);
            self.column += 1;
        } else {
            output.extend_from_slice(&[b'=', HEX[(b >> 4) as usize], HEX[(b & 0x0F) as usize]]);
            self.column += 3;
        }
    }
}

impl Default for QuotedPrintableEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFilter for QuotedPrintableEncoder {
    fn filter(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize {
        let start = output.len();
        for &b in input {
            if self.held_space {
                self.held_space = false;
                self.put(b' ', false, output);
            }
            if b == b' ' {
                self.held_space = true;
            } else {
                self.put(b, false, output);
            }
        }
        output.len() - start
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> usize {
        let start = output.len();
        if self.held_space {
            self.held_space = false;
            self.put(b' ', true, output);
        }
        self.column = 0;
        output.len() - start
    }
}

/// Quoted-Printable decoder
///
/// Malformed escapes are passed through literally.
#[derive(Debug, Clone, Default)]
pub struct QuotedPrintableDecoder {
    pending: Vec<u8>,
}

impl QuotedPrintableDecoder {
    pub fn new() -> Self {
        QuotedPrintableDecoder::default()
    }

    fn push(&mut self, b: u8, output: &mut Vec<u8>) {
        if self.pending.is_empty() {
            if b == b'=' {
                self.pending.push(b);
            } else {
                output.push(b);
            }
            return;
        }

        match (self.pending.len(), self.pending.get(1).copied()) {
            (1, _) => match b {
                b'\n' => self.pending.clear(),
                b'\r' => self.pending.push(b),
                _ if b.is_ascii_hexdigit() => self.pending.push(b),
                _ => {
                    output.push(b'=');
                    self.pending.clear();
                    self.push(b, output);
                }
            },
            (2, Some(b'\r')) => {
                // Soft break; a bare CR still ends the break
                self.pending.clear();
                if b != b'\n' {
                    self.push(b, output);
                }
            }
            (2, Some(hi)) => {
                if let (Some(h), Some(l)) = (hex_value(hi), hex_value(b)) {
                    output.push((h << 4) | l);
                    self.pending.clear();
                } else {
                    output.extend_from_slice(&[b'=', hi]);
                    self.pending.clear();
                    self.push(b, output);
                }
            }
            _ => {
                output.extend_from_slice(&self.pending);
                self.pending.clear();
                self.push(b, output);
            }
        }
    }
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'A'..=b'F' => Some(b - b'A' + 10),
        b'a'..=b'f' => Some(b - b'a' + 10),
        _ => None,
    }
}

impl StreamFilter for QuotedPrintableDecoder {
    fn filter(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize {
        let start = output.len();
        for &b in input {
            self.push(b, output);
        }
        output.len() - start
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> usize {
        let start = output.len();
        if self.pending.get(1) != Some(&b'\r') {
            output.extend_from_slice(&self.pending);
        }
        self.pending.clear();
        output.len() - start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(input: &[u8]) -> String {
        let mut enc = QuotedPrintableEncoder::new();
        let mut out = Vec::new();
        enc.filter(input, &mut out);
        enc.finish(&mut out);
        String::from_utf8(out).unwrap()
    }

    fn decode(input: &[u8]) -> Vec<u8> {
        let mut dec = QuotedPrintableDecoder::new();
        let mut out = Vec::new();
        dec.filter(input, &mut out);
        dec.finish(&mut out);
        out
    }

    #[test]
    fn test_printable_passthrough() {
        assert_eq!(encode(b"Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_escapes() {
        assert_eq!(encode(b"a=b"), "a=3Db");
        assert_eq!(encode(b"\x00\xFF\n"), "=00=FF=0A");
        assert_eq!(encode(b".dot"), "=2Edot");
        assert_eq!(encode(b"a.b"), "a.b");
        assert_eq!(encode(b"end "), "end=20");
        assert_eq!(encode(b"a b"), "a b");
    }

    #[test]
    fn test_soft_breaks_keep_lines_short() {
        let text = encode(&[b'x'; 200]);
        for line in text.split("\r\n") {
            assert!(line.len() <= LINE_WIDTH);
        }
        assert_eq!(decode(text.as_bytes()), vec![b'x'; 200]);
    }

    #[test]
    fn test_leading_dot_after_soft_break() {
        let mut data = vec![b'x'; 75];
        data.push(b'.');
        let text = encode(&data);
        assert!(text.contains("=\r\n=2E"));
        assert_eq!(decode(text.as_bytes()), data);
    }

    #[test]
    fn test_decode_malformed_passthrough() {
        assert_eq!(decode(b"a=ZZ"), b"a=ZZ");
        assert_eq!(decode(b"a="), b"a=");
        assert_eq!(decode(b"a=4"), b"a=4");
        assert_eq!(decode(b"ab=\nc"), b"abc");
        assert_eq!(decode(b"=41=42"), b"AB");
    }
}

//! Streaming Base64 filters
//!
//! Whole 3-byte groups are encoded as they arrive; the remainder waits for
//! the next call or for `finish`, which pads with `=`.

use super::{StreamFilter, LINE_WIDTH};
use ::base64::engine::general_purpose::STANDARD;
use ::base64::Engine as _;

/// Base64 encoder with CRLF line wrapping
#[derive(Debug, Clone)]
pub struct Base64Encoder {
    pending: [u8; 3],
    pending_len: usize,
    column: usize,
    line_width: usize,
}

impl Base64Encoder {
    pub fn new() -> Self {
        Self::with_line_width(LINE_WIDTH)
    }

    /// Wrap at `width` columns; 0 disables wrapping
    pub fn with_line_width(width: usize) -> Self {
        Base64Encoder {
            pending: [0; 3],
            pending_len: 0,
            column: 0,
            line_width: width,
        }
    }

    fn emit(&mut self, bytes: &[u8], output: &mut Vec<u8>) {
        let encoded = STANDARD.encode(bytes);
        for &c in encoded.as_bytes() {
            if self.line_width > 0 && self.column == self.line_width {
                output.extend_from_slice(b"\r\n");
                self.column = 0;
            }
            output.push(c);
            self.column += 1;
        }
    }
}

impl Default for Base64Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamFilter for Base64Encoder {
    fn filter(&mut self, mut input: &[u8], output: &mut Vec<u8>) -> usize {
        let start = output.len();

        if self.pending_len > 0 {
            let take = (3 - self.pending_len).min(input.len());
            self.pending[self.pending_len..self.pending_len + take].copy_from_slice(&input[..take]);
            self.pending_len += take;
            input = &input[take..];
            if self.pending_len < 3 {
                return 0;
            }
            let group = self.pending;
            self.emit(&group, output);
            self.pending_len = 0;
        }

        let whole = input.len() / 3 * 3;
        if whole > 0 {
            self.emit(&input[..whole], output);
        }
        let rest = &input[whole..];
        self.pending[..rest.len()].copy_from_slice(rest);
        self.pending_len = rest.len();

        output.len() - start
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> usize {
        let start = output.len();
        if self.pending_len > 0 {
            let group = self.pending;
            let len = self.pending_len;
            self.emit(&group[..len], output);
        }
        self.pending_len = 0;
        self.column = 0;
        output.len() - start
    }
}

/// Base64 decoder
///
/// Whitespace and characters outside the alphabet are skipped. A quantum
/// that does not decode is dropped with a warning.
#[derive(Debug, Clone, Default)]
pub struct Base64Decoder {
    quantum: [u8; 4],
    len: usize,
}

impl Base64Decoder {
    pub fn new() -> Self {
        Base64Decoder::default()
    }

    fn flush_quantum(&mut self, output: &mut Vec<u8>) {
        let mut buf = [0u8; 3];
        match STANDARD.decode_slice(&self.quantum[..self.len], &mut buf) {
            Ok(n) => output.extend_from_slice(&buf[..n]),
            Err(e) => log::warn!("dropping undecodable base64 quantum: {e}"),
        }
        self.len = 0;
    }
}

#[inline]
fn is_alphabet(b: u8) -> bool {
    matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'+' | b'/' | b'=')
}

impl StreamFilter for Base64Decoder {
    fn filter(&mut self, input: &[u8], output: &mut Vec<u8>) -> usize {
        let start = output.len();
        for &b in input {
            if !is_alphabet(b) {
                continue;
            }
            self.quantum[self.len] = b;
            self.len += 1;
            if self.len == 4 {
                self.flush_quantum(output);
            }
        }
        output.len() - start
    }

    fn finish(&mut self, output: &mut Vec<u8>) -> usize {
        let start = output.len();
        if self.len > 0 {
            // Tolerate missing padding
            while self.len < 4 {
                self.quantum[self.len] = b'=';
                self.len += 1;
            }
            self.flush_quantum(output);
        }
        output.len() - start
    }
}

//! Text Encoding Detection and Conversion
//!
//! Loading: detects UTF-16 from the byte order mark or byte patterns and
//! converts to UTF-8 for parsing. Saving: converts the rendered UTF-8 text to
//! the target encoding and prepends its byte order mark.

use crate::error::{Result, XmlError};

/// Encoding of a document's byte image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextEncoding {
    #[default]
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl TextEncoding {
    /// Detect encoding from byte order mark or initial bytes
    pub fn detect(input: &[u8]) -> Self {
        if input.len() < 2 {
            return TextEncoding::Utf8;
        }

        match (input[0], input[1]) {
            // UTF-16 LE BOM: 0xFF 0xFE
            (0xFF, 0xFE) => TextEncoding::Utf16Le,
            // UTF-16 BE BOM: 0xFE 0xFF
            (0xFE, 0xFF) => TextEncoding::Utf16Be,
            // No BOM - check for UTF-16 pattern (< followed by null or null followed by <)
            (0x00, b'<') => TextEncoding::Utf16Be,
            (b'<', 0x00) => TextEncoding::Utf16Le,
            _ => TextEncoding::Utf8,
        }
    }

    /// Name used in the `encoding="..."` header declaration
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "UTF-8",
            TextEncoding::Utf16Le | TextEncoding::Utf16Be => "UTF-16",
        }
    }

    /// Byte order mark written ahead of the document
    pub fn bom(self) -> &'static [u8] {
        match self {
            TextEncoding::Utf8 => &[0xEF, 0xBB, 0xBF],
            TextEncoding::Utf16Le => &[0xFF, 0xFE],
            TextEncoding::Utf16Be => &[0xFE, 0xFF],
        }
    }

    /// True for two-byte code unit encodings
    pub fn is_wide(self) -> bool {
        !matches!(self, TextEncoding::Utf8)
    }
}

/// Convert a document image to UTF-8
///
/// Strips any byte order mark. UTF-8 input is passed through.
pub fn convert_to_utf8(input: Vec<u8>) -> Result<Vec<u8>> {
    match TextEncoding::detect(&input) {
        TextEncoding::Utf8 => {
            if input.starts_with(&[0xEF, 0xBB, 0xBF]) {
                Ok(input[3..].to_vec())
            } else {
                Ok(input)
            }
        }
        TextEncoding::Utf16Le => decode_utf16(&input, [0xFF, 0xFE], u16::from_le_bytes),
        TextEncoding::Utf16Be => decode_utf16(&input, [0xFE, 0xFF], u16::from_be_bytes),
    }
}

fn decode_utf16(input: &[u8], bom: [u8; 2], unit: fn([u8; 2]) -> u16) -> Result<Vec<u8>> {
    let start = if input.starts_with(&bom) { 2 } else { 0 };
    let bytes = &input[start..];

    if bytes.len() % 2 != 0 {
        return Err(XmlError::Encoding(
            "Invalid UTF-16: odd number of bytes".to_string(),
        ));
    }

    let code_units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|chunk| unit([chunk[0], chunk[1]]))
        .collect();

    String::from_utf16(&code_units)
        .map(String::into_bytes)
        .map_err(|e| XmlError::Encoding(format!("Invalid UTF-16: {}", e)))
}

/// Convert UTF-8 text to the target encoding, optionally with its BOM
pub fn convert_from_utf8(text: &str, encoding: TextEncoding, with_bom: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(if encoding.is_wide() {
        text.len() * 2 + 2
    } else {
        text.len() + 3
    });
    if with_bom {
        out.extend_from_slice(encoding.bom());
    }
    match encoding {
        TextEncoding::Utf8 => out.extend_from_slice(text.as_bytes()),
        TextEncoding::Utf16Le => text
            .encode_utf16()
            .for_each(|u| out.extend_from_slice(&u.to_le_bytes())),
        TextEncoding::Utf16Be => text
            .encode_utf16()
            .for_each(|u| out.extend_from_slice(&u.to_be_bytes())),
    }
    out
}

/// Rewrite (or add) the `encoding="..."` pseudo-attribute of a header
/// declaration such as `xml version="1.0" encoding="UTF-8"`.
pub fn with_declared_encoding(header: &str, encoding: TextEncoding) -> String {
    let label = encoding.label();
    if let Some(at) = header.find("encoding=") {
        let value_start = at + "encoding=".len();
        let quote = header[value_start..].chars().next();
        if let Some(q @ ('"' | '\'')) = quote {
            if let Some(len) = header[value_start + 1..].find(q) {
                let value_end = value_start + 1 + len + 1;
                return format!(
                    "{}encoding={q}{label}{q}{}",
                    &header[..at],
                    &header[value_end..]
                );
            }
        }
        return header.to_string();
    }
    if header.trim_start().starts_with("xml") {
        format!("{} encoding=\"{label}\"", header.trim_end())
    } else {
        header.to_string()
    }
}

//! XML Attribute Parsing
//!
//! Scans `name=value` pairs out of the text of an opening tag.

use super::entities::decode;
use super::scanner::{is_name_char, is_name_start_char, is_whitespace, QuotePolicy};
use std::borrow::Cow;

/// A parsed attribute, borrowed from the input where possible
#[derive(Debug, Clone)]
pub struct RawAttribute<'a> {
    /// Attribute name
    pub name: &'a [u8],
    /// Attribute value (entities decoded)
    pub value: Cow<'a, [u8]>,
}

impl RawAttribute<'_> {
    /// Get the name as a string
    pub fn name_str(&self) -> Option<&str> {
        std::str::from_utf8(self.name).ok()
    }

    /// Get the value as a string
    pub fn value_str(&self) -> Option<&str> {
        std::str::from_utf8(self.value.as_ref()).ok()
    }
}

/// Parse attributes from raw tag content (after the element name)
///
/// Input should be the content between element name and '>' or '/>'.
/// Lenient: stray characters are skipped, names without `=` get an empty
/// value, unquoted values run to the next whitespace.
pub fn parse_attributes(input: &[u8], quotes: QuotePolicy) -> Vec<RawAttribute<'_>> {
    let mut attrs = Vec::new();
    let mut pos = 0;

    while pos < input.len() {
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        if pos >= input.len() {
            break;
        }

        // Check for end of attributes (/ or >)
        if input[pos] == b'/' || input[pos] == b'>' {
            break;
        }

        let name_start = pos;
        if !is_name_start_char(input[pos]) {
            pos += 1;
            continue;
        }

        while pos < input.len() && is_name_char(input[pos]) {
            pos += 1;
        }

        let name = &input[name_start..pos];

        // Skip whitespace around '='
        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        if pos >= input.len() || input[pos] != b'=' {
            // Attribute without value (like HTML boolean attributes)
            attrs.push(RawAttribute {
                name,
                value: Cow::Borrowed(b""),
            });
            continue;
        }

        pos += 1; // Skip '='

        while pos < input.len() && is_whitespace(input[pos]) {
            pos += 1;
        }

        if pos >= input.len() {
            attrs.push(RawAttribute {
                name,
                value: Cow::Borrowed(b""),
            });
            break;
        }

        let quote = input[pos];
        if !quotes.is_quote(quote) {
            // Unquoted value (non-standard but handle it)
            let value_start = pos;
            while pos < input.len()
                && !is_whitespace(input[pos])
                && input[pos] != b'/'
                && input[pos] != b'>'
            {
                pos += 1;
            }
            attrs.push(RawAttribute {
                name,
                value: decode(&input[value_start..pos]),
            });
            continue;
        }

        pos += 1; // Skip opening quote
        let value_start = pos;
        while pos < input.len() && input[pos] != quote {
            pos += 1;
        }

        attrs.push(RawAttribute {
            name,
            value: decode(&input[value_start..pos]),
        });

        if pos < input.len() {
            pos += 1; // Skip closing quote
        }
    }

    attrs
}

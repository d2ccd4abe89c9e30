//! Text parser: fully buffered XML image to tree
//!
//! The input is never modified. Element bodies are located with the
//! nesting-aware close-tag matcher and parsed recursively, so each level only
//! ever sees the span between its own opening and closing tags.

mod tree;

use crate::core::scanner::QuotePolicy;
use crate::dom::{Element, Header};

/// Parser configuration
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    /// Which quote characters delimit attribute values
    pub quote_policy: QuotePolicy,
    /// Keep whitespace-only text runs between tags as Content
    pub keep_whitespace: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            quote_policy: QuotePolicy::Both,
            keep_whitespace: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quote_policy(mut self, policy: QuotePolicy) -> Self {
        self.quote_policy = policy;
        self
    }

    pub fn keep_whitespace(mut self, keep: bool) -> Self {
        self.keep_whitespace = keep;
        self
    }
}

/// Outcome of a text parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseStatus {
    #[default]
    Ok,
    /// No `<?...?>` header; a default one was used
    NoHeader,
    /// Unterminated or unmatched markup at byte `position`; the tree holds
    /// everything built before it
    Fatal { position: usize },
}

impl ParseStatus {
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseStatus::Fatal { .. })
    }
}

/// Header, root and status from one parse
#[derive(Debug)]
pub struct ParsedDocument {
    pub header: Header,
    pub root: Option<Element>,
    pub status: ParseStatus,
}

/// Parse a whole document image
pub fn parse_document(input: &[u8], options: &ParseOptions) -> ParsedDocument {
    let parsed = tree::TreeParser::new(input, options).parse_document();
    log::debug!(
        "parsed {} bytes: status {:?}, root {:?}",
        input.len(),
        parsed.status,
        parsed.root.as_ref().map(Element::name)
    );
    parsed
}

/// Parse a headerless fragment holding a single element
///
/// Used for page files. A missing header is not reported.
pub fn parse_fragment(input: &[u8], options: &ParseOptions) -> (Option<Element>, ParseStatus) {
    let parsed = tree::TreeParser::new(input, options).parse_document();
    let status = match parsed.status {
        ParseStatus::NoHeader => ParseStatus::Ok,
        other => other,
    };
    (parsed.root, status)
}

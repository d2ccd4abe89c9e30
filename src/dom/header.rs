//! Document header: the `<?xml ...?>` declaration and top-level comments

use super::node::CommentKind;

/// Header text used when a document has none
pub const DEFAULT_HEADER: &str = "xml version=\"1.0\" encoding=\"UTF-8\"";

/// Which side of the root element a header comment is written on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    BeforeBody,
    AfterBody,
}

/// Comment, instruction or declaration outside the root element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderComment {
    pub text: String,
    pub kind: CommentKind,
    pub placement: Placement,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Declaration text without the `<?` and `?>` delimiters
    pub text: String,
    pub comments: Vec<HeaderComment>,
}

impl Header {
    pub fn new(text: impl Into<String>) -> Self {
        Header {
            text: text.into(),
            comments: Vec::new(),
        }
    }

    pub fn add_comment(&mut self, text: impl Into<String>, placement: Placement) {
        self.comments.push(HeaderComment {
            text: text.into(),
            kind: CommentKind::Comment,
            placement,
        });
    }

    /// Comments on one side of the root, in order
    pub fn comments_at(&self, placement: Placement) -> impl Iterator<Item = &HeaderComment> {
        self.comments
            .iter()
            .filter(move |c| c.placement == placement)
    }
}

impl Default for Header {
    fn default() -> Self {
        Header::new(DEFAULT_HEADER)
    }
}

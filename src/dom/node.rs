//! Leaf node types owned by an Element
//!
//! Contents, comments and CDATA sections carry an insertion position: the
//! index of the sibling child element they precede in document order. A
//! position equal to the child count means "after the last child".

use crate::buffer::ByteBuffer;
use crate::mime::encode_base64;

/// Name/value pair owned by an Element
///
/// Both strings are stored decoded; entity encoding happens on export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
    /// Transient attributes are removed by `Element::prune_temporal`
    pub temporal: bool,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            temporal: false,
        }
    }

    /// Same name and value; the temporal flag is not part of equality
    pub fn same_as(&self, other: &Attribute) -> bool {
        self.name == other.name && self.value == other.value
    }
}

/// Payload of a Content node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentValue {
    Text(String),
    Binary(ByteBuffer),
}

/// A text run (or binary payload) positioned among an Element's children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub position: usize,
    pub value: ContentValue,
}

impl Content {
    pub fn text(position: usize, text: impl Into<String>) -> Self {
        Content {
            position,
            value: ContentValue::Text(text.into()),
        }
    }

    pub fn binary(position: usize, bytes: impl Into<ByteBuffer>) -> Self {
        Content {
            position,
            value: ContentValue::Binary(bytes.into()),
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.value, ContentValue::Binary(_))
    }

    /// Text of a text-mode node, `None` in binary mode
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ContentValue::Text(t) => Some(t),
            ContentValue::Binary(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&ByteBuffer> {
        match &self.value {
            ContentValue::Binary(b) => Some(b),
            ContentValue::Text(_) => None,
        }
    }

    /// Text form used on export: binary payloads become Base64
    pub fn export_text(&self) -> std::borrow::Cow<'_, str> {
        match &self.value {
            ContentValue::Text(t) => std::borrow::Cow::Borrowed(t),
            ContentValue::Binary(b) => std::borrow::Cow::Owned(encode_base64(b)),
        }
    }
}

/// What markup a Comment node came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommentKind {
    /// `<!--text-->`
    #[default]
    Comment,
    /// `<?text?>`
    Instruction,
    /// `<!text>`, e.g. DOCTYPE
    Declaration,
}

impl CommentKind {
    pub(crate) fn code(self) -> u8 {
        match self {
            CommentKind::Comment => 0,
            CommentKind::Instruction => 1,
            CommentKind::Declaration => 2,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CommentKind::Comment),
            1 => Some(CommentKind::Instruction),
            2 => Some(CommentKind::Declaration),
            _ => None,
        }
    }

    /// Opening and closing delimiters written on export
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            CommentKind::Comment => ("<!--", "-->"),
            CommentKind::Instruction => ("<?", "?>"),
            CommentKind::Declaration => ("<!", ">"),
        }
    }
}

/// Raw comment text, or a processing instruction / declaration kept in the
/// comment bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub position: usize,
    pub text: String,
    pub kind: CommentKind,
}

impl Comment {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        Comment {
            position,
            text: text.into(),
            kind: CommentKind::Comment,
        }
    }

    pub fn markup(position: usize, text: impl Into<String>, kind: CommentKind) -> Self {
        Comment {
            position,
            text: text.into(),
            kind,
        }
    }
}

/// Raw CDATA section text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CData {
    pub position: usize,
    pub text: String,
}

impl CData {
    pub fn new(position: usize, text: impl Into<String>) -> Self {
        CData {
            position,
            text: text.into(),
        }
    }
}

/// Nodes ordered by insertion position
pub(crate) trait Positioned {
    fn position(&self) -> usize;
    fn position_mut(&mut self) -> &mut usize;
}

macro_rules! positioned {
    ($($t:ty),*) => {
        $(impl Positioned for $t {
            #[inline]
            fn position(&self) -> usize {
                self.position
            }

            #[inline]
            fn position_mut(&mut self) -> &mut usize {
                &mut self.position
            }
        })*
    };
}

positioned!(Content, Comment, CData);

/// Per-element export formatting
///
/// Every field is optional; unset fields inherit from the nearest ancestor
/// that sets them, then from the exporter defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Indent unit width (spaces per level; ignored with tabs)
    pub indent_width: Option<u8>,
    /// Indent with one tab per level instead of spaces
    pub use_tabs: Option<bool>,
    /// Put each child element of an element-only body on its own line
    pub break_elements: Option<bool>,
    /// Put each node of a body holding text on its own line
    /// (alters the whitespace of the text on re-parse)
    pub break_contents: Option<bool>,
}

impl FormatOptions {
    pub fn is_empty(&self) -> bool {
        *self == FormatOptions::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_modes() {
        let text = Content::text(0, "hi");
        assert_eq!(text.as_text(), Some("hi"));
        assert!(!text.is_binary());

        let bin = Content::binary(1, vec![0u8, 159, 146, 150]);
        assert!(bin.is_binary());
        assert_eq!(bin.as_text(), None);
        assert_eq!(bin.export_text(), "AJ+Slg==");
    }

    #[test]
    fn test_comment_kind_codes() {
        for kind in [CommentKind::Comment, CommentKind::Instruction, CommentKind::Declaration] {
            assert_eq!(CommentKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CommentKind::from_code(9), None);
    }

    #[test]
    fn test_attribute_equality_ignores_temporal() {
        let mut a = Attribute::new("x", "1");
        let b = Attribute::new("x", "1");
        a.temporal = true;
        assert!(a.same_as(&b));
        assert_ne!(a, b);
    }
}

//! Binary node format
//!
//! Every node is one frame: an 8-byte little-endian header followed by a
//! type-specific payload.
//!
//! ```text
//! version: u8   always 0
//! type:    u8   FrameType
//! variant: u16  always 0
//! length:  u32  payload length
//! ```
//!
//! Element payloads nest the frames of their attributes, children, contents,
//! comments and CDATA sections. Import dispatches on each nested frame's type
//! only, so emission order can change without breaking old readers.
//!
//! Decoding builds a fresh value and returns it only when the whole input was
//! valid.

mod reader;
mod writer;

use crate::dom::{Document, Element, Header};
use crate::error::{Result, XmlError};

pub use reader::{decode_document, decode_element};
pub use writer::{encode_document, encode_element};

/// Format version written in every frame header
pub const FORMAT_VERSION: u8 = 0;

/// Size of a frame header in bytes
pub const FRAME_HEADER_LEN: usize = 8;

/// Node type tag of a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Document = 0,
    Header = 1,
    Element = 2,
    Attribute = 3,
    Comment = 4,
    CData = 5,
    Content = 6,
}

impl TryFrom<u8> for FrameType {
    type Error = XmlError;

    fn try_from(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 => FrameType::Document,
            1 => FrameType::Header,
            2 => FrameType::Element,
            3 => FrameType::Attribute,
            4 => FrameType::Comment,
            5 => FrameType::CData,
            6 => FrameType::Content,
            _ => return Err(XmlError::Binary("unknown frame type")),
        })
    }
}

/// Header comment position field values
pub(crate) const BEFORE_BODY: u32 = 0;
pub(crate) const AFTER_BODY: u32 = 1;

impl Element {
    /// Serialize this subtree; paged-out children are loaded transiently
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_element(self, &mut out)?;
        Ok(out)
    }

    /// Decode a single Element frame
    pub fn from_binary(bytes: &[u8]) -> Result<Element> {
        decode_element(bytes)
    }
}

impl Document {
    /// Serialize header and root as one Document frame
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        encode_document(self.header(), self.root(), &mut out)?;
        Ok(out)
    }

    /// Build a document from a Document frame
    pub fn from_binary(bytes: &[u8]) -> Result<Document> {
        let (header, root): (Header, Option<Element>) = decode_document(bytes)?;
        let mut document = Document::new();
        document.set_header(header);
        if let Some(root) = root {
            document.set_root(root)?;
        }
        Ok(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{arbitrary, CommentKind, Placement, MAX_NESTING_DEPTH};

    fn sample() -> Element {
        let mut root = Element::new("root");
        root.set_attribute("id", "7");
        root.set_attribute("name", "x & y");
        root.add_comment("first");
        root.add_content("lead");
        let mut child = Element::new("child");
        child.add_binary_content(vec![0u8, 255, 10, 13]);
        child.add_cdata("<not markup>");
        root.add_element(child);
        root.add_markup("pi body", CommentKind::Instruction);
        root.add_content("tail");
        root.add_element(Element::new("empty"));
        root
    }

    #[test]
    fn test_element_round_trip() {
        let root = sample();
        let bytes = root.to_binary().unwrap();
        let decoded = Element::from_binary(&bytes).unwrap();
        assert!(decoded.structural_eq(&root));
        let child = decoded.child(0).unwrap();
        assert!(child.contents()[0].is_binary());
        assert_eq!(decoded.comments()[1].kind, CommentKind::Instruction);
    }

    #[test]
    fn test_frame_header_layout() {
        let bytes = Element::new("ab").to_binary().unwrap();
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(bytes[1], FrameType::Element as u8);
        assert_eq!(&bytes[2..4], &[0, 0]);
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 6);
        assert_eq!(&bytes[8..12], &2u32.to_le_bytes());
        assert_eq!(&bytes[12..], b"ab");
    }

    #[test]
    fn test_document_round_trip() {
        let mut doc = Document::new();
        doc.header_mut().add_comment("top", Placement::BeforeBody);
        doc.header_mut().add_comment("bottom", Placement::AfterBody);
        doc.set_root(sample()).unwrap();

        let bytes = doc.to_binary().unwrap();
        let decoded = Document::from_binary(&bytes).unwrap();
        assert!(decoded.structural_eq(&doc));
        assert_eq!(decoded.header().comments[1].placement, Placement::AfterBody);
    }

    #[test]
    fn test_document_without_root() {
        let doc = Document::new();
        let decoded = Document::from_binary(&doc.to_binary().unwrap()).unwrap();
        assert!(decoded.root().is_none());
        assert_eq!(decoded.header().text, doc.header().text);
    }

    #[test]
    fn test_rejects_length_mismatch() {
        let mut bytes = sample().to_binary().unwrap();
        bytes.push(0);
        assert!(matches!(Element::from_binary(&bytes), Err(XmlError::Binary(_))));
        bytes.truncate(bytes.len() - 2);
        assert!(matches!(Element::from_binary(&bytes), Err(XmlError::Binary(_))));
    }

    #[test]
    fn test_rejects_bad_header_fields() {
        let good = sample().to_binary().unwrap();

        let mut bad_version = good.clone();
        bad_version[0] = 1;
        assert!(Element::from_binary(&bad_version).is_err());

        let mut bad_variant = good.clone();
        bad_variant[2] = 1;
        assert!(Element::from_binary(&bad_variant).is_err());

        let mut bad_type = good.clone();
        bad_type[1] = 42;
        assert!(Element::from_binary(&bad_type).is_err());

        let mut wrong_type = good;
        wrong_type[1] = FrameType::Attribute as u8;
        assert!(Element::from_binary(&wrong_type).is_err());
    }

    #[test]
    fn test_rejects_nested_overrun() {
        let mut bytes = sample().to_binary().unwrap();
        // First nested frame starts after the outer header and the name field
        let nested = FRAME_HEADER_LEN + 4 + "root".len();
        bytes[nested + 4..nested + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(Element::from_binary(&bytes), Err(XmlError::Binary(_))));
    }

    /// `levels` Element frames with empty names, each nested in the last
    fn nested_elements(levels: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(levels * 12);
        for level in 0..levels {
            let total = 12 * (levels - level);
            bytes.extend_from_slice(&[FORMAT_VERSION, FrameType::Element as u8, 0, 0]);
            bytes.extend_from_slice(&((total - FRAME_HEADER_LEN) as u32).to_le_bytes());
            bytes.extend_from_slice(&0u32.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_nesting_limit() {
        let at_limit = Element::from_binary(&nested_elements(MAX_NESTING_DEPTH + 1)).unwrap();
        assert_eq!(at_limit.child_count(), 1);

        assert!(matches!(
            Element::from_binary(&nested_elements(MAX_NESTING_DEPTH + 2)),
            Err(XmlError::Binary("nesting too deep"))
        ));
        assert!(matches!(
            Element::from_binary(&nested_elements(5000)),
            Err(XmlError::Binary("nesting too deep"))
        ));
    }

    #[test]
    fn test_rejects_truncated_input() {
        assert!(Element::from_binary(&[]).is_err());
        assert!(Element::from_binary(&[0, 2, 0]).is_err());
    }

    proptest::proptest! {
        #[test]
        fn prop_decoder_never_panics(data in proptest::collection::vec(proptest::num::u8::ANY, 0..256)) {
            let _ = Element::from_binary(&data);
            let _ = Document::from_binary(&data);
        }

        #[test]
        fn prop_element_round_trip(
            mut element in arbitrary::element(),
            payload in proptest::collection::vec(proptest::num::u8::ANY, 0..16),
        ) {
            element.add_binary_content(payload);
            let decoded = Element::from_binary(&element.to_binary().unwrap()).unwrap();
            proptest::prop_assert!(decoded.structural_eq(&element));
        }
    }
}

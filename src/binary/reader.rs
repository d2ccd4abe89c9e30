//! Frame decoder

use super::{FrameType, AFTER_BODY, BEFORE_BODY, FORMAT_VERSION, FRAME_HEADER_LEN};
use crate::dom::{
    Attribute, CData, Comment, CommentKind, Content, Element, Header, HeaderComment, Placement,
    MAX_NESTING_DEPTH,
};
use crate::error::{Result, XmlError};

struct Frame<'a> {
    kind: FrameType,
    payload: &'a [u8],
}

/// Bounds-checked reader over one payload
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Cursor { buf, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let bytes = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(bytes)
    }

    fn u8(&mut self) -> Result<u8> {
        self.take(1)
            .map(|b| b[0])
            .ok_or(XmlError::Binary("truncated field"))
    }

    fn u32(&mut self) -> Result<u32> {
        let b = self.take(4).ok_or(XmlError::Binary("truncated field"))?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// u32 length followed by that many bytes of UTF-8
    fn string(&mut self) -> Result<String> {
        let len = self.u32()? as usize;
        let bytes = self.take(len).ok_or(XmlError::Binary("truncated string"))?;
        utf8(bytes)
    }

    fn rest(&mut self) -> &'a [u8] {
        let bytes = self.buf.get(self.pos..).unwrap_or_default();
        self.pos = self.buf.len();
        bytes
    }

    fn finish(&self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(XmlError::Binary("trailing bytes in frame"))
        }
    }

    /// Next nested frame; its payload must fit in what is left
    fn frame(&mut self) -> Result<Frame<'a>> {
        let header = self
            .take(FRAME_HEADER_LEN)
            .ok_or(XmlError::Binary("truncated frame header"))?;
        let (kind, len) = parse_header(header)?;
        let payload = self
            .take(len)
            .ok_or(XmlError::Binary("nested frame exceeds its parent"))?;
        Ok(Frame { kind, payload })
    }
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|_| XmlError::Binary("invalid UTF-8"))
}

fn parse_header(header: &[u8]) -> Result<(FrameType, usize)> {
    if header[0] != FORMAT_VERSION {
        return Err(XmlError::Binary("unsupported format version"));
    }
    let kind = FrameType::try_from(header[1])?;
    if header[2] != 0 || header[3] != 0 {
        return Err(XmlError::Binary("non-zero type variant"));
    }
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok((kind, len))
}

/// The single frame spanning all of `bytes`
fn top_frame(bytes: &[u8], expected: FrameType) -> Result<Frame<'_>> {
    if bytes.len() < FRAME_HEADER_LEN {
        return Err(XmlError::Binary("truncated frame header"));
    }
    let (kind, len) = parse_header(&bytes[..FRAME_HEADER_LEN])?;
    if len != bytes.len() - FRAME_HEADER_LEN {
        return Err(XmlError::Binary("frame length does not match input"));
    }
    if kind != expected {
        return Err(XmlError::Binary("unexpected frame type"));
    }
    Ok(Frame {
        kind,
        payload: &bytes[FRAME_HEADER_LEN..],
    })
}

/// Decode an Element frame spanning all of `bytes`
pub fn decode_element(bytes: &[u8]) -> Result<Element> {
    let frame = top_frame(bytes, FrameType::Element)?;
    element_from_payload(frame.payload, 0)
}

/// `depth` counts the ancestors of the element being decoded
fn element_from_payload(payload: &[u8], depth: usize) -> Result<Element> {
    if depth > MAX_NESTING_DEPTH {
        return Err(XmlError::Binary("nesting too deep"));
    }
    let mut cursor = Cursor::new(payload);
    let mut element = Element::new(cursor.string()?);

    while !cursor.is_empty() {
        let frame = cursor.frame()?;
        let mut fields = Cursor::new(frame.payload);
        match frame.kind {
            FrameType::Attribute => {
                let name = fields.string()?;
                let value = fields.string()?;
                fields.finish()?;
                element.add_attribute(Attribute::new(name, value));
            }
            FrameType::Element => {
                element.add_element(element_from_payload(frame.payload, depth + 1)?);
            }
            FrameType::Content => {
                let position = fields.u32()? as usize;
                let content = match fields.u8()? {
                    0 => Content::text(position, utf8(fields.rest())?),
                    1 => Content::binary(position, fields.rest()),
                    _ => return Err(XmlError::Binary("invalid content mode flag")),
                };
                element.push_content(content);
            }
            FrameType::Comment => {
                let position = fields.u32()? as usize;
                let kind = CommentKind::from_code(fields.u8()?)
                    .ok_or(XmlError::Binary("invalid comment kind"))?;
                let text = utf8(fields.rest())?;
                element.push_comment(Comment::markup(position, text, kind));
            }
            FrameType::CData => {
                let position = fields.u32()? as usize;
                element.push_cdata(CData::new(position, utf8(fields.rest())?));
            }
            FrameType::Document | FrameType::Header => {
                return Err(XmlError::Binary("unexpected frame type inside element"));
            }
        }
    }

    let limit = element.child_count();
    let out_of_range = element.contents().iter().any(|c| c.position > limit)
        || element.comments().iter().any(|c| c.position > limit)
        || element.cdata().iter().any(|c| c.position > limit);
    if out_of_range {
        return Err(XmlError::Binary("insertion position beyond child count"));
    }
    Ok(element)
}

fn header_from_payload(payload: &[u8]) -> Result<Header> {
    let mut cursor = Cursor::new(payload);
    let mut header = Header::new(cursor.string()?);

    while !cursor.is_empty() {
        let frame = cursor.frame()?;
        if frame.kind != FrameType::Comment {
            return Err(XmlError::Binary("header may only hold comment frames"));
        }
        let mut fields = Cursor::new(frame.payload);
        let placement = match fields.u32()? {
            BEFORE_BODY => Placement::BeforeBody,
            AFTER_BODY => Placement::AfterBody,
            _ => return Err(XmlError::Binary("invalid header comment placement")),
        };
        let kind = CommentKind::from_code(fields.u8()?)
            .ok_or(XmlError::Binary("invalid comment kind"))?;
        header.comments.push(HeaderComment {
            text: utf8(fields.rest())?,
            kind,
            placement,
        });
    }
    Ok(header)
}

/// Decode a Document frame spanning all of `bytes`
pub fn decode_document(bytes: &[u8]) -> Result<(Header, Option<Element>)> {
    let frame = top_frame(bytes, FrameType::Document)?;
    let mut cursor = Cursor::new(frame.payload);
    let mut header = None;
    let mut root = None;

    while !cursor.is_empty() {
        let nested = cursor.frame()?;
        match nested.kind {
            FrameType::Header if header.is_none() => {
                header = Some(header_from_payload(nested.payload)?);
            }
            FrameType::Element if root.is_none() => {
                root = Some(element_from_payload(nested.payload, 0)?);
            }
            FrameType::Header | FrameType::Element => {
                return Err(XmlError::Binary("duplicate frame in document"));
            }
            _ => return Err(XmlError::Binary("unexpected frame type inside document")),
        }
    }
    Ok((header.unwrap_or_default(), root))
}

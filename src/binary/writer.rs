//! Frame encoder

use super::{FrameType, AFTER_BODY, BEFORE_BODY, FORMAT_VERSION, FRAME_HEADER_LEN};
use crate::dom::{Element, Header, Placement};
use crate::dom::{ContentValue, HeaderComment};
use crate::error::{Result, XmlError};

/// Write a frame header with a zero length; returns the frame start
fn begin(out: &mut Vec<u8>, kind: FrameType) -> usize {
    let start = out.len();
    out.push(FORMAT_VERSION);
    out.push(kind as u8);
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    start
}

/// Patch the length of the frame started at `start`
fn end(out: &mut [u8], start: usize) -> Result<()> {
    let len = out.len() - start - FRAME_HEADER_LEN;
    let len = u32::try_from(len).map_err(|_| XmlError::Binary("frame payload exceeds u32"))?;
    out[start + 4..start + 8].copy_from_slice(&len.to_le_bytes());
    Ok(())
}

fn put_u32(out: &mut Vec<u8>, value: usize) -> Result<()> {
    let value = u32::try_from(value).map_err(|_| XmlError::Binary("field exceeds u32"))?;
    out.extend_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Length-prefixed string
fn put_str(out: &mut Vec<u8>, s: &str) -> Result<()> {
    put_u32(out, s.len())?;
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

/// Append the Element frame of `element` and its subtree
pub fn encode_element(element: &Element, out: &mut Vec<u8>) -> Result<()> {
    let start = begin(out, FrameType::Element);
    put_str(out, element.name())?;

    for attr in element.attributes() {
        let frame = begin(out, FrameType::Attribute);
        put_str(out, &attr.name)?;
        put_str(out, &attr.value)?;
        end(out, frame)?;
    }

    for index in 0..element.child_count() {
        let child = element.resolve_child(index)?;
        encode_element(&child, out)?;
    }

    for content in element.contents() {
        let frame = begin(out, FrameType::Content);
        put_u32(out, content.position)?;
        match &content.value {
            ContentValue::Text(text) => {
                out.push(0);
                out.extend_from_slice(text.as_bytes());
            }
            ContentValue::Binary(bytes) => {
                out.push(1);
                out.extend_from_slice(bytes);
            }
        }
        end(out, frame)?;
    }

    for comment in element.comments() {
        let frame = begin(out, FrameType::Comment);
        put_u32(out, comment.position)?;
        out.push(comment.kind.code());
        out.extend_from_slice(comment.text.as_bytes());
        end(out, frame)?;
    }

    for cdata in element.cdata() {
        let frame = begin(out, FrameType::CData);
        put_u32(out, cdata.position)?;
        out.extend_from_slice(cdata.text.as_bytes());
        end(out, frame)?;
    }

    end(out, start)
}

fn encode_header(header: &Header, out: &mut Vec<u8>) -> Result<()> {
    let start = begin(out, FrameType::Header);
    put_str(out, &header.text)?;
    for HeaderComment {
        text,
        kind,
        placement,
    } in &header.comments
    {
        let frame = begin(out, FrameType::Comment);
        let position = match placement {
            Placement::BeforeBody => BEFORE_BODY,
            Placement::AfterBody => AFTER_BODY,
        };
        out.extend_from_slice(&position.to_le_bytes());
        out.push(kind.code());
        out.extend_from_slice(text.as_bytes());
        end(out, frame)?;
    }
    end(out, start)
}

/// Append a Document frame holding the header and optional root
pub fn encode_document(header: &Header, root: Option<&Element>, out: &mut Vec<u8>) -> Result<()> {
    let start = begin(out, FrameType::Document);
    encode_header(header, out)?;
    if let Some(root) = root {
        encode_element(root, out)?;
    }
    end(out, start)
}

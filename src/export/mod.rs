//! Exporter: tree to text
//!
//! Writes to any `std::io::Write` sink: a file, a `Vec<u8>`, or a
//! [`CountingSink`] that only measures. Paged-out children are loaded
//! transiently while they are written.
//!
//! Body nodes are interleaved with child elements by insertion position. At
//! equal positions comments come first, then CDATA, then contents.

mod format;

pub use format::MAX_INDENT_DEPTH;
use format::Layout;

use std::io::{self, Write};

use crate::core::encoding::TextEncoding;
use crate::core::entities::encode;
use crate::dom::{CData, Comment, CommentKind, Content, Document, Element, Placement};
use crate::error::Result;

/// Whitespace policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportMode {
    /// Line breaks and indentation per the elements' format options
    #[default]
    Formatted,
    /// No added whitespace
    Compact,
}

/// Exporter configuration
#[derive(Debug, Clone, Copy)]
pub struct ExportOptions {
    /// Write child elements (bodies without them still hold text nodes)
    pub show_children: bool,
    pub mode: ExportMode,
    /// Prefix a document export with the UTF-8 byte order mark
    pub bom: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            show_children: true,
            mode: ExportMode::Formatted,
            bom: false,
        }
    }
}

impl ExportOptions {
    pub fn compact() -> Self {
        ExportOptions {
            mode: ExportMode::Compact,
            ..Self::default()
        }
    }

    pub fn show_children(mut self, show: bool) -> Self {
        self.show_children = show;
        self
    }

    pub fn mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn bom(mut self, bom: bool) -> Self {
        self.bom = bom;
        self
    }
}

/// Options for `Document::save_with`
#[derive(Debug, Clone, Copy, Default)]
pub struct SaveOptions {
    /// Byte encoding of the written file; UTF-16 targets get a byte order
    /// mark and a rewritten `encoding="..."` declaration
    pub encoding: TextEncoding,
    pub mode: ExportMode,
}

impl SaveOptions {
    pub fn encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn mode(mut self, mode: ExportMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Sink that discards output and counts bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink {
    written: usize,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl Write for CountingSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len();
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Number of bytes `element` exports to
pub fn exported_len(element: &Element, options: ExportOptions) -> Result<usize> {
    let mut sink = CountingSink::new();
    Exporter::new(options).export(element, &mut sink)?;
    Ok(sink.written())
}

/// A body node in export order
#[derive(Clone, Copy)]
enum BodyNode<'a> {
    Comment(&'a Comment),
    CData(&'a CData),
    Content(&'a Content),
    Child(usize),
}

/// Body nodes and child indices of `element` in document order
fn body_order(element: &Element, include_children: bool) -> Vec<BodyNode<'_>> {
    let last = element.child_count();
    let mut nodes: Vec<(usize, u8, BodyNode<'_>)> = Vec::with_capacity(
        element.comments().len() + element.cdata().len() + element.contents().len() + last,
    );
    nodes.extend(
        element
            .comments()
            .iter()
            .map(|c| (c.position.min(last), 0, BodyNode::Comment(c))),
    );
    nodes.extend(
        element
            .cdata()
            .iter()
            .map(|c| (c.position.min(last), 1, BodyNode::CData(c))),
    );
    nodes.extend(
        element
            .contents()
            .iter()
            .map(|c| (c.position.min(last), 2, BodyNode::Content(c))),
    );
    if include_children {
        nodes.extend((0..last).map(|i| (i, 3, BodyNode::Child(i))));
    }
    // Stable: nodes of one kind keep their list order
    nodes.sort_by_key(|&(position, rank, _)| (position, rank));
    nodes.into_iter().map(|(_, _, node)| node).collect()
}

fn write_markup<W: Write>(out: &mut W, kind: CommentKind, text: &str) -> io::Result<()> {
    let (open, close) = kind.delimiters();
    out.write_all(open.as_bytes())?;
    out.write_all(text.as_bytes())?;
    out.write_all(close.as_bytes())
}

/// Tree-to-text writer
#[derive(Debug, Clone, Copy, Default)]
pub struct Exporter {
    options: ExportOptions,
}

impl Exporter {
    pub fn new(options: ExportOptions) -> Self {
        Exporter { options }
    }

    /// Exporter writing without added whitespace
    pub fn compact() -> Self {
        Exporter::new(ExportOptions::compact())
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Write one element and its subtree
    pub fn export<W: Write>(&self, element: &Element, out: &mut W) -> Result<()> {
        self.write_element(out, element, 0, &Layout::default())
    }

    /// Export one element to a byte vector
    pub fn to_vec(&self, element: &Element) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.export(element, &mut out)?;
        Ok(out)
    }

    /// Write a whole document: header, header comments and root
    pub fn export_document<W: Write>(&self, document: &Document, out: &mut W) -> Result<()> {
        self.write_document(out, document, document.header().text.as_str())
    }

    /// Document export with a replacement header declaration
    pub(crate) fn write_document<W: Write>(
        &self,
        out: &mut W,
        document: &Document,
        header_text: &str,
    ) -> Result<()> {
        let formatted = self.options.mode == ExportMode::Formatted;
        let mut first = true;
        let mut separate = |out: &mut W| -> io::Result<()> {
            if formatted && !first {
                out.write_all(b"\n")?;
            }
            first = false;
            Ok(())
        };

        if self.options.bom {
            out.write_all(TextEncoding::Utf8.bom())?;
        }
        if !header_text.is_empty() {
            separate(out)?;
            write_markup(out, CommentKind::Instruction, header_text)?;
        }

        let header = document.header();
        for comment in header.comments_at(Placement::BeforeBody) {
            separate(out)?;
            write_markup(out, comment.kind, &comment.text)?;
        }
        if let Some(root) = document.root() {
            separate(out)?;
            self.write_element(out, root, 0, &Layout::default())?;
        }
        for comment in header.comments_at(Placement::AfterBody) {
            separate(out)?;
            write_markup(out, comment.kind, &comment.text)?;
        }
        if formatted && !first {
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Write `element` and its subtree
    ///
    /// Resident descendants are walked with an explicit stack so deep trees
    /// do not exhaust the call stack. A paged-out child is loaded and written
    /// by a nested call.
    fn write_element<W: Write>(
        &self,
        out: &mut W,
        element: &Element,
        depth: usize,
        inherited: &Layout,
    ) -> Result<()> {
        let mut stack: Vec<OpenElement<'_>> = Vec::with_capacity(64);
        if let Some(open) = self.open_tag(out, element, depth, inherited)? {
            stack.push(open);
        }

        while let Some(top) = stack.last_mut() {
            let Some(&node) = top.body.get(top.next) else {
                if let Some(open) = stack.pop() {
                    self.close_tag(out, &open)?;
                }
                continue;
            };
            top.next += 1;
            let OpenElement {
                element,
                depth,
                layout,
                broken,
                ..
            } = *top;

            if broken {
                out.write_all(b"\n")?;
                layout.write_indent(out, depth + 1)?;
            }
            match node {
                BodyNode::Comment(c) => write_markup(out, c.kind, &c.text)?,
                BodyNode::CData(c) => {
                    out.write_all(b"<![CDATA[")?;
                    out.write_all(c.text.as_bytes())?;
                    out.write_all(b"]]>")?;
                }
                BodyNode::Content(c) => out.write_all(encode(&c.export_text()).as_bytes())?,
                BodyNode::Child(index) => match element.children()[index].resident() {
                    Some(child) => {
                        if let Some(open) = self.open_tag(out, child, depth + 1, &layout)? {
                            stack.push(open);
                        }
                    }
                    None => {
                        let child = element.resolve_child(index)?;
                        self.write_element(out, &child, depth + 1, &layout)?;
                    }
                },
            }
        }
        Ok(())
    }

    /// Write the opening tag; `None` if the element was written as `<name/>`
    fn open_tag<'a, W: Write>(
        &self,
        out: &mut W,
        element: &'a Element,
        depth: usize,
        inherited: &Layout,
    ) -> Result<Option<OpenElement<'a>>> {
        let layout = inherited.apply(element.format());

        out.write_all(b"<")?;
        out.write_all(encode(element.name()).as_bytes())?;
        for attr in element.attributes() {
            write!(out, " {}=\"{}\"", encode(&attr.name), encode(&attr.value))?;
        }

        let body = body_order(element, self.options.show_children);
        if body.is_empty() {
            out.write_all(b"/>")?;
            return Ok(None);
        }
        out.write_all(b">")?;

        let broken = self.options.mode == ExportMode::Formatted
            && if element.contents().is_empty() {
                layout.break_elements
            } else {
                layout.break_contents
            };
        Ok(Some(OpenElement {
            element,
            body,
            next: 0,
            depth,
            layout,
            broken,
        }))
    }

    fn close_tag<W: Write>(&self, out: &mut W, open: &OpenElement<'_>) -> Result<()> {
        if open.broken {
            out.write_all(b"\n")?;
            open.layout.write_indent(out, open.depth)?;
        }
        out.write_all(b"</")?;
        out.write_all(encode(open.element.name()).as_bytes())?;
        out.write_all(b">")?;
        Ok(())
    }
}

/// An element whose opening tag is written and whose body is in progress
struct OpenElement<'a> {
    element: &'a Element,
    body: Vec<BodyNode<'a>>,
    next: usize,
    depth: usize,
    layout: Layout,
    broken: bool,
}

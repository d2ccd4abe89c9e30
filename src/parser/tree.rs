//! Recursive tree builder
//!
//! `parse_span` walks the markup between two offsets and hands every node to
//! a [`Target`]: the document top level collects header comments and the
//! root, an [`Element`] collects its body.

use super::{ParseOptions, ParseStatus, ParsedDocument};
use crate::core::attributes::parse_attributes;
use crate::core::entities::decode;
use crate::core::scanner::{find_xml_close, is_whitespace, Scanner};
use crate::dom::{
    Attribute, CommentKind, Element, Header, HeaderComment, Placement, MAX_NESTING_DEPTH,
};

/// Markup that is not an element or text
enum Markup {
    Comment(String, CommentKind),
    CData(String),
}

/// Receiver for the nodes of one span
trait Target {
    fn text(&mut self, text: String);
    fn markup(&mut self, markup: Markup);
    fn element(&mut self, element: Element);
}

impl Target for Element {
    fn text(&mut self, text: String) {
        self.add_content(text);
    }

    fn markup(&mut self, markup: Markup) {
        match markup {
            Markup::Comment(text, CommentKind::Comment) => self.add_comment(text),
            Markup::Comment(text, kind) => self.add_markup(text, kind),
            Markup::CData(text) => self.add_cdata(text),
        }
    }

    fn element(&mut self, element: Element) {
        self.add_element(element);
    }
}

/// Everything outside the root element
struct TopLevel {
    header: Header,
    root: Option<Element>,
}

impl Target for TopLevel {
    fn text(&mut self, text: String) {
        if !text.trim().is_empty() {
            log::debug!("ignoring {} bytes of text outside the root element", text.len());
        }
    }

    fn markup(&mut self, markup: Markup) {
        let placement = if self.root.is_some() {
            Placement::AfterBody
        } else {
            Placement::BeforeBody
        };
        match markup {
            Markup::Comment(text, kind) => self.header.comments.push(HeaderComment {
                text,
                kind,
                placement,
            }),
            Markup::CData(_) => log::warn!("ignoring CDATA section outside the root element"),
        }
    }

    fn element(&mut self, element: Element) {
        if self.root.is_none() {
            self.root = Some(element);
        } else {
            log::warn!("ignoring extra top-level element <{}>", element.name());
        }
    }
}

pub(super) struct TreeParser<'a> {
    input: &'a [u8],
    options: &'a ParseOptions,
    fatal: Option<usize>,
}

impl<'a> TreeParser<'a> {
    pub(super) fn new(input: &'a [u8], options: &'a ParseOptions) -> Self {
        TreeParser {
            input,
            options,
            fatal: None,
        }
    }

    pub(super) fn parse_document(mut self) -> ParsedDocument {
        let mut top = TopLevel {
            header: Header::default(),
            root: None,
        };

        let mut scanner = Scanner::new(self.input);
        scanner.skip_whitespace();
        let mut body_start = scanner.position();
        let mut has_header = false;

        if is_header_start(scanner.remaining()) {
            let at = scanner.position();
            scanner.advance(2);
            match scanner.find_seq(b"?>") {
                Some(end) => {
                    top.header.text = lossy(&self.input[at + 2..end]).trim_end().to_string();
                    has_header = true;
                    body_start = end + 2;
                }
                None => self.fail(at),
            }
        }

        if self.fatal.is_none() {
            self.parse_span(&mut top, body_start, self.input.len(), 0);
        }

        let status = match self.fatal {
            Some(position) => ParseStatus::Fatal { position },
            None if !has_header => ParseStatus::NoHeader,
            None => ParseStatus::Ok,
        };
        ParsedDocument {
            header: top.header,
            root: top.root,
            status,
        }
    }

    /// Parse `[start, end)` into `target`
    ///
    /// `depth` is the number of ancestors an element opened in this span has.
    fn parse_span<T: Target>(&mut self, target: &mut T, start: usize, end: usize, depth: usize) {
        let full = self.input;
        let input = &full[..end];
        let quotes = self.options.quote_policy;
        let mut scanner = Scanner::at(input, start);
        let mut text_start = start;

        while let Some(lt) = scanner.find_tag_start() {
            scanner.set_position(lt);

            if scanner.starts_with(b"<!--") {
                self.flush_text(target, text_start, lt);
                scanner.advance(4);
                let Some(close) = scanner.find_seq(b"-->") else {
                    return self.fail(lt);
                };
                let text = lossy(&input[lt + 4..close]);
                target.markup(Markup::Comment(text, CommentKind::Comment));
                scanner.set_position(close + 3);
            } else if scanner.starts_with(b"<![CDATA[") {
                self.flush_text(target, text_start, lt);
                scanner.advance(9);
                let Some(close) = scanner.find_seq(b"]]>") else {
                    return self.fail(lt);
                };
                target.markup(Markup::CData(lossy(&input[lt + 9..close])));
                scanner.set_position(close + 3);
            } else if scanner.starts_with(b"<?") {
                self.flush_text(target, text_start, lt);
                scanner.advance(2);
                let Some(close) = scanner.find_seq(b"?>") else {
                    return self.fail(lt);
                };
                let text = lossy(&input[lt + 2..close]);
                target.markup(Markup::Comment(text, CommentKind::Instruction));
                scanner.set_position(close + 2);
            } else if scanner.starts_with(b"<!") {
                self.flush_text(target, text_start, lt);
                let Some(gt) = scanner.find_declaration_end() else {
                    return self.fail(lt);
                };
                let text = lossy(&input[lt + 2..gt]);
                target.markup(Markup::Comment(text, CommentKind::Declaration));
                scanner.set_position(gt + 1);
            } else if scanner.starts_with(b"</") {
                // Every matched close tag ends a span, so this one is stray
                self.flush_text(target, text_start, lt);
                let Some(gt) = scanner.find_tag_end() else {
                    return self.fail(lt);
                };
                log::warn!(
                    "skipping unmatched closing tag {:?} at byte {lt}",
                    lossy(&input[lt..=gt])
                );
                scanner.set_position(gt + 1);
            } else {
                scanner.advance(1);
                let Some(name) = scanner.read_name() else {
                    // A literal '<' stays part of the text run
                    continue;
                };
                self.flush_text(target, text_start, lt);

                let mut element = Element::new(lossy(name));
                let name_end = scanner.position();
                let Some(gt) = scanner.find_tag_end_quoted(quotes) else {
                    target.element(element);
                    return self.fail(lt);
                };

                let self_closing = gt > name_end && input[gt - 1] == b'/';
                let attr_end = if self_closing { gt - 1 } else { gt };
                for raw in parse_attributes(&input[name_end..attr_end], quotes) {
                    element.add_attribute(Attribute::new(lossy(raw.name), lossy(&raw.value)));
                }

                if self_closing {
                    target.element(element);
                    scanner.set_position(gt + 1);
                } else if depth >= MAX_NESTING_DEPTH {
                    log::warn!("element nesting deeper than {MAX_NESTING_DEPTH} at byte {lt}");
                    target.element(element);
                    return self.fail(lt);
                } else {
                    let Some(close) = find_xml_close(input, gt + 1, name, quotes) else {
                        target.element(element);
                        return self.fail(lt);
                    };
                    self.parse_span(&mut element, gt + 1, close.start, depth + 1);
                    target.element(element);
                    if self.fatal.is_some() {
                        return;
                    }
                    scanner.set_position(close.end);
                }
            }

            text_start = scanner.position();
        }

        self.flush_text(target, text_start, end);
    }

    fn flush_text<T: Target>(&self, target: &mut T, from: usize, to: usize) {
        if from >= to {
            return;
        }
        let raw = &self.input[from..to];
        if !self.options.keep_whitespace && raw.iter().all(|&b| is_whitespace(b)) {
            return;
        }
        target.text(lossy(&decode(raw)));
    }

    fn fail(&mut self, position: usize) {
        if self.fatal.is_none() {
            log::warn!("fatal parse error at byte {position}");
            self.fatal = Some(position);
        }
    }
}

/// `<?xml` followed by whitespace or the end of the instruction
fn is_header_start(rest: &[u8]) -> bool {
    rest.starts_with(b"<?xml")
        && rest
            .get(5)
            .map_or(true, |&b| is_whitespace(b) || b == b'?')
}

#[inline]
fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

//! Element: the mutable tree node
//!
//! Children live in [`Child`] slots. A slot either owns its element, shares
//! a borrowed one through `Rc`, or holds a handle to a page file the subtree
//! was written to. Read-only walks load paged-out children transiently
//! ([`Element::resolve_child`]); anything that changes the tree reloads them
//! in place first.

use std::ops::Deref;
use std::rc::Rc;

use crate::buffer::ByteBuffer;
use crate::dom::node::{
    Attribute, CData, Comment, CommentKind, Content, ContentValue, FormatOptions, Positioned,
};
use crate::error::{Result, XmlError};
use crate::mime::BinaryEncoding;
use crate::paging::PageHandle;

/// Most ancestors an element may have in a parsed or decoded tree
///
/// Deeper input ends the text parse with a fatal status and is rejected by
/// the binary decoder.
pub const MAX_NESTING_DEPTH: usize = 256;

/// One child slot
#[derive(Debug)]
pub enum Child {
    /// Owned by the holding element
    Owned(Box<Element>),
    /// Shared with another tree; never freed or mutated through this slot
    Borrowed(Rc<Element>),
    /// Written to a page file
    PagedOut(PageHandle),
}

impl Child {
    /// The element if it is resident
    pub fn resident(&self) -> Option<&Element> {
        match self {
            Child::Owned(e) => Some(e),
            Child::Borrowed(e) => Some(e),
            Child::PagedOut(_) => None,
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, Child::Borrowed(_))
    }

    pub fn is_paged_out(&self) -> bool {
        matches!(self, Child::PagedOut(_))
    }
}

/// A child element for reading, resident or loaded from its page file
pub enum ChildRef<'a> {
    Resident(&'a Element),
    Loaded(Box<Element>),
}

impl Deref for ChildRef<'_> {
    type Target = Element;

    fn deref(&self) -> &Element {
        match self {
            ChildRef::Resident(e) => e,
            ChildRef::Loaded(e) => e,
        }
    }
}

/// Named tree node
#[derive(Debug, Default)]
pub struct Element {
    name: String,
    children: Vec<Child>,
    attributes: Vec<Attribute>,
    contents: Vec<Content>,
    comments: Vec<Comment>,
    cdata: Vec<CData>,
    temporal: bool,
    tag: u64,
    format: FormatOptions,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_tag(name, 0)
    }

    /// Create an element carrying an opaque user tag
    pub fn with_tag(name: impl Into<String>, tag: u64) -> Self {
        Element {
            name: name.into(),
            children: Vec::new(),
            attributes: Vec::new(),
            contents: Vec::new(),
            comments: Vec::new(),
            cdata: Vec::new(),
            temporal: false,
            tag,
            format: FormatOptions::default(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[inline]
    pub fn tag(&self) -> u64 {
        self.tag
    }

    pub fn set_tag(&mut self, tag: u64) {
        self.tag = tag;
    }

    #[inline]
    pub fn is_temporal(&self) -> bool {
        self.temporal
    }

    pub fn set_temporal(&mut self, temporal: bool) {
        self.temporal = temporal;
    }

    #[inline]
    pub fn format(&self) -> &FormatOptions {
        &self.format
    }

    pub fn format_mut(&mut self) -> &mut FormatOptions {
        &mut self.format
    }

    // ========== Children ==========

    #[inline]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Resident child at `index`; `None` if out of range or paged out
    pub fn child(&self, index: usize) -> Option<&Element> {
        self.children.get(index).and_then(Child::resident)
    }

    pub fn is_paged_out(&self, index: usize) -> bool {
        self.children.get(index).is_some_and(Child::is_paged_out)
    }

    pub fn is_borrowed(&self, index: usize) -> bool {
        self.children.get(index).is_some_and(Child::is_borrowed)
    }

    /// Child for reading, loading it from its page file if needed
    ///
    /// The loaded copy is dropped with the returned value; the slot stays
    /// paged out.
    pub fn resolve_child(&self, index: usize) -> Result<ChildRef<'_>> {
        match self.children.get(index) {
            Some(Child::Owned(e)) => Ok(ChildRef::Resident(e)),
            Some(Child::Borrowed(e)) => Ok(ChildRef::Resident(e)),
            Some(Child::PagedOut(handle)) => Ok(ChildRef::Loaded(Box::new(handle.load()?))),
            None => Err(XmlError::out_of_range(index, self.children.len())),
        }
    }

    /// Owned child for mutation, reloading it if paged out
    pub fn child_mut(&mut self, index: usize) -> Result<&mut Element> {
        self.reload(index)?;
        match &mut self.children[index] {
            Child::Owned(e) => Ok(e),
            Child::Borrowed(_) => Err(XmlError::NotOwned(index)),
            // reload() leaves no paged-out slot behind on success
            Child::PagedOut(handle) => Err(XmlError::PageMissing(handle.path().to_path_buf())),
        }
    }

    /// Append an owned child, returning its index
    pub fn add_element(&mut self, element: Element) -> usize {
        self.children.push(Child::Owned(Box::new(element)));
        self.children.len() - 1
    }

    /// Insert an owned child at `index` (`index == child_count` appends)
    pub fn insert_element(&mut self, index: usize, element: Element) -> Result<()> {
        self.insert_slot(index, Child::Owned(Box::new(element)))
    }

    /// Append a borrowed child, returning its index
    pub fn borrow_element(&mut self, element: Rc<Element>) -> usize {
        self.children.push(Child::Borrowed(element));
        self.children.len() - 1
    }

    /// Insert a borrowed child at `index`
    pub fn insert_borrowed(&mut self, index: usize, element: Rc<Element>) -> Result<()> {
        self.insert_slot(index, Child::Borrowed(element))
    }

    /// Remove the child at `index`
    ///
    /// An owned child is handed back; a borrowed one is released and `None`
    /// is returned.
    pub fn remove_element(&mut self, index: usize) -> Result<Option<Element>> {
        self.reload(index)?;
        match self.remove_slot(index) {
            Child::Owned(e) => Ok(Some(*e)),
            Child::Borrowed(_) => Ok(None),
            Child::PagedOut(handle) => Err(XmlError::PageMissing(handle.path().to_path_buf())),
        }
    }

    /// Replace the child at `index`, keeping every insertion position
    pub fn replace_element(&mut self, index: usize, element: Element) -> Result<Option<Element>> {
        self.reload(index)?;
        let old = std::mem::replace(&mut self.children[index], Child::Owned(Box::new(element)));
        match old {
            Child::Owned(e) => Ok(Some(*e)),
            _ => Ok(None),
        }
    }

    /// Move the child at `from` so it ends up at index `to`
    pub fn move_element(&mut self, from: usize, to: usize) -> Result<()> {
        let len = self.children.len();
        if from >= len {
            return Err(XmlError::out_of_range(from, len));
        }
        if to >= len {
            return Err(XmlError::out_of_range(to, len));
        }
        if from == to {
            return Ok(());
        }
        self.reload(from)?;
        let slot = self.remove_slot(from);
        self.insert_slot(to, slot)
    }

    /// Detach every borrowed child, returning the shared references
    pub fn release_borrowed_elements(&mut self) -> Vec<Rc<Element>> {
        let mut released = Vec::new();
        let mut index = self.children.len();
        while index > 0 {
            index -= 1;
            if self.children[index].is_borrowed() {
                if let Child::Borrowed(rc) = self.remove_slot(index) {
                    released.push(rc);
                }
            }
        }
        released.reverse();
        released
    }

    fn insert_slot(&mut self, index: usize, slot: Child) -> Result<()> {
        let len = self.children.len();
        if index > len {
            return Err(XmlError::out_of_range(index, len));
        }
        self.children.insert(index, slot);
        if index < len {
            shift_up(&mut self.contents, index);
            shift_up(&mut self.comments, index);
            shift_up(&mut self.cdata, index);
        }
        Ok(())
    }

    /// Caller checks the index
    fn remove_slot(&mut self, index: usize) -> Child {
        let slot = self.children.remove(index);
        shift_down(&mut self.contents, index);
        shift_down(&mut self.comments, index);
        shift_down(&mut self.cdata, index);
        slot
    }

    // ========== Find ==========

    /// First resident child with this name
    ///
    /// Paged-out children are not searched; use [`Element::find_element_index`]
    /// or [`Element::find_element_mut`] when the tree may be paged.
    pub fn find_element(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .filter_map(Child::resident)
            .find(|e| e.name == name)
    }

    /// Index of the first child with this name, paged-out children included
    pub fn find_element_index(&self, name: &str) -> Result<Option<usize>> {
        for index in 0..self.children.len() {
            if self.resolve_child(index)?.name == name {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// First owned child with this name, reloading it if needed
    pub fn find_element_mut(&mut self, name: &str) -> Result<Option<&mut Element>> {
        match self.owned_index_of(name)? {
            Some(index) => self.child_mut(index).map(Some),
            None => Ok(None),
        }
    }

    /// First owned child with this name, appending a new one if absent
    pub fn find_or_create_element(&mut self, name: &str) -> Result<&mut Element> {
        let index = match self.owned_index_of(name)? {
            Some(index) => index,
            None => self.add_element(Element::new(name)),
        };
        self.child_mut(index)
    }

    fn owned_index_of(&self, name: &str) -> Result<Option<usize>> {
        for index in 0..self.children.len() {
            if self.children[index].is_borrowed() {
                continue;
            }
            if self.resolve_child(index)?.name == name {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    // ========== Attributes ==========

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn attributes_mut(&mut self) -> &mut Vec<Attribute> {
        &mut self.attributes
    }

    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Value of the first attribute with this name
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.find_attribute(name).map(|a| a.value.as_str())
    }

    /// Set the value of an existing attribute, or append a new one
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(attr) => attr.value = value,
            None => self.attributes.push(Attribute::new(name, value)),
        }
    }

    /// Append an attribute without checking for an existing name
    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<Attribute> {
        let index = self.attributes.iter().position(|a| a.name == name)?;
        Some(self.attributes.remove(index))
    }

    pub fn find_or_create_attribute(&mut self, name: &str) -> &mut Attribute {
        let index = match self.attributes.iter().position(|a| a.name == name) {
            Some(i) => i,
            None => {
                self.attributes.push(Attribute::new(name, ""));
                self.attributes.len() - 1
            }
        };
        &mut self.attributes[index]
    }

    /// Store bytes as a text-encoded attribute value
    pub fn set_binary_attribute(&mut self, name: &str, bytes: &[u8], encoding: BinaryEncoding) {
        self.set_attribute(name, encoding.encode(bytes));
    }

    /// Decode a text-encoded attribute value back to bytes
    pub fn binary_attribute(&self, name: &str, encoding: BinaryEncoding) -> Option<ByteBuffer> {
        self.attribute(name)
            .map(|value| ByteBuffer::from(encoding.decode(value)))
    }

    // ========== Contents ==========

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Append text after the current last child
    pub fn add_content(&mut self, text: impl Into<String>) {
        let position = self.children.len();
        self.contents.push(Content::text(position, text));
    }

    /// Add text in front of child `position`
    pub fn insert_content(&mut self, position: usize, text: impl Into<String>) -> Result<()> {
        self.check_position(position)?;
        self.contents.push(Content::text(position, text));
        Ok(())
    }

    /// Append a binary-mode content after the current last child
    pub fn add_binary_content(&mut self, bytes: impl Into<ByteBuffer>) {
        let position = self.children.len();
        self.contents.push(Content::binary(position, bytes));
    }

    /// Append a content node as-is
    pub fn push_content(&mut self, content: Content) {
        self.contents.push(content);
    }

    pub fn remove_content(&mut self, index: usize) -> Result<Content> {
        if index >= self.contents.len() {
            return Err(XmlError::out_of_range(index, self.contents.len()));
        }
        Ok(self.contents.remove(index))
    }

    /// Text of the N-th content, if it is in text mode
    pub fn content_text(&self, index: usize) -> Option<&str> {
        self.contents.get(index).and_then(Content::as_text)
    }

    /// Concatenated text of every text-mode content
    pub fn text(&self) -> String {
        self.contents.iter().filter_map(Content::as_text).collect()
    }

    // ========== Comments ==========

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn add_comment(&mut self, text: impl Into<String>) {
        let position = self.children.len();
        self.comments.push(Comment::new(position, text));
    }

    /// Append a processing instruction or declaration kept with the comments
    pub fn add_markup(&mut self, text: impl Into<String>, kind: CommentKind) {
        let position = self.children.len();
        self.comments.push(Comment::markup(position, text, kind));
    }

    pub fn push_comment(&mut self, comment: Comment) {
        self.comments.push(comment);
    }

    pub fn remove_comment(&mut self, index: usize) -> Result<Comment> {
        if index >= self.comments.len() {
            return Err(XmlError::out_of_range(index, self.comments.len()));
        }
        Ok(self.comments.remove(index))
    }

    // ========== CDATA ==========

    pub fn cdata(&self) -> &[CData] {
        &self.cdata
    }

    pub fn add_cdata(&mut self, text: impl Into<String>) {
        let position = self.children.len();
        self.cdata.push(CData::new(position, text));
    }

    pub fn push_cdata(&mut self, cdata: CData) {
        self.cdata.push(cdata);
    }

    pub fn remove_cdata(&mut self, index: usize) -> Result<CData> {
        if index >= self.cdata.len() {
            return Err(XmlError::out_of_range(index, self.cdata.len()));
        }
        Ok(self.cdata.remove(index))
    }

    fn check_position(&self, position: usize) -> Result<()> {
        if position > self.children.len() {
            return Err(XmlError::out_of_range(position, self.children.len() + 1));
        }
        Ok(())
    }

    /// True if the element has no children and no body nodes
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
            && self.contents.is_empty()
            && self.comments.is_empty()
            && self.cdata.is_empty()
    }

    // ========== Whole-tree operations ==========

    /// Deep copy; borrowed and paged-out children become owned copies
    pub fn duplicate(&self) -> Result<Element> {
        let mut children = Vec::with_capacity(self.children.len());
        for index in 0..self.children.len() {
            let child = self.resolve_child(index)?;
            children.push(Child::Owned(Box::new(child.duplicate()?)));
        }
        Ok(Element {
            name: self.name.clone(),
            children,
            attributes: self.attributes.clone(),
            contents: self.contents.clone(),
            comments: self.comments.clone(),
            cdata: self.cdata.clone(),
            temporal: self.temporal,
            tag: self.tag,
            format: self.format,
        })
    }

    /// Order-sensitive comparison of names, attributes, body nodes and
    /// children
    ///
    /// Tags, temporal flags and formatting are not compared. A child whose
    /// page file cannot be read compares unequal.
    pub fn structural_eq(&self, other: &Element) -> bool {
        if self.name != other.name
            || self.attributes.len() != other.attributes.len()
            || self.comments != other.comments
            || self.cdata != other.cdata
            || self.contents != other.contents
            || self.children.len() != other.children.len()
        {
            return false;
        }
        if !self
            .attributes
            .iter()
            .zip(&other.attributes)
            .all(|(a, b)| a.same_as(b))
        {
            return false;
        }
        (0..self.children.len()).all(|i| {
            match (self.resolve_child(i), other.resolve_child(i)) {
                (Ok(a), Ok(b)) => a.structural_eq(&b),
                _ => false,
            }
        })
    }

    /// Verify names, insertion positions and page files, recursively
    pub fn check_integrity(&self) -> Result<()> {
        let mut locator = Vec::new();
        self.check_integrity_at(&mut locator)
    }

    fn check_integrity_at(&self, locator: &mut Vec<usize>) -> Result<()> {
        if self.name.is_empty() {
            return Err(fail("element has an empty name".into(), locator));
        }
        let limit = self.children.len();
        let positions = self
            .contents
            .iter()
            .map(Positioned::position)
            .chain(self.comments.iter().map(Positioned::position))
            .chain(self.cdata.iter().map(Positioned::position));
        for position in positions {
            if position > limit {
                return Err(fail(
                    format!("insertion position {position} exceeds child count {limit}"),
                    locator,
                ));
            }
        }
        if let Some(attr) = self.attributes.iter().find(|a| a.name.is_empty()) {
            return Err(fail(
                format!("attribute with empty name (value {:?})", attr.value),
                locator,
            ));
        }

        for (index, child) in self.children.iter().enumerate() {
            locator.push(index);
            match child {
                Child::Owned(e) => e.check_integrity_at(locator)?,
                Child::Borrowed(e) => e.check_integrity_at(locator)?,
                Child::PagedOut(handle) => {
                    if !handle.path().exists() {
                        return Err(fail(
                            format!("page file {} is missing", handle.path().display()),
                            locator,
                        ));
                    }
                }
            }
            locator.pop();
        }
        Ok(())
    }

    /// Approximate heap and inline footprint in bytes
    ///
    /// Borrowed children count only their reference; paged-out children
    /// count only their handle.
    pub fn memory_usage(&self) -> usize {
        use std::mem::size_of;

        let mut total = size_of::<Element>()
            + self.name.capacity()
            + self.children.capacity() * size_of::<Child>()
            + self.attributes.capacity() * size_of::<Attribute>()
            + self.contents.capacity() * size_of::<Content>()
            + self.comments.capacity() * size_of::<Comment>()
            + self.cdata.capacity() * size_of::<CData>();

        total += self
            .attributes
            .iter()
            .map(|a| a.name.capacity() + a.value.capacity())
            .sum::<usize>();
        total += self
            .contents
            .iter()
            .map(|c| match &c.value {
                ContentValue::Text(t) => t.capacity(),
                ContentValue::Binary(b) => b.capacity(),
            })
            .sum::<usize>();
        total += self.comments.iter().map(|c| c.text.capacity()).sum::<usize>();
        total += self.cdata.iter().map(|c| c.text.capacity()).sum::<usize>();

        for child in &self.children {
            total += match child {
                Child::Owned(e) => e.memory_usage(),
                Child::Borrowed(_) => 0,
                Child::PagedOut(handle) => handle.path().as_os_str().len(),
            };
        }
        total
    }

    /// Remove temporal children and attributes recursively
    ///
    /// Paged-out children are reloaded so their subtrees can be pruned.
    /// Returns the number of nodes removed.
    pub fn prune_temporal(&mut self) -> Result<usize> {
        let before = self.attributes.len();
        self.attributes.retain(|a| !a.temporal);
        let mut removed = before - self.attributes.len();

        let mut index = 0;
        while index < self.children.len() {
            self.reload(index)?;
            let temporal = self.children[index]
                .resident()
                .is_some_and(Element::is_temporal);
            if temporal {
                self.remove_slot(index);
                removed += 1;
                continue;
            }
            if let Child::Owned(child) = &mut self.children[index] {
                removed += child.prune_temporal()?;
            }
            index += 1;
        }
        Ok(removed)
    }

    /// Release spare capacity recursively
    pub fn compress_memory(&mut self) {
        self.name.shrink_to_fit();
        self.children.shrink_to_fit();
        self.attributes.shrink_to_fit();
        self.contents.shrink_to_fit();
        self.comments.shrink_to_fit();
        self.cdata.shrink_to_fit();
        for content in &mut self.contents {
            match &mut content.value {
                ContentValue::Text(t) => t.shrink_to_fit(),
                ContentValue::Binary(b) => b.compress(),
            }
        }
        for child in &mut self.children {
            if let Child::Owned(e) = child {
                e.compress_memory();
            }
        }
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<Child> {
        &mut self.children
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Element) -> bool {
        self.structural_eq(other)
    }
}

// Owned descendants are freed from a work list, so dropping a deep chain
// does not recurse once per level
impl Drop for Element {
    fn drop(&mut self) {
        let mut pending: Vec<Box<Element>> = Vec::new();
        take_owned(&mut self.children, &mut pending);
        while let Some(mut element) = pending.pop() {
            take_owned(&mut element.children, &mut pending);
        }
    }
}

fn take_owned(children: &mut Vec<Child>, pending: &mut Vec<Box<Element>>) {
    for child in children.drain(..) {
        if let Child::Owned(element) = child {
            pending.push(element);
        }
    }
}

fn fail(message: String, locator: &[usize]) -> XmlError {
    XmlError::Integrity {
        message,
        locator: locator.to_vec(),
    }
}

fn shift_up<T: Positioned>(nodes: &mut [T], index: usize) {
    for node in nodes {
        if node.position() > index {
            *node.position_mut() += 1;
        }
    }
}

fn shift_down<T: Positioned>(nodes: &mut [T], index: usize) {
    for node in nodes {
        if node.position() > index {
            *node.position_mut() -= 1;
        }
    }
}

//! DOM Module - owned, mutable XML tree
//!
//! - [`Element`] nodes own their children through [`Child`] slots
//! - Text, comments and CDATA are positioned among the children
//! - [`Document`] ties a [`Header`] and a root together with the page store,
//!   the query cache and an optional crypto delegate

#[cfg(test)]
pub(crate) mod arbitrary;
pub mod document;
pub mod element;
pub mod header;
pub mod node;

pub use document::{CryptoDelegate, Document};
pub use element::{Child, ChildRef, Element, MAX_NESTING_DEPTH};
pub use header::{Header, HeaderComment, Placement, DEFAULT_HEADER};
pub use node::{Attribute, CData, Comment, CommentKind, Content, ContentValue, FormatOptions};

//! pagedxml - Mutable XML document tree with paging to disk
//!
//! Layers:
//! - parser: lenient text parser producing an owned [`Element`] tree
//! - dom: elements, positioned text/comments/CDATA, documents and headers
//! - export: formatted or compact text writer, streaming or counted
//! - binary: compact TLV image of elements and documents
//! - paging: move subtrees to page files and back on demand
//! - query: AND-only filter expressions with a per-document LRU cache
//! - mime: Base64 and quoted-printable stream filters
//!
//! ```
//! use pagedxml::{Document, ExportOptions, ParseStatus};
//!
//! let doc = Document::parse_str("<?xml version=\"1.0\"?><root><a>1</a></root>");
//! assert_eq!(doc.status(), ParseStatus::Ok);
//! let text = doc.to_text(ExportOptions::compact()).unwrap();
//! assert_eq!(text, "<?xml version=\"1.0\"?><root><a>1</a></root>");
//! ```

pub mod binary;
pub mod buffer;
pub mod core;
pub mod dom;
pub mod error;
pub mod export;
pub mod mime;
pub mod paging;
pub mod parser;
pub mod query;

// ============================================================================
// Allocator Configuration
// ============================================================================

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

// ============================================================================
// Re-exports
// ============================================================================

pub use buffer::ByteBuffer;
pub use core::encoding::TextEncoding;
pub use core::scanner::QuotePolicy;
pub use dom::{
    Attribute, CData, Child, ChildRef, Comment, CommentKind, Content, ContentValue,
    CryptoDelegate, Document, Element, FormatOptions, Header, HeaderComment, Placement,
    DEFAULT_HEADER, MAX_NESTING_DEPTH,
};
pub use error::{Result, XmlError};
pub use export::{CountingSink, ExportMode, ExportOptions, Exporter, SaveOptions};
pub use mime::BinaryEncoding;
pub use paging::{PageHandle, PageStore};
pub use parser::{ParseOptions, ParseStatus};
pub use query::{Query, QueryCache, UNLIMITED_DEPTH};

//! Error types for pagedxml

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pagedxml operations
pub type Result<T> = std::result::Result<T, XmlError>;

/// Main error type for all document operations
///
/// Text parsing does not use this type for recoverable outcomes: a parse always
/// yields a tree plus a [`ParseStatus`](crate::ParseStatus). `Parse` is only
/// returned where a caller needs a complete tree (page reload, `Document::load`
/// with a fatal status is still `Ok`).
#[derive(Error, Debug)]
pub enum XmlError {
    /// IO error wrapper
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Text could not be parsed into a complete tree
    #[error("Parse error at byte {position}: {message}")]
    Parse { message: String, position: usize },

    /// Binary frame rejected by the TLV decoder
    #[error("Invalid binary frame: {0}")]
    Binary(&'static str),

    /// Page file for a paged-out child is gone
    #[error("Page file missing: {}", .0.display())]
    PageMissing(PathBuf),

    /// Page store could not provide a directory
    #[error("Page store unavailable: {0}")]
    PageUnavailable(String),

    /// Child, content, comment or CDATA index out of range
    #[error("Index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Operation needs an owned child but the slot is borrowed
    #[error("Child {0} is borrowed, not owned")]
    NotOwned(usize),

    /// Child subtree would not read back unchanged from a page file
    #[error("Child {index} cannot be paged out: {message}")]
    NotPageable { index: usize, message: String },

    /// Malformed query expression
    #[error("Invalid query at term {term}: {message}")]
    Query { message: String, term: usize },

    /// Text encoding conversion failed
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Encrypt/decrypt delegate failure
    #[error("Crypto delegate failed: {0}")]
    Crypto(String),

    /// Tree failed an integrity check
    #[error("Integrity check failed at {locator:?}: {message}")]
    Integrity { message: String, locator: Vec<usize> },
}

impl XmlError {
    pub(crate) fn out_of_range(index: usize, len: usize) -> Self {
        XmlError::IndexOutOfRange { index, len }
    }
}

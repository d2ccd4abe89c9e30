//! Query engine
//!
//! A small AND-only filter language over element names, paths, attributes
//! and contents. See [`parser`] for the grammar.
//!
//! ```text
//! type == "book*" price < 20
//! ? == "item" ! == "catalog/*/item"
//! ```

pub mod cache;
pub mod eval;
pub mod parser;

pub use cache::{QueryCache, DEFAULT_CAPACITY};
pub use eval::{select, UNLIMITED_DEPTH};
pub use parser::{CompareOp, Operand, Query, Selector, Term};

use crate::dom::Element;
use crate::error::Result;

impl Element {
    /// Descendants matching `expr`, down to `depth` levels below the children
    ///
    /// Paged-out descendants within reach are reloaded first.
    pub fn select(&mut self, expr: &str, depth: usize) -> Result<Vec<&Element>> {
        let query = Query::parse(expr)?;
        self.reload_to_depth(depth)?;
        Ok(select(self, &query, depth))
    }
}

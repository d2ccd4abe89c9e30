//! Resolved layout for one element
//!
//! Each element's `FormatOptions` override only the fields they set; the
//! result is passed down to its children.

use std::io::{self, Write};

use crate::dom::FormatOptions;

/// Indentation stops growing past this many levels
pub const MAX_INDENT_DEPTH: usize = 32;

const SPACES: [u8; 255] = [b' '; 255];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Layout {
    pub indent_width: usize,
    pub use_tabs: bool,
    pub break_elements: bool,
    pub break_contents: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Layout {
            indent_width: 2,
            use_tabs: false,
            break_elements: true,
            break_contents: false,
        }
    }
}

impl Layout {
    /// Layout for an element given its parent's
    pub fn apply(&self, options: &FormatOptions) -> Layout {
        Layout {
            indent_width: options
                .indent_width
                .map_or(self.indent_width, usize::from),
            use_tabs: options.use_tabs.unwrap_or(self.use_tabs),
            break_elements: options.break_elements.unwrap_or(self.break_elements),
            break_contents: options.break_contents.unwrap_or(self.break_contents),
        }
    }

    pub fn write_indent<W: Write>(&self, out: &mut W, depth: usize) -> io::Result<()> {
        let unit: &[u8] = if self.use_tabs {
            b"\t"
        } else {
            &SPACES[..self.indent_width.min(SPACES.len())]
        };
        for _ in 0..depth.min(MAX_INDENT_DEPTH) {
            out.write_all(unit)?;
        }
        Ok(())
    }
}

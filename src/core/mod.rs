//! Core XML parsing primitives
//!
//! This module contains the fundamental building blocks for XML parsing:
//! - Scanner: SIMD-accelerated delimiter detection and the close-tag matcher
//! - Entities: XML entity encoding/decoding with Cow (zero-copy when possible)
//! - Attributes: Attribute parsing and extraction
//! - Encoding: UTF-16 detection and conversion to and from UTF-8
//! - Glob: wildcard matching for query operands

pub mod attributes;
pub mod encoding;
pub mod entities;
pub mod glob;
pub mod scanner;

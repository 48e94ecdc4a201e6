//! Predicate expression language.
//!
//! The test part of a pattern (`item[@type = 'video']`) is written in a
//! forward-only subset of `XPath` 1.0: literals, relative location paths over
//! the child, self, descendant-or-self and attribute axes, comparisons,
//! `and`/`or`, and a small function library.
//!
//! # Quick Start
//!
//! ```
//! use xmlscan::Document;
//! use xmlscan::xpath::evaluate;
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let root = doc.roots()[0];
//! assert!(evaluate(&doc, root, "count(*) = 2").unwrap().to_boolean());
//! ```
//!
//! # Submodules
//!
//! - [`lexer`]: Tokenizer for expression strings.
//! - [`ast`]: Syntax tree types.
//! - [`parser`]: Recursive descent parser with compile-time function checks.
//! - [`eval`]: Evaluator against a built node or a start tag's attributes.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use eval::{Context, Item, Value};

use crate::error::PatternError;
use crate::tree::{Document, NodeId};

/// Parses and evaluates an expression against a built node in one call.
///
/// For repeated evaluation, parse once with [`parser::parse`] and call
/// [`eval::evaluate`].
///
/// # Errors
///
/// Returns [`PatternError`] if the expression is malformed.
pub fn evaluate<'a>(
    doc: &'a Document,
    node: NodeId,
    expression: &str,
) -> Result<Value<'a>, PatternError> {
    let expr = parser::parse(expression)?;
    Ok(eval::evaluate(&expr, Context::Node { doc, node }))
}

//! A small, generic XPath 1.0 engine.
//!
//! The engine is written against the [`SourceNode`] trait rather than any
//! concrete XML library, so any navigable read-only tree can be queried.
//! Consumers parse with [`parse`] (or go straight through [`eval_str`]) and
//! receive an [`XPathValue`]: node-set, string, number, or boolean.

pub mod ast;
pub mod axes;
pub mod engine;
pub mod error;
pub mod functions;
pub mod operators;
pub mod parser;
pub mod path;
pub mod source;

pub use engine::{eval_str, evaluate, Context, XPathValue};
pub use error::XPathError;
pub use parser::parse;
pub use path::absolute_path;
pub use source::{NodeKind, NodeName, SourceNode};

//! # inquest-core
//!
//! Rule-driven XML validation: a small declarative expression language (the
//! rule DSL) evaluated over XPath queries, a rule engine with six rule
//! kinds, and report assembly.
//!
//! ## Module structure
//!
//! - `value`: the DSL value model and its coercion rules
//! - `expr`: the immutable expression tree
//! - `eval`: the context-threaded recursive evaluator
//! - `xml`: roxmltree-backed [`XmlDocument`] implementing the XPath
//!   engine's source-tree trait
//! - `rules`: compiled rules, conditions, and outcome records
//! - `engine`: the rule engine (per-kind checks, per-node validation)
//! - `loader`: rule-document schema validation and compilation
//! - `report`: summary counting and report assembly
//! - `inspector`: the file-level pipeline, parallel across inputs
//!
//! ## Usage
//!
//! ```ignore
//! use inquest_core::{InspectOptions, Inspector};
//!
//! let report = Inspector::new().inspect(&InspectOptions {
//!     xml_files: vec!["order.xml".into()],
//!     rules_file: "rules.json".into(),
//! })?;
//! assert!(report.all_passed());
//! ```

pub mod engine;
pub mod eval;
pub mod expr;
pub mod inspector;
pub mod loader;
pub mod report;
pub mod rules;
pub mod value;
pub mod xml;

pub use eval::{evaluate, EvalContext, EvalError};
pub use expr::{Arg, Expr, Op};
pub use inspector::{InspectError, InspectOptions, Inspector};
pub use loader::{load_rules, parse_rules, LoadError};
pub use report::{Metadata, Report, Summary};
pub use rules::{
    CmpOp, Comparison, Condition, Expected, NodeOutcome, Rule, RuleKind, RuleOutcome, RuleSet,
    Severity, Status,
};
pub use value::{DataType, Value};
pub use xml::{XmlDocument, XmlNode};

// The engine crate is part of the public API surface (generic rule
// evaluation over any source tree).
pub use inquest_xpath1 as xpath;

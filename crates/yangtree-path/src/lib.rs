//! Location-path mini-language for YANG data trees.
//!
//! This crate parses the XPath-like addresses used to find and edit nodes in
//! a data tree, classifies bracketed predicates, and evaluates the small
//! predicate expression language (`= != < <= > >= and or + - * div mod`,
//! `position()`, `first()`, `last()`, `count()`, `current()`, `not()`).
//!
//! # Example
//!
//! ```
//! use yangtree_path::{classify_predicate, parse_path, Predicate, StepKind};
//!
//! let steps = parse_path("/interfaces/interface[name=eth0]/mtu").unwrap();
//! assert_eq!(steps.len(), 4);
//! assert_eq!(steps[0].kind, StepKind::FromRoot);
//! assert_eq!(steps[2].predicates, vec!["name=eth0".to_string()]);
//!
//! let predicate = classify_predicate(&steps[2].predicates[0]).unwrap();
//! assert_eq!(
//!     predicate,
//!     Predicate::KeyValue { name: "name".into(), value: "eth0".into() }
//! );
//! ```

mod types;
pub use types::{PathStep, StepKind};

mod parser;
pub use parser::{parse_path, ParseError, PathParser};

mod lexer;
pub use lexer::{tokenize, Token};

mod expr;
pub use expr::{BinaryOp, Expr, FUNCTIONS};

mod eval;
pub use eval::{value_to_string, ExprContext, ExprError, ExprValue};

mod predicate;
pub use predicate::{classify_predicate, escape, unescape, Predicate};

mod util;
pub use util::{path_to_string, step_to_string};

//! # fieldcalc-formula
//!
//! Formula language engine for fieldcalc.
//!
//! This crate provides:
//! - Scanning (text → tokens, lossless)
//! - Precedence normalisation and tree building (tokens → expression tree)
//! - Evaluation (tree → text value) with built-in functions and operators
//! - Positioned syntax validation
//! - Dependency resolution across named formulas, with cycle detection
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc_formula::{evaluate, parse, scan, validate};
//!
//! let formula = "if({qty} > 10, round({price} * 0.9, 2), {price})";
//! assert!(validate(&scan(formula), None).is_empty());
//!
//! let value = evaluate(&parse(formula), |name| match name {
//!     "qty" => "12".to_string(),
//!     "price" => "4.99".to_string(),
//!     _ => String::new(),
//! });
//! assert_eq!(value, "4.49");
//! ```

pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod precedence;
pub mod scanner;
pub mod token;
pub mod validator;

pub use dependency::{resolve_formulas, FormulaEntry, ReferenceGraph};
pub use error::{FormulaError, FormulaResult};
pub use evaluator::{evaluate, evaluate_formula};
pub use functions::{execute_function, execute_operator, is_supported};
pub use parser::{build_tree, parse};
pub use precedence::{encode_precedence, fix_leading_operators};
pub use scanner::scan;
pub use token::{join_tokens, Token, TokenKind, TokenNode};
pub use validator::{validate, ErrorType, ValidationError};

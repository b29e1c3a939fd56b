//! # fieldcalc
//!
//! Calculated fields for tabular records.
//!
//! Users write small formulas that reference record fields (`{price}`) and
//! other formulas by name. fieldcalc validates them, orders them by their
//! dependencies and computes them per record.
//!
//! ## Features
//!
//! - Arithmetic, comparison and text formulas with string values
//! - Positioned syntax errors suitable for inline highlighting
//! - Cycle detection and error propagation across named formulas
//! - Evaluation of a whole formula set per record in dependency order
//!
//! ## Example
//!
//! ```rust
//! use fieldcalc::prelude::*;
//!
//! let set = FormulaSet::new([
//!     ("discount", "if({qty} >= 10, 0.1, 0)"),
//!     ("total", "round({price} * {qty} * (1 - {discount}), 2)"),
//! ]);
//! assert!(set.is_valid());
//!
//! let result = set.calculate([("price", "3.99"), ("qty", "12")]);
//! assert_eq!(result.get("total"), Some("43.09"));
//! ```

pub mod calculation;
pub mod prelude;

// Re-export calculation types
pub use calculation::{CalculatedRecord, CalculationOptions, CalculationStats, FormulaSet};

// Re-export formula engine types
pub use fieldcalc_formula::{
    evaluate, evaluate_formula, join_tokens, parse, resolve_formulas, scan, validate, ErrorType,
    FormulaEntry, FormulaError, FormulaResult, Token, TokenKind, TokenNode, ValidationError,
};

//! Formula error types

use crate::validator::ErrorType;
use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors raised when a formula value is requested but cannot be computed
///
/// Scanning, validation and evaluation themselves never fail: their problems
/// are reported as [`crate::ValidationError`] data on the formula.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// No formula with this name
    #[error("Unknown formula: {0}")]
    UnknownFormula(String),

    /// The formula has validation errors
    #[error("Invalid formula {name}: {}", describe(.errors))]
    InvalidFormula { name: String, errors: Vec<ErrorType> },

    /// The formula never received an evaluation order
    #[error("Unresolved formula: {0}")]
    UnresolvedFormula(String),
}

fn describe(errors: &[ErrorType]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

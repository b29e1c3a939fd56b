//! Prelude module - common imports for fieldcalc users
//!
//! ```rust
//! use fieldcalc::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculatedRecord,
    CalculationOptions,
    CalculationStats,
    // Error types
    ErrorType,
    FormulaEntry,
    FormulaError,
    FormulaResult,
    FormulaSet,
    ValidationError,
};

//! Syntax validation
//!
//! A single left-to-right pass over the raw scanned tokens (not the tree).
//! Unclosed constructs are tracked on a stack so they can be reported once
//! the stream ends, in the order they were opened.

use crate::functions::is_supported;
use crate::token::{Token, TokenKind};
use ahash::AHashSet;
use std::fmt;
use thiserror::Error;

/// Kind of a formula problem
///
/// The first eighteen kinds come from the syntax pass; the last four are
/// attached by the dependency resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorType {
    #[error("Unexpected operator")]
    UnexpectedOperator,
    #[error("A value is required after the operator")]
    ValueRequiredAfterOperator,
    #[error("An operator is required before the number")]
    OperatorRequiredBeforeNumber,
    #[error("An operator is required before the function")]
    OperatorRequiredBeforeFunction,
    #[error("An operator is required before the quote")]
    OperatorRequiredBeforeQuote,
    #[error("An operator is required before the bracket")]
    OperatorRequiredBeforeBracket,
    #[error("An operator is required before the reference")]
    OperatorRequiredBeforeReference,
    #[error("Unknown function")]
    InvalidFunction,
    #[error("Invalid character")]
    InvalidCharacter,
    #[error("Unexpected comma")]
    UnexpectedComma,
    #[error("Unexpected bracket")]
    UnexpectedBracket,
    #[error("Unexpected reference bracket")]
    UnexpectedReferenceBracket,
    #[error("A reference name is required between the braces")]
    ReferenceNameRequiredInBrackets,
    #[error("Unsupported reference name")]
    UnsupportedReferenceName,
    #[error("Unclosed quote")]
    UnclosedQuote,
    #[error("Unclosed double quote")]
    UnclosedDoubleQuote,
    #[error("Unclosed bracket")]
    UnclosedBracket,
    #[error("Unclosed reference bracket")]
    UnclosedReferenceBracket,

    // === Cross-formula ===
    #[error("Circular reference")]
    CircularReference,
    #[error("The formula references itself")]
    CircularReferenceToItself,
    #[error("Depends on an invalid formula")]
    DependsOnInvalid,
    #[error("Depends on a circular reference")]
    DependsOnCircular,
}

/// A positioned formula problem
///
/// `token` and `token_index` are `None` only for errors that concern the whole
/// formula rather than one token.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationError {
    pub token: Option<Token>,
    pub token_index: Option<usize>,
    pub error_type: ErrorType,
}

impl ValidationError {
    /// Error attributed to the token at `index`
    pub fn at(index: usize, token: &Token, error_type: ErrorType) -> Self {
        Self {
            token: Some(token.clone()),
            token_index: Some(index),
            error_type,
        }
    }

    /// Error not tied to a token
    pub fn unpositioned(error_type: ErrorType) -> Self {
        Self {
            token: None,
            token_index: None,
            error_type,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.token, self.token_index) {
            (Some(token), Some(index)) => {
                write!(f, "{} at token {} (`{}`)", self.error_type, index, token.value)
            }
            _ => write!(f, "{}", self.error_type),
        }
    }
}

impl std::error::Error for ValidationError {}

/// A construct waiting for its closing token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Quote,
    DoubleQuote,
    Function,
    Group,
    Reference,
}

impl OpenKind {
    fn unclosed_error(self) -> ErrorType {
        match self {
            OpenKind::Quote => ErrorType::UnclosedQuote,
            OpenKind::DoubleQuote => ErrorType::UnclosedDoubleQuote,
            OpenKind::Function | OpenKind::Group => ErrorType::UnclosedBracket,
            OpenKind::Reference => ErrorType::UnclosedReferenceBracket,
        }
    }
}

/// Kinds after which a new value may start
fn value_allowed_after(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Operator | TokenKind::Comma | TokenKind::BracketStart
    )
}

/// Validate scanned tokens
///
/// With `supported_refs`, reference names outside the list (compared
/// case-insensitively) are reported as unsupported. Errors come back in token
/// order, followed by one error per construct left open.
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{scan, validate, ErrorType};
///
/// let errors = validate(&scan("5 5"), None);
/// assert_eq!(errors.len(), 1);
/// assert_eq!(errors[0].error_type, ErrorType::OperatorRequiredBeforeNumber);
/// assert_eq!(errors[0].token_index, Some(2));
/// ```
pub fn validate(tokens: &[Token], supported_refs: Option<&[String]>) -> Vec<ValidationError> {
    let allowed: Option<AHashSet<String>> =
        supported_refs.map(|refs| refs.iter().map(|r| r.to_lowercase()).collect());

    let mut errors = Vec::new();
    let mut open: Vec<(OpenKind, usize)> = Vec::new();
    let mut function_level: i32 = 0;

    for (index, token) in tokens.iter().enumerate() {
        let prev = closest_significant(tokens, index, Step::Back).map(|t| t.kind);
        let next = closest_significant(tokens, index, Step::Forward).map(|t| t.kind);
        let prev_ends_value = prev.map_or(false, TokenKind::ends_value);
        let needs_operator = prev.map_or(false, |kind| !value_allowed_after(kind));

        let mut report = |error_type| errors.push(ValidationError::at(index, token, error_type));

        match token.kind {
            TokenKind::Operator => {
                if !prev_ends_value {
                    // A sign may open a value: `-(-round({x}))`
                    let is_sign = token.value == "+" || token.value == "-";
                    if !is_sign || !next.map_or(false, TokenKind::starts_value) {
                        report(ErrorType::UnexpectedOperator);
                    }
                }
                if next.is_none() {
                    report(ErrorType::ValueRequiredAfterOperator);
                }
            }
            TokenKind::Number => {
                if needs_operator {
                    report(ErrorType::OperatorRequiredBeforeNumber);
                }
            }
            TokenKind::FunctionName => {
                if needs_operator {
                    report(ErrorType::OperatorRequiredBeforeFunction);
                }
                if !is_supported(&token.value) {
                    report(ErrorType::InvalidFunction);
                }
            }
            TokenKind::QuoteStart | TokenKind::DoubleQuoteStart => {
                if needs_operator {
                    report(ErrorType::OperatorRequiredBeforeQuote);
                }
                let kind = if token.kind == TokenKind::QuoteStart {
                    OpenKind::Quote
                } else {
                    OpenKind::DoubleQuote
                };
                open.push((kind, index));
            }
            TokenKind::QuoteEnd => {
                if matches!(open.last(), Some((OpenKind::Quote, _))) {
                    open.pop();
                }
            }
            TokenKind::DoubleQuoteEnd => {
                if matches!(open.last(), Some((OpenKind::DoubleQuote, _))) {
                    open.pop();
                }
            }
            TokenKind::Comma => {
                if function_level <= 0 || !prev_ends_value {
                    report(ErrorType::UnexpectedComma);
                }
            }
            TokenKind::Error => report(ErrorType::InvalidCharacter),
            TokenKind::BracketStart => {
                if prev == Some(TokenKind::FunctionName) {
                    function_level += 1;
                    open.push((OpenKind::Function, index));
                } else {
                    open.push((OpenKind::Group, index));
                    if needs_operator {
                        report(ErrorType::OperatorRequiredBeforeBracket);
                    }
                }
            }
            TokenKind::BracketEnd => match open.last().map(|(kind, _)| *kind) {
                Some(kind @ (OpenKind::Function | OpenKind::Group)) => {
                    if kind == OpenKind::Function {
                        function_level -= 1;
                    }
                    open.pop();
                    if !prev_ends_value && prev != Some(TokenKind::BracketStart) {
                        report(ErrorType::UnexpectedBracket);
                    }
                }
                _ => report(ErrorType::UnexpectedBracket),
            },
            TokenKind::ReferenceBracketStart => {
                open.push((OpenKind::Reference, index));
                if needs_operator {
                    report(ErrorType::OperatorRequiredBeforeReference);
                }
            }
            TokenKind::ReferenceBracketEnd => {
                if matches!(open.last(), Some((OpenKind::Reference, _))) {
                    open.pop();
                    if prev != Some(TokenKind::ReferenceName) {
                        report(ErrorType::ReferenceNameRequiredInBrackets);
                    }
                } else {
                    report(ErrorType::UnexpectedReferenceBracket);
                }
            }
            TokenKind::ReferenceName => {
                if let Some(allowed) = &allowed {
                    if !allowed.contains(&token.value.to_lowercase()) {
                        report(ErrorType::UnsupportedReferenceName);
                    }
                }
            }
            TokenKind::String | TokenKind::Whitespace | TokenKind::Group => {}
        }
    }

    for (kind, index) in open {
        errors.push(ValidationError::at(index, &tokens[index], kind.unclosed_error()));
    }

    errors
}

#[derive(Clone, Copy)]
enum Step {
    Back,
    Forward,
}

/// Nearest non-whitespace token before or after `index`
fn closest_significant(tokens: &[Token], index: usize, step: Step) -> Option<&Token> {
    match step {
        Step::Back => tokens[..index].iter().rev().find(|t| !t.is_whitespace()),
        Step::Forward => tokens[index + 1..].iter().find(|t| !t.is_whitespace()),
    }
}

//! Token and expression tree types

use std::fmt;

/// Kind of a scanned token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TokenKind {
    // === Values ===
    /// Decimal number literal, optionally signed (`-2`, `.5`, `12.25`)
    Number,
    /// Raw content of a quoted literal, escapes left untouched
    String,

    // === Structure ===
    Whitespace,
    /// `+ - * / ^ < <= = == >= >`
    Operator,
    /// `(`
    BracketStart,
    /// `)`
    BracketEnd,
    /// `{`
    ReferenceBracketStart,
    /// `}`
    ReferenceBracketEnd,
    /// Text between `{` and `}`
    ReferenceName,
    /// Identifier directly followed by `(`
    FunctionName,
    Comma,
    /// `'` opening a literal
    QuoteStart,
    /// `'` closing a literal
    QuoteEnd,
    /// `"` opening a literal
    DoubleQuoteStart,
    /// `"` closing a literal
    DoubleQuoteEnd,

    /// Parenthesized sub-expression; only ever appears in the tree
    Group,
    /// Single unrecognized character
    Error,
}

impl TokenKind {
    /// Whether a token of this kind ends a value an operator can apply to
    pub fn ends_value(self) -> bool {
        matches!(
            self,
            TokenKind::Number
                | TokenKind::BracketEnd
                | TokenKind::ReferenceBracketEnd
                | TokenKind::QuoteEnd
                | TokenKind::DoubleQuoteEnd
        )
    }

    /// Whether a token of this kind opens a value (number, group, reference, call, literal)
    pub fn starts_value(self) -> bool {
        matches!(
            self,
            TokenKind::Number
                | TokenKind::BracketStart
                | TokenKind::ReferenceBracketStart
                | TokenKind::FunctionName
                | TokenKind::QuoteStart
                | TokenKind::DoubleQuoteStart
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TokenKind::Number => "Number",
            TokenKind::String => "String",
            TokenKind::Whitespace => "Whitespace",
            TokenKind::Operator => "Operator",
            TokenKind::BracketStart => "BracketStart",
            TokenKind::BracketEnd => "BracketEnd",
            TokenKind::ReferenceBracketStart => "ReferenceBracketStart",
            TokenKind::ReferenceBracketEnd => "ReferenceBracketEnd",
            TokenKind::ReferenceName => "ReferenceName",
            TokenKind::FunctionName => "FunctionName",
            TokenKind::Comma => "Comma",
            TokenKind::QuoteStart => "QuoteStart",
            TokenKind::QuoteEnd => "QuoteEnd",
            TokenKind::DoubleQuoteStart => "DoubleQuoteStart",
            TokenKind::DoubleQuoteEnd => "DoubleQuoteEnd",
            TokenKind::Group => "Group",
            TokenKind::Error => "Error",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scanned token: its kind and the exact source text it covers
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
}

impl Token {
    pub fn new<S: Into<String>>(kind: TokenKind, value: S) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }

    pub fn is_whitespace(&self) -> bool {
        self.kind == TokenKind::Whitespace
    }
}

/// Expression tree node
///
/// Leaves are `Number`, `String` and `ReferenceName` nodes. `Operator` nodes
/// hold up to two children (left, right), `FunctionName` nodes one child per
/// argument and `Group` nodes the contents of one parenthesized expression.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TokenNode {
    pub kind: TokenKind,
    pub value: String,
    pub inner_nodes: Vec<TokenNode>,
}

impl TokenNode {
    /// Create a node without children
    pub fn leaf<S: Into<String>>(kind: TokenKind, value: S) -> Self {
        Self {
            kind,
            value: value.into(),
            inner_nodes: Vec::new(),
        }
    }

    /// Create a node with the given children
    pub fn with_children<S: Into<String>>(
        kind: TokenKind,
        value: S,
        inner_nodes: Vec<TokenNode>,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            inner_nodes,
        }
    }

    /// Synthetic node wrapping a parenthesized sub-expression
    pub fn group(inner_nodes: Vec<TokenNode>) -> Self {
        Self::with_children(TokenKind::Group, "", inner_nodes)
    }
}

impl From<&Token> for TokenNode {
    fn from(token: &Token) -> Self {
        Self::leaf(token.kind, token.value.clone())
    }
}

/// Rebuild the source text from scanned tokens
pub fn join_tokens(tokens: &[Token]) -> String {
    tokens.iter().map(|t| t.value.as_str()).collect()
}

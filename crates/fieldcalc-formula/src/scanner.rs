//! Formula scanner
//!
//! Splits formula text into a flat list of typed tokens, whitespace included.
//! Every decision depends only on the remaining input and the kind of the last
//! non-whitespace token, and every step consumes at least one character, so
//! joining the token values always gives back the original text.

use crate::token::{Token, TokenKind};
use lazy_regex::regex_find;

/// Scan a formula into tokens
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{scan, TokenKind};
///
/// let tokens = scan("1 + {price}");
/// assert_eq!(tokens[0].kind, TokenKind::Number);
/// assert_eq!(tokens[5].value, "price");
/// ```
pub fn scan(formula: &str) -> Vec<Token> {
    let mut scanner = FormulaScanner::new(formula);
    while !scanner.is_at_end() {
        scanner.step();
    }
    log::trace!("scanned {} tokens from {:?}", scanner.tokens.len(), formula);
    scanner.tokens
}

/// Kinds after which a leading `-` is subtraction rather than a sign
const OPERAND_BEFORE_MINUS: [TokenKind; 4] = [
    TokenKind::Number,
    TokenKind::String,
    TokenKind::BracketEnd,
    TokenKind::ReferenceBracketEnd,
];

struct FormulaScanner<'a> {
    input: &'a str,
    pos: usize,
    /// Kind of the last non-whitespace token
    prev: Option<TokenKind>,
    tokens: Vec<Token>,
}

impl<'a> FormulaScanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            prev: None,
            tokens: Vec::new(),
        }
    }

    fn step(&mut self) {
        let start = self.pos;
        let (kind, len) = self.next_rule();
        assert!(
            len > 0,
            "scanner rule {kind} matched zero characters at byte {start}"
        );
        self.pos += len;
        self.push(kind, start);
    }

    /// Pick the rule matching at the current position: `(kind, bytes consumed)`
    fn next_rule(&mut self) -> (TokenKind, usize) {
        let rest = self.rest();
        let c = match rest.chars().next() {
            Some(c) => c,
            None => return (TokenKind::Error, 0),
        };

        // === Quotes ===
        if c == '"' && self.prev != Some(TokenKind::QuoteStart) {
            return match self.prev {
                Some(TokenKind::String) => (TokenKind::DoubleQuoteEnd, 1),
                Some(TokenKind::DoubleQuoteStart) => {
                    self.push_empty_string();
                    (TokenKind::DoubleQuoteEnd, 1)
                }
                _ => (TokenKind::DoubleQuoteStart, 1),
            };
        }
        if c == '\'' && self.prev != Some(TokenKind::DoubleQuoteStart) {
            return match self.prev {
                Some(TokenKind::String) => (TokenKind::QuoteEnd, 1),
                Some(TokenKind::QuoteStart) => {
                    self.push_empty_string();
                    (TokenKind::QuoteEnd, 1)
                }
                _ => (TokenKind::QuoteStart, 1),
            };
        }
        match self.prev {
            Some(TokenKind::DoubleQuoteStart) => {
                return (TokenKind::String, quoted_content_len(rest, '"'))
            }
            Some(TokenKind::QuoteStart) => {
                return (TokenKind::String, quoted_content_len(rest, '\''))
            }
            _ => {}
        }

        // === Numbers ===
        if let Some(number) = regex_find!(r"^-?[0-9]*\.?[0-9]+", rest) {
            let after_operand = self
                .prev
                .map_or(false, |prev| OPERAND_BEFORE_MINUS.contains(&prev));
            if number.starts_with('-') && after_operand {
                return (TokenKind::Operator, 1);
            }
            return (TokenKind::Number, number.len());
        }

        // === References ===
        if self.prev == Some(TokenKind::ReferenceBracketStart) {
            if let Some(name) = regex_find!(r"^[^{}]+", rest) {
                return (TokenKind::ReferenceName, name.len());
            }
        }

        // === Operators ===
        if let Some(op) = regex_find!(r"^(<=|==|>=)", rest) {
            return (TokenKind::Operator, op.len());
        }
        if let Some(op) = regex_find!(r"^[-+*/^<=>]", rest) {
            return (TokenKind::Operator, op.len());
        }

        // === Function names ===
        if let Some(name) = regex_find!(r"^[a-zA-Z][a-zA-Z0-9]*", rest) {
            if regex_find!(r"^\s*\(", &rest[name.len()..]).is_some() {
                return (TokenKind::FunctionName, name.len());
            }
        }

        // === Delimiters ===
        match c {
            '(' => return (TokenKind::BracketStart, 1),
            ')' => return (TokenKind::BracketEnd, 1),
            '{' => return (TokenKind::ReferenceBracketStart, 1),
            '}' => return (TokenKind::ReferenceBracketEnd, 1),
            ',' => return (TokenKind::Comma, 1),
            _ => {}
        }

        if let Some(ws) = regex_find!(r"^\s+", rest) {
            return (TokenKind::Whitespace, ws.len());
        }

        // Anything else is a one-character error token
        (TokenKind::Error, c.len_utf8())
    }

    fn push(&mut self, kind: TokenKind, start: usize) {
        self.tokens.push(Token::new(kind, &self.input[start..self.pos]));
        if kind != TokenKind::Whitespace {
            self.prev = Some(kind);
        }
    }

    /// Two adjacent quotes still produce a (empty) literal between them
    fn push_empty_string(&mut self) {
        self.tokens.push(Token::new(TokenKind::String, ""));
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.input.len()
    }
}

/// Length of quoted content up to the next unescaped `quote` (or end of input)
fn quoted_content_len(rest: &str, quote: char) -> usize {
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            return i;
        }
        if c == '\\' {
            chars.next();
        }
    }
    rest.len()
}

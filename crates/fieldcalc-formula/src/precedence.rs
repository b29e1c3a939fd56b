//! Operator precedence normalization
//!
//! Two rewrites run before the tree is built:
//!
//! 1. [`fix_leading_operators`] turns every unary `+`/`-` into a binary
//!    operation against an inserted `0`.
//! 2. [`encode_precedence`] surrounds operators and commas with bracket
//!    tokens so that nesting depth alone decides which operands an operator
//!    binds. Tighter operators get fewer brackets around them, which leaves
//!    their operands nested deeper than the operands of looser ones.
//!
//! ```text
//! 1 + 2 * 3   =>   ( ( 1 ) + ( 2 * 3 ) )
//! ```

use crate::token::{Token, TokenKind};

/// Operator precedence groups, tightest binding first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PrecedenceGroup {
    /// `^`
    Power,
    /// `*` `/`
    Multiplicative,
    /// `+` `-`
    Additive,
    /// `<` `<=` `=` `==` `>=` `>`
    Comparison,
}

impl PrecedenceGroup {
    const ALL: [PrecedenceGroup; 4] = [
        PrecedenceGroup::Power,
        PrecedenceGroup::Multiplicative,
        PrecedenceGroup::Additive,
        PrecedenceGroup::Comparison,
    ];

    /// Group of an operator token value
    pub fn of(operator: &str) -> Option<Self> {
        match operator {
            "^" => Some(PrecedenceGroup::Power),
            "*" | "/" => Some(PrecedenceGroup::Multiplicative),
            "+" | "-" => Some(PrecedenceGroup::Additive),
            "<" | "<=" | "=" | "==" | ">=" | ">" => Some(PrecedenceGroup::Comparison),
            _ => None,
        }
    }
}

/// Insert `0` before every `+`/`-` that has no left operand
///
/// A sign has no left operand when it starts the formula or follows an
/// opening bracket, a comma or another operator.
pub fn fix_leading_operators(tokens: &[Token]) -> Vec<Token> {
    let mut fixed = Vec::with_capacity(tokens.len() + 1);
    let mut prev: Option<TokenKind> = None;

    for token in tokens {
        if token.kind == TokenKind::Operator && (token.value == "+" || token.value == "-") {
            let needs_zero = match prev {
                None => true,
                Some(kind) => matches!(
                    kind,
                    TokenKind::BracketStart | TokenKind::Comma | TokenKind::Operator
                ),
            };
            if needs_zero {
                fixed.push(Token::new(TokenKind::Number, "0"));
            }
        }
        if !token.is_whitespace() {
            prev = Some(token.kind);
        }
        fixed.push(token.clone());
    }

    fixed
}

/// Rewrite the token stream so bracket depth encodes operator precedence
///
/// Only the groups that actually occur are ranked, so `1 + 2` needs a single
/// level of brackets no matter how many groups exist. Commas rank loosest.
/// Source parentheses are inflated past every implicit level so they always
/// win over operator precedence.
///
/// Parentheses keep a depth of at least one even when nothing is ranked, so
/// `round(5)` stays a call with one argument and `(5)` parses to a group.
pub fn encode_precedence(tokens: &[Token]) -> Vec<Token> {
    let present: Vec<PrecedenceGroup> = PrecedenceGroup::ALL
        .into_iter()
        .filter(|group| {
            tokens.iter().any(|t| {
                t.kind == TokenKind::Operator && PrecedenceGroup::of(&t.value) == Some(*group)
            })
        })
        .collect();
    let has_comma = tokens.iter().any(|t| t.kind == TokenKind::Comma);
    let max_rank = present.len() + usize::from(has_comma);
    // Function calls rely on their parentheses surviving even without operators
    let paren_depth = max_rank.max(1);

    let rank_of = |operator: &str| {
        PrecedenceGroup::of(operator)
            .and_then(|group| present.iter().position(|g| *g == group))
            .unwrap_or(0)
    };

    let mut encoded = Vec::with_capacity(tokens.len() * 2 + max_rank * 2);
    push_brackets(&mut encoded, TokenKind::BracketStart, max_rank);

    for token in tokens {
        match token.kind {
            TokenKind::Operator => {
                surround_with_brackets(&mut encoded, token, rank_of(&token.value));
            }
            TokenKind::Comma => {
                surround_with_brackets(&mut encoded, token, present.len());
            }
            TokenKind::BracketStart | TokenKind::BracketEnd => {
                push_brackets(&mut encoded, token.kind, paren_depth);
            }
            _ => encoded.push(token.clone()),
        }
    }

    push_brackets(&mut encoded, TokenKind::BracketEnd, max_rank);
    encoded
}

/// Close `count` levels, emit the token, reopen `count` levels
fn surround_with_brackets(tokens: &mut Vec<Token>, token: &Token, count: usize) {
    push_brackets(tokens, TokenKind::BracketEnd, count);
    tokens.push(token.clone());
    push_brackets(tokens, TokenKind::BracketStart, count);
}

fn push_brackets(tokens: &mut Vec<Token>, kind: TokenKind, count: usize) {
    let value = if kind == TokenKind::BracketEnd { ")" } else { "(" };
    tokens.extend((0..count).map(|_| Token::new(kind, value)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::scan;
    use crate::token::join_tokens;
    use pretty_assertions::assert_eq;

    fn normalized(formula: &str) -> String {
        let tokens = encode_precedence(&fix_leading_operators(&scan(formula)));
        join_tokens(&tokens)
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect()
    }

    #[test]
    fn test_single_value_is_untouched() {
        assert_eq!(normalized("1"), "1");
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        assert_eq!(normalized("1 + 2 * 3"), "((1)+(2*3))");
    }

    #[test]
    fn test_leading_minus_before_call() {
        assert_eq!(
            normalized("-sin({f}*(5+{g}))"),
            "((0)-(sin(({f}*((5)+({g}))))))"
        );
        assert_eq!(normalized("-round(5.541, 2)"), "((0-round((5.541),(2))))");
    }

    #[test]
    fn test_source_parentheses_outrank_operators() {
        assert_eq!(
            normalized("({field} - round(5.5)) * 2 + -1"),
            "(((({field})-(round((5.5))))*2)+(-1))"
        );
    }

    #[test]
    fn test_comparison_is_loosest_operator() {
        assert_eq!(normalized("1 < 2 + 3"), "((1)<(2+3))");
        assert_eq!(normalized("1 == 2 + 3"), "((1)==(2+3))");
    }

    #[test]
    fn test_parentheses_survive_without_operators() {
        assert_eq!(normalized("round(5)"), "round(5)");
    }

    #[test]
    fn test_fix_leading_operators_positions() {
        let fixed = fix_leading_operators(&scan("- (+1, - {x})"));
        assert_eq!(join_tokens(&fixed), "0- (0+1, 0- {x})");

        let fixed = fix_leading_operators(&scan("2 * -{x}"));
        assert_eq!(join_tokens(&fixed), "2 * 0-{x}");

        // `*` is never a sign
        let fixed = fix_leading_operators(&scan("*2"));
        assert_eq!(join_tokens(&fixed), "*2");
    }
}

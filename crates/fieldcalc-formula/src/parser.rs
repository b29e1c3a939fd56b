//! Formula parser
//!
//! Builds the expression tree from a bracket-encoded token stream. There is no
//! operator priority table here: [`crate::precedence::encode_precedence`] has
//! already wrapped every operand in as many brackets as its binding strength
//! needs, so the builder only attaches each value to a pending operator and
//! recurses into bracketed spans.

use crate::precedence::{encode_precedence, fix_leading_operators};
use crate::scanner::scan;
use crate::token::{Token, TokenKind, TokenNode};

/// Token kinds that survive into the tree builder
const MEANINGFUL_KINDS: [TokenKind; 7] = [
    TokenKind::String,
    TokenKind::Number,
    TokenKind::ReferenceName,
    TokenKind::Operator,
    TokenKind::FunctionName,
    TokenKind::BracketStart,
    TokenKind::BracketEnd,
];

/// Parse a formula into an expression tree
///
/// Runs scan, leading-operator fix, precedence encoding and tree building.
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{parse, TokenKind};
///
/// let nodes = parse("1 + 2 * 3");
/// assert_eq!(nodes.len(), 1);
/// assert_eq!(nodes[0].kind, TokenKind::Group);
/// ```
pub fn parse(formula: &str) -> Vec<TokenNode> {
    let tokens = scan(formula);
    let encoded = encode_precedence(&fix_leading_operators(&tokens));
    let nodes = build_tree(&encoded);
    log::trace!("parsed {:?} into {} top-level nodes", formula, nodes.len());
    nodes
}

/// Build expression nodes from a token stream
///
/// Whitespace, commas, quote delimiters and reference brackets carry no
/// meaning for the tree and are dropped first.
pub fn build_tree(tokens: &[Token]) -> Vec<TokenNode> {
    let meaningful: Vec<&Token> = tokens
        .iter()
        .filter(|t| MEANINGFUL_KINDS.contains(&t.kind))
        .collect();
    build_nodes(&meaningful)
}

fn build_nodes(tokens: &[&Token]) -> Vec<TokenNode> {
    let mut nodes: Vec<TokenNode> = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];
        match token.kind {
            TokenKind::String | TokenKind::Number | TokenKind::ReferenceName => {
                attach_node(&mut nodes, TokenNode::from(token));
                i += 1;
            }
            TokenKind::Operator => {
                // The last finished node is the left operand
                let left: Vec<TokenNode> = nodes.pop().into_iter().collect();
                nodes.push(TokenNode::with_children(
                    TokenKind::Operator,
                    token.value.clone(),
                    left,
                ));
                i += 1;
            }
            TokenKind::FunctionName => {
                let opens_call = tokens
                    .get(i + 1)
                    .map_or(false, |next| next.kind == TokenKind::BracketStart);
                if opens_call {
                    let end = matching_bracket_end(tokens, i + 1);
                    let arguments = build_nodes(&tokens[i + 2..end]);
                    attach_node(
                        &mut nodes,
                        TokenNode::with_children(
                            TokenKind::FunctionName,
                            token.value.clone(),
                            arguments,
                        ),
                    );
                    i = end + 1;
                } else {
                    attach_node(&mut nodes, TokenNode::from(token));
                    i += 1;
                }
            }
            TokenKind::BracketStart => {
                let end = matching_bracket_end(tokens, i);
                attach_node(&mut nodes, TokenNode::group(build_nodes(&tokens[i + 1..end])));
                i = end + 1;
            }
            _ => i += 1,
        }
    }

    nodes
}

/// Attach a finished node to a pending operator, or append it
fn attach_node(nodes: &mut Vec<TokenNode>, node: TokenNode) {
    match nodes.last_mut() {
        Some(last) if last.kind == TokenKind::Operator && last.inner_nodes.len() < 2 => {
            last.inner_nodes.push(node);
        }
        _ => nodes.push(node),
    }
}

/// Index of the bracket closing the one at `start`, or `tokens.len()` if unclosed
fn matching_bracket_end(tokens: &[&Token], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        match token.kind {
            TokenKind::BracketStart => depth += 1,
            TokenKind::BracketEnd => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return start + offset;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn leaf(kind: TokenKind, value: &str) -> TokenNode {
        TokenNode::leaf(kind, value)
    }

    fn num(value: &str) -> TokenNode {
        leaf(TokenKind::Number, value)
    }

    fn op(value: &str, children: Vec<TokenNode>) -> TokenNode {
        TokenNode::with_children(TokenKind::Operator, value, children)
    }

    fn call(name: &str, args: Vec<TokenNode>) -> TokenNode {
        TokenNode::with_children(TokenKind::FunctionName, name, args)
    }

    /// Tree built straight from scanned tokens, without precedence encoding
    fn raw_tree(formula: &str) -> Vec<TokenNode> {
        build_tree(&fix_leading_operators(&scan(formula)))
    }

    #[test]
    fn test_build_left_to_right_without_precedence() {
        assert_eq!(
            raw_tree("2*3+1"),
            vec![op("+", vec![op("*", vec![num("2"), num("3")]), num("1")])]
        );
    }

    #[test]
    fn test_build_function_and_reference() {
        assert_eq!(
            raw_tree("round(5.5, 2)  - {field}"),
            vec![op(
                "-",
                vec![
                    call("round", vec![num("5.5"), num("2")]),
                    leaf(TokenKind::ReferenceName, "field"),
                ]
            )]
        );
    }

    #[test]
    fn test_build_leading_minus_and_group() {
        assert_eq!(
            raw_tree("-sin({f}*(5+{g}))"),
            vec![op(
                "-",
                vec![
                    num("0"),
                    call(
                        "sin",
                        vec![op(
                            "*",
                            vec![
                                leaf(TokenKind::ReferenceName, "f"),
                                TokenNode::group(vec![op(
                                    "+",
                                    vec![num("5"), leaf(TokenKind::ReferenceName, "g")]
                                )]),
                            ]
                        )]
                    ),
                ]
            )]
        );
    }

    #[test]
    fn test_build_call_arguments_split_by_operators_only() {
        assert_eq!(
            raw_tree("if({n:1}<5,1,2)"),
            vec![call(
                "if",
                vec![
                    op("<", vec![leaf(TokenKind::ReferenceName, "n:1"), num("5")]),
                    num("1"),
                    num("2"),
                ]
            )]
        );
        assert_eq!(raw_tree("if (1<2,3,4)"), raw_tree("if(1<2,3,4)"));
    }

    #[test]
    fn test_build_nested_group_in_call() {
        assert_eq!(
            raw_tree("round((5))"),
            vec![call("round", vec![TokenNode::group(vec![num("5")])])]
        );
    }

    #[test]
    fn test_build_keeps_empty_literals() {
        assert_eq!(
            raw_tree("concatenate('', \"a\")"),
            vec![call(
                "concatenate",
                vec![leaf(TokenKind::String, ""), leaf(TokenKind::String, "a")]
            )]
        );
    }

    #[test]
    fn test_build_unclosed_bracket_takes_rest() {
        assert_eq!(
            raw_tree("(1 + 2"),
            vec![TokenNode::group(vec![op("+", vec![num("1"), num("2")])])]
        );
    }

    #[test]
    fn test_parse_respects_precedence() {
        // ((1) + (2 * 3))
        assert_eq!(
            parse("1 + 2 * 3"),
            vec![TokenNode::group(vec![op(
                "+",
                vec![
                    TokenNode::group(vec![num("1")]),
                    TokenNode::group(vec![op("*", vec![num("2"), num("3")])]),
                ]
            )])]
        );
    }

    #[test]
    fn test_parse_call_arguments() {
        let nodes = parse("max(1 + 2, 3)");
        let max = &nodes[0].inner_nodes[0].inner_nodes[0];
        assert_eq!(max.kind, TokenKind::FunctionName);
        assert_eq!(max.inner_nodes.len(), 2);
    }

    #[test]
    fn test_parse_call_without_operators() {
        assert_eq!(parse("round(5)"), vec![call("round", vec![num("5")])]);
        assert_eq!(parse("(5)"), vec![TokenNode::group(vec![num("5")])]);
    }
}

//! Formula evaluator
//!
//! Walks an expression tree and produces the formula's text value. Values are
//! strings throughout; numeric functions parse and print them as needed.
//! Reference values come from a caller-supplied callback.

use crate::functions::{execute_function, execute_operator};
use crate::parser::parse;
use crate::token::{TokenKind, TokenNode};

/// Evaluate top-level nodes, concatenating their values
///
/// `resolve_reference` receives each reference name exactly as written
/// between the braces.
///
/// # Example
/// ```rust
/// use fieldcalc_formula::{evaluate, parse};
///
/// let nodes = parse("round({price} * 1.2, 2)");
/// let value = evaluate(&nodes, |name| match name {
///     "price" => "9.99".to_string(),
///     _ => String::new(),
/// });
/// assert_eq!(value, "11.99");
/// ```
pub fn evaluate<F>(nodes: &[TokenNode], resolve_reference: F) -> String
where
    F: Fn(&str) -> String,
{
    nodes
        .iter()
        .map(|node| evaluate_node(node, &resolve_reference))
        .collect()
}

/// Parse and evaluate formula text in one step
pub fn evaluate_formula<F>(formula: &str, resolve_reference: F) -> String
where
    F: Fn(&str) -> String,
{
    evaluate(&parse(formula), resolve_reference)
}

fn evaluate_node<F>(node: &TokenNode, resolve_reference: &F) -> String
where
    F: Fn(&str) -> String,
{
    match node.kind {
        TokenKind::Operator => {
            let args = evaluate_children(node, resolve_reference);
            execute_operator(&node.value, &args)
        }
        TokenKind::FunctionName => {
            let args = evaluate_children(node, resolve_reference);
            execute_function(&node.value, &args)
        }
        TokenKind::ReferenceName => resolve_reference(&node.value),
        TokenKind::String | TokenKind::Number => node.value.clone(),
        TokenKind::Group => evaluate_children(node, resolve_reference).concat(),
        _ => String::new(),
    }
}

fn evaluate_children<F>(node: &TokenNode, resolve_reference: &F) -> Vec<String>
where
    F: Fn(&str) -> String,
{
    node.inner_nodes
        .iter()
        .map(|child| evaluate_node(child, resolve_reference))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `{n:5}` and `{s:text}` resolve to the text after the prefix
    fn prefixed(name: &str) -> String {
        name.strip_prefix("n:")
            .or_else(|| name.strip_prefix("s:"))
            .unwrap_or("")
            .to_string()
    }

    fn eval(formula: &str) -> String {
        evaluate_formula(formula, prefixed)
    }

    #[test]
    fn test_evaluate_juxtaposed_strings_concatenate() {
        assert_eq!(eval("'asd' & 'qwe' & 'dfg'"), "asdqwedfg");
        assert_eq!(eval("\"asd\" & \"qwe\" & {s:dfg}"), "asdqwedfg");
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1 + 1"), "2");
        assert_eq!(eval("1 + 2 * 3"), "7");
        assert_eq!(eval("(1 + 2) * 3"), "9");
        assert_eq!(eval("-2 * 3"), "-6");
        assert_eq!(eval("2 ^ 3 ^ 2"), "64");
        assert_eq!(eval("10 - 2 - 3"), "5");
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("1 >= 2"), "0");
        assert_eq!(eval("1 <= 2"), "1");
        assert_eq!(eval("{n:1}>2"), "0");
        assert_eq!(eval("2 == 2"), "1");
    }

    #[test]
    fn test_evaluate_functions_with_references() {
        assert_eq!(eval("round(5.555, 1)"), "5.6");
        assert_eq!(eval("{n:12} / {n:4} + 51 / (16 + 1)"), "6");
        assert_eq!(eval("{n:12} / {n:4} + round(54 / (16 + 1), 1)"), "6.2");
    }

    #[test]
    fn test_evaluate_if() {
        assert_eq!(eval("if(1,2,3)"), "2");
        assert_eq!(eval("if(1 < 2, 564, 425)"), "564");
        assert_eq!(eval("if({n:1}<5,1,2)"), "1");
        assert_eq!(eval("if(1<2,1,2)"), "1");
        assert_eq!(eval("if (1<2,1,2)"), "1");
        assert_eq!(
            eval("if(2^3 < 3^{n:2}, \"here\", \"there\") & ' wor\"ld'"),
            "here wor\"ld"
        );
    }

    #[test]
    fn test_evaluate_decimal_math() {
        assert_eq!(
            eval("if(0.1 < 0.3, \"correct math\", \"incorrect math\")"),
            "correct math"
        );
        assert_eq!(
            eval("if(0.1 + 0.2 = 0.3, \"correct math\", \"incorrect math\")"),
            "correct math"
        );
    }

    #[test]
    fn test_evaluate_nested_calls() {
        assert_eq!(
            eval("uppercase(if(max({n:5} ^ 2 - 3, 20, {n:17}, 30 / 4) < 16, \"here\", \"there\"))"),
            "THERE"
        );
    }

    #[test]
    fn test_evaluate_best_effort_results() {
        assert_eq!(eval("min(1, \"asd\")"), "NaN");
        assert_eq!(eval("sin(1)"), "");
        assert_eq!(eval("{unknown} + 1"), "1");
        assert_eq!(eval(""), "");
        // A signed literal after a quote is juxtaposed, not subtracted
        assert_eq!(eval("'5' -1"), "5-1");
        assert_eq!(eval("'5' - 1"), "4");
    }

    #[test]
    fn test_resolver_receives_raw_name() {
        let value = evaluate_formula("{Price} & {price}", |name| format!("[{name}]"));
        assert_eq!(value, "[Price][price]");
    }
}

//! Comparison and conditional functions

use super::number::parse_number;
use std::cmp::Ordering;

/// Comparison operand: numeric text compares as a number, anything else as text
#[derive(Debug, Clone, Copy, PartialEq)]
enum Operand<'a> {
    Number(f64),
    Text(&'a str),
}

impl<'a> Operand<'a> {
    fn from_arg(value: &'a str) -> Self {
        let n = parse_number(value);
        if n.is_nan() {
            Operand::Text(value)
        } else {
            Operand::Number(n)
        }
    }

    /// Ordering of two operands of the same type; numbers and text never order
    fn compare_to(self, other: Operand<'_>) -> Option<Ordering> {
        match (self, other) {
            (Operand::Number(a), Operand::Number(b)) => a.partial_cmp(&b),
            // Text orders by UTF-16 code units
            (Operand::Text(a), Operand::Text(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
            _ => None,
        }
    }
}

/// Compare the first two arguments; `"1"` when `accept` holds, else `"0"`
fn compare(args: &[String], accept: fn(Ordering) -> bool) -> String {
    let (Some(left), Some(right)) = (args.first(), args.get(1)) else {
        return "0".to_string();
    };
    let ordering = Operand::from_arg(left).compare_to(Operand::from_arg(right));
    let result = if ordering.map_or(false, accept) { "1" } else { "0" };
    result.to_string()
}

/// LT(a, b)
pub fn fn_lt(args: &[String]) -> String {
    compare(args, Ordering::is_lt)
}

/// LTE(a, b)
pub fn fn_lte(args: &[String]) -> String {
    compare(args, Ordering::is_le)
}

/// EQ(a, b)
pub fn fn_eq(args: &[String]) -> String {
    compare(args, Ordering::is_eq)
}

/// GTE(a, b)
pub fn fn_gte(args: &[String]) -> String {
    compare(args, Ordering::is_ge)
}

/// GT(a, b)
pub fn fn_gt(args: &[String]) -> String {
    compare(args, Ordering::is_gt)
}

/// IF(condition, then, else?)
///
/// The condition is false only for `""` and `"0"`.
pub fn fn_if(args: &[String]) -> String {
    if args.len() < 2 {
        return String::new();
    }
    if args[0].is_empty() || args[0] == "0" {
        args.get(2).cloned().unwrap_or_default()
    } else {
        args[1].clone()
    }
}

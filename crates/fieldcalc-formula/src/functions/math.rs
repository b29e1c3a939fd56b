//! Math functions

use super::number::{
    digits_param, format_number, param_as_boolean, parse_number, power, strip_trailing_zeros,
    to_fixed, to_number_string,
};

const NAN: &str = "NaN";

/// ROUND(value, digits?, keepZeros?)
///
/// Rounds half away from zero; a tiny epsilon is added first so `1.555`
/// rounds to `1.56` despite its binary representation.
pub fn fn_round(args: &[String]) -> String {
    let Some(value) = args.first() else {
        return NAN.to_string();
    };
    let digits = digits_param(args.get(1).map(String::as_str));
    let out = to_fixed(f64::EPSILON + parse_number(value), digits as i64);
    finish_rounding(out, args)
}

/// CEIL(value, digits?, keepZeros?)
pub fn fn_ceil(args: &[String]) -> String {
    scaled_rounding(args, f64::ceil)
}

/// FLOOR(value, digits?, keepZeros?)
pub fn fn_floor(args: &[String]) -> String {
    scaled_rounding(args, f64::floor)
}

fn scaled_rounding(args: &[String], round: fn(f64) -> f64) -> String {
    let Some(value) = args.first() else {
        return NAN.to_string();
    };
    let value = parse_number(value);
    let digits = digits_param(args.get(1).map(String::as_str));
    let scale = power(10.0, digits);
    let out = to_fixed(round(value * scale) / scale, digits as i64);
    finish_rounding(out, args)
}

fn finish_rounding(out: String, args: &[String]) -> String {
    if param_as_boolean(args.get(2).map(String::as_str)) {
        out
    } else {
        strip_trailing_zeros(out)
    }
}

/// ADD(values...): sum, `0` for no arguments
pub fn fn_add(args: &[String]) -> String {
    fold_numbers(args, "0", |acc, n| acc + n)
}

/// MULTIPLY(values...): product, `1` for no arguments
pub fn fn_multiply(args: &[String]) -> String {
    fold_numbers(args, "1", |acc, n| acc * n)
}

fn fold_numbers(args: &[String], initial: &str, op: fn(f64, f64) -> f64) -> String {
    args.iter().fold(initial.to_string(), |acc, arg| {
        let (acc, n) = (parse_number(&acc), parse_number(arg));
        if acc.is_nan() || n.is_nan() {
            NAN.to_string()
        } else {
            to_number_string(op(acc, n))
        }
    })
}

/// SUBTRACT(first, rest...): first minus the sum of the rest
pub fn fn_subtract(args: &[String]) -> String {
    let Some((first, rest)) = args.split_first() else {
        return NAN.to_string();
    };
    let first = parse_number(first);
    let rest = parse_number(&fn_add(rest));
    if first.is_nan() || rest.is_nan() {
        return NAN.to_string();
    }
    to_number_string(first - rest)
}

/// DIVIDE(first, rest...): first divided by the product of the rest
pub fn fn_divide(args: &[String]) -> String {
    let Some((first, rest)) = args.split_first() else {
        return NAN.to_string();
    };
    let first = parse_number(first);
    let divisor = parse_number(&fn_multiply(rest));
    if first.is_nan() || divisor.is_nan() || divisor == 0.0 {
        return NAN.to_string();
    }
    to_number_string(first / divisor)
}

/// POW(base, exponent): missing or empty operands count as `0`
pub fn fn_pow(args: &[String]) -> String {
    // An empty operand already parses as 0
    let operand = |i: usize| args.get(i).map_or(0.0, |s| parse_number(s));
    let (base, exponent) = (operand(0), operand(1));
    if base.is_nan() || exponent.is_nan() {
        return NAN.to_string();
    }
    to_number_string(power(base, exponent))
}

/// MAX(values...)
pub fn fn_max(args: &[String]) -> String {
    extreme(args, f64::max)
}

/// MIN(values...)
pub fn fn_min(args: &[String]) -> String {
    extreme(args, f64::min)
}

/// Results are printed as-is, without the 10-digit normalisation
fn extreme(args: &[String], pick: fn(f64, f64) -> f64) -> String {
    let Some(first) = args.first() else {
        return NAN.to_string();
    };
    args.iter().fold(first.clone(), |acc, arg| {
        let (acc, n) = (parse_number(&acc), parse_number(arg));
        if acc.is_nan() || n.is_nan() {
            NAN.to_string()
        } else {
            format_number(pick(acc, n))
        }
    })
}

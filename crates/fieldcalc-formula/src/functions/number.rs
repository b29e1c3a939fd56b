//! Number <-> string conversions shared by the built-in functions
//!
//! Every formula value is a string. Numeric functions parse their arguments
//! with [`parse_number`], compute in `f64` and print results with
//! [`format_number`] or [`to_fixed`]. Both follow the usual browser number
//! rules, so formulas produce the same text a web frontend would show.

use lazy_regex::regex_is_match;

/// Parse a formula value as a number, `NaN` if it is not numeric
///
/// Surrounding whitespace is ignored and an empty string is `0`. Accepts
/// decimal literals with optional sign and exponent, `Infinity`, and unsigned
/// `0x`/`0o`/`0b` integers.
pub fn parse_number(value: &str) -> f64 {
    let s = value.trim();
    if s.is_empty() {
        return 0.0;
    }

    match s {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    if let Some(radix) = radix_prefix(s) {
        return parse_radix_integer(&s[2..], radix);
    }

    if regex_is_match!(r"^[+-]?(?:[0-9]+\.?[0-9]*|\.[0-9]+)(?:[eE][+-]?[0-9]+)?$", s) {
        s.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}

fn radix_prefix(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    if bytes.len() < 3 || bytes[0] != b'0' {
        return None;
    }
    match bytes[1] {
        b'x' | b'X' => Some(16),
        b'o' | b'O' => Some(8),
        b'b' | b'B' => Some(2),
        _ => None,
    }
}

fn parse_radix_integer(digits: &str, radix: u32) -> f64 {
    if !digits.chars().all(|c| c.is_digit(radix)) {
        return f64::NAN;
    }
    match u64::from_str_radix(digits, radix) {
        Ok(n) => n as f64,
        // Too wide for u64: accumulate in floating point
        Err(_) => digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d)),
    }
}

/// Print a number the way a browser prints it
///
/// Shortest round-trip digits, plain notation for magnitudes in
/// `[1e-6, 1e21)`, exponent notation otherwise (`1e+21`, `1.5e-7`).
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }

    let sign = if n < 0.0 { "-" } else { "" };

    // `{:e}` yields the shortest round-trip digits as `d.ddde<exp>`
    let exp_form = format!("{:e}", n.abs());
    let (mantissa, exponent) = exp_form.split_once('e').unwrap_or((exp_form.as_str(), "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let k = digits.len() as i32;
    // Position of the decimal point relative to the first digit
    let point = exponent + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int_part, frac_part) = digits.split_at(point as usize);
        format!("{}.{}", int_part, frac_part)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 >= 0 { "+" } else { "-" };
        let (first, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", first, exp_sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", first, rest, exp_sign, (point - 1).abs())
        }
    };

    format!("{}{}", sign, body)
}

/// Format with a fixed number of fractional digits
///
/// Rounds the exact binary value half away from zero. `digits` is clamped to
/// `0..=100`; non-finite values and magnitudes of `1e21` or more fall back to
/// [`format_number`].
pub fn to_fixed(n: f64, digits: i64) -> String {
    let digits = digits.clamp(0, 100) as usize;
    if !n.is_finite() || n.abs() >= 1e21 {
        return format_number(n);
    }

    // 1074 fractional digits represent every finite f64 exactly
    let exact = format!("{:.1074}", n.abs());
    let (int_part, frac_part) = exact.split_once('.').unwrap_or((exact.as_str(), ""));

    let mut kept: Vec<u8> = int_part.bytes().collect();
    let frac = frac_part.as_bytes();
    kept.extend((0..digits).map(|i| frac.get(i).copied().unwrap_or(b'0')));

    if frac.get(digits).map_or(false, |d| *d >= b'5') {
        increment_decimal(&mut kept);
    }

    let int_len = kept.len() - digits;
    let mut out = String::with_capacity(kept.len() + 2);
    if n < 0.0 {
        out.push('-');
    }
    out.push_str(&String::from_utf8_lossy(&kept[..int_len]));
    if digits > 0 {
        out.push('.');
        out.push_str(&String::from_utf8_lossy(&kept[int_len..]));
    }
    out
}

/// Add one unit in the last place to a string of ASCII digits
fn increment_decimal(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d == b'9' {
            *d = b'0';
        } else {
            *d += 1;
            return;
        }
    }
    digits.insert(0, b'1');
}

/// Normalise an arithmetic result to at most 10 fractional digits
///
/// Hides binary representation noise: `0.1 + 0.2` prints as `0.3`.
pub fn to_number_string(n: f64) -> String {
    format_number(parse_number(&to_fixed(n, 10)))
}

/// Integer digit count from a formula argument (`NaN` and missing count as 0)
pub fn digits_param(value: Option<&str>) -> f64 {
    let n = value.map_or(f64::NAN, parse_number);
    if n.is_nan() {
        0.0
    } else {
        n
    }
}

/// Whether an optional flag argument is set
///
/// Unset when missing, empty, `0`, `false` or `no` (case-insensitive).
pub fn param_as_boolean(value: Option<&str>) -> bool {
    let value = value.unwrap_or("").to_lowercase();
    !matches!(value.as_str(), "" | "0" | "false" | "no")
}

/// Remove trailing fractional zeros and a dangling decimal point
pub fn strip_trailing_zeros(value: String) -> String {
    if !value.contains('.') {
        return value;
    }
    value.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `Math.pow` semantics: `1 ** ±Infinity` and anything to a `NaN` power are `NaN`
pub fn power(base: f64, exponent: f64) -> f64 {
    if exponent.is_nan() || (base.abs() == 1.0 && exponent.is_infinite()) {
        return f64::NAN;
    }
    base.powf(exponent)
}

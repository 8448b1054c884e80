//! The shared read-only matcher: compiled pattern, category bits, and the
//! optional numeric value query.
//!
//! # Invariants
//! - A `Matcher` is built once before the pool starts and is `Sync`; workers
//!   only call `&self` methods.
//! - Value matching parses token text under the query's declared type: an
//!   integer query never equals a float-only literal spelling and vice versa.

use crate::config::CategorySet;
use regex::bytes::Regex;
use std::fmt;

/// A numeric operand interpreted as a value rather than a regex.
///
/// The query text `-255` carries `negative: true`, magnitude 255. Number
/// tokens never carry a sign, so negative queries match nothing until the
/// lexer learns signed literals; the comparison is kept for that day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ValueQuery {
    Int { negative: bool, magnitude: u64 },
    Float { negative: bool, magnitude: f64 },
}

/// Why a value query text was rejected.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BadValueQuery(pub String);

impl fmt::Display for BadValueQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "value query {:?} is not a number", self.0)
    }
}

impl std::error::Error for BadValueQuery {}

impl ValueQuery {
    /// Parse a query: optional `-`, then integer syntax in any base, then
    /// float syntax as the fallback.
    pub fn parse(text: &str) -> Result<Self, BadValueQuery> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if let Some(magnitude) = parse_int_literal(digits) {
            return Ok(ValueQuery::Int {
                negative,
                magnitude,
            });
        }
        if let Some(magnitude) = parse_float_literal(digits) {
            return Ok(ValueQuery::Float {
                negative,
                magnitude,
            });
        }
        Err(BadValueQuery(text.to_string()))
    }

    /// Does a number token's text denote this query's value?
    pub fn matches(&self, token_text: &[u8]) -> bool {
        let Ok(text) = std::str::from_utf8(token_text) else {
            return false;
        };
        let (neg, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        match *self {
            ValueQuery::Int {
                negative,
                magnitude,
            } => parse_int_literal(digits) == Some(magnitude) && neg == negative,
            ValueQuery::Float {
                negative,
                magnitude,
            } => parse_float_literal(digits) == Some(magnitude) && neg == negative,
        }
    }
}

/// Shared matcher state for one run.
pub struct Matcher {
    pub regex: Regex,
    pub cats: CategorySet,
    pub value: Option<ValueQuery>,
}

impl Matcher {
    pub fn new(regex: Regex, cats: CategorySet, value: Option<ValueQuery>) -> Self {
        Self { regex, cats, value }
    }

    #[inline]
    pub fn is_match(&self, hay: &[u8]) -> bool {
        self.regex.is_match(hay)
    }
}

/// Well-formed digit separators: no leading/trailing `_`, no doubled `_`.
fn underscores_ok(s: &str) -> bool {
    !s.starts_with('_') && !s.ends_with('_') && !s.contains("__")
}

/// Parse an unsigned integer literal under the language's base rules:
/// `0b`/`0B` binary, `0o`/`0O` octal, `0x`/`0X` hex, leading-zero legacy
/// octal, decimal otherwise. Digit separators are permitted between digits.
pub fn parse_int_literal(text: &str) -> Option<u64> {
    if text.is_empty() || !underscores_ok(text) {
        return None;
    }
    let plain;
    let stripped: &str = if text.contains('_') {
        plain = text.replace('_', "");
        &plain
    } else {
        text
    };

    let bytes = stripped.as_bytes();
    let (radix, digits) = if bytes.len() >= 2 && bytes[0] == b'0' {
        match bytes[1] {
            b'b' | b'B' => (2, &stripped[2..]),
            b'o' | b'O' => (8, &stripped[2..]),
            b'x' | b'X' => (16, &stripped[2..]),
            _ => (8, &stripped[1..]),
        }
    } else {
        (10, stripped)
    };
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, radix).ok()
}

/// Parse a floating literal: ordinary decimal floats via the standard
/// parser, hex mantissa floats (`0x1.fp3`) by hand.
pub fn parse_float_literal(text: &str) -> Option<f64> {
    if text.is_empty() || !underscores_ok(text) {
        return None;
    }
    let plain;
    let stripped: &str = if text.contains('_') {
        plain = text.replace('_', "");
        &plain
    } else {
        text
    };

    if let Some(hex) = stripped
        .strip_prefix("0x")
        .or_else(|| stripped.strip_prefix("0X"))
    {
        return parse_hex_float(hex);
    }
    // Reject forms the standard parser accepts but the language does not
    // ("inf", "NaN", leading "+").
    if !stripped.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    stripped.parse::<f64>().ok()
}

/// `mantissa p exponent` with a hex mantissa and a mandatory power-of-two
/// exponent, per the language's hex float grammar.
fn parse_hex_float(s: &str) -> Option<f64> {
    let p = s.find(['p', 'P'])?;
    let (mantissa, exp_text) = (&s[..p], &s[p + 1..]);
    let exp: i32 = exp_text.parse().ok()?;

    let (int_part, frac_part) = match mantissa.find('.') {
        Some(dot) => (&mantissa[..dot], &mantissa[dot + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut value = 0f64;
    for d in int_part.bytes() {
        value = value * 16.0 + (d as char).to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for d in frac_part.bytes() {
        value += (d as char).to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exp))
}

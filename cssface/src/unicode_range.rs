//! Parsing of `unicode-range` values.
//!
//! See <https://www.w3.org/TR/css-fonts-4/#unicode-range-desc>

use std::{
    collections::BTreeSet,
    fmt::{self, Display},
    ops::RangeInclusive,
};

use log::debug;

/// The largest Unicode code point
pub const MAX_CODE_POINT: u32 = 0x10FFFF;

// U+ is followed by at most six hex digits (or '?'s)
const MAX_DIGITS: usize = 6;

/// An inclusive interval of code points, `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CodePointRange {
    start: u32,
    end: u32,
}

impl CodePointRange {
    /// None if `start > end`
    pub fn new(start: u32, end: u32) -> Option<CodePointRange> {
        (start <= end).then_some(CodePointRange { start, end })
    }

    pub fn single(code_point: u32) -> CodePointRange {
        CodePointRange {
            start: code_point,
            end: code_point,
        }
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    /// The last code point in the range, not one past it.
    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn contains(&self, code_point: u32) -> bool {
        (self.start..=self.end).contains(&code_point)
    }

    /// The number of code points covered, never zero.
    pub fn count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn code_points(&self) -> RangeInclusive<u32> {
        self.start..=self.end
    }

    /// Parse a single `unicode-range` token, such as `U+0025-00FF` or `U+4??`.
    ///
    /// Ranges reaching past [`MAX_CODE_POINT`] are clamped; ranges starting past it
    /// are rejected.
    pub fn parse(token: &str) -> Option<CodePointRange> {
        let body = token
            .strip_prefix("U+")
            .or_else(|| token.strip_prefix("u+"))?;

        if let Some((start, end)) = body.split_once('-') {
            return Self::clamped(parse_hex(start)?, parse_hex(end)?);
        }

        if body.contains('?') {
            if body.len() > MAX_DIGITS
                || !body.bytes().all(|b| b == b'?' || b.is_ascii_hexdigit())
            {
                return None;
            }
            let start = u32::from_str_radix(&body.replace('?', "0"), 16).ok()?;
            let end = u32::from_str_radix(&body.replace('?', "F"), 16).ok()?;
            return Self::clamped(start, end);
        }

        let code_point = parse_hex(body)?;
        Self::clamped(code_point, code_point)
    }

    fn clamped(start: u32, end: u32) -> Option<CodePointRange> {
        if start > MAX_CODE_POINT {
            return None;
        }
        Self::new(start, end.min(MAX_CODE_POINT))
    }
}

impl Display for CodePointRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "U+{:04X}", self.start)
        } else {
            write!(f, "U+{:04X}-{:04X}", self.start, self.end)
        }
    }
}

fn parse_hex(digits: &str) -> Option<u32> {
    if digits.is_empty()
        || digits.len() > MAX_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Parse a whole `unicode-range` value, such as `U+0000-00FF, U+0131`.
///
/// Tokens that don't parse are dropped; the rest are returned in order.
pub fn parse_unicode_range(value: &str) -> Vec<CodePointRange> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let range = CodePointRange::parse(token);
            if range.is_none() {
                debug!("Dropping malformed unicode-range token '{token}'");
            }
            range
        })
        .collect()
}

/// Every code point covered by any of the ranges, ends included.
pub fn expand(ranges: &[CodePointRange]) -> BTreeSet<u32> {
    ranges.iter().flat_map(CodePointRange::code_points).collect()
}

/// The smallest list of ranges covering exactly the given code points.
pub fn compress(code_points: &BTreeSet<u32>) -> Vec<CodePointRange> {
    let mut ranges: Vec<CodePointRange> = Vec::new();
    for &cp in code_points {
        match ranges.last_mut() {
            Some(last) if last.end + 1 == cp => last.end = cp,
            _ => ranges.push(CodePointRange::single(cp)),
        }
    }
    ranges
}

/// Render code points as a `unicode-range` value, such as `U+0030-0039,U+0041`.
pub fn to_css(code_points: &BTreeSet<u32>) -> String {
    compress(code_points)
        .iter()
        .map(CodePointRange::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

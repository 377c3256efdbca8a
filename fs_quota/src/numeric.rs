//
// Parsing of numeric command line values.
//
use std::fmt;
use std::num::IntErrorKind;

/// Which half of a `soft:hard` pair failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    First,
    Second,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    NotNumeric(String),
    Overflow(String),
    MissingDelimiter(String),
    Field { side: PairSide, value: String },
    FieldOverflow { side: PairSide, value: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::NotNumeric(s) => write!(f, "{} is not a numeric value", s),
            ParseError::Overflow(s) => write!(f, "{} is too large", s),
            ParseError::MissingDelimiter(_) => f.write_str("Missing deliminator ':'"),
            ParseError::Field { value, .. } => write!(f, "{} is not a numeric value", value),
            ParseError::FieldOverflow { value, .. } => write!(f, "{} is too large", value),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse an unsigned 32 bit number.
///
/// The base follows the C convention: `0x` is hexadecimal, a leading `0`
/// is octal, anything else decimal. On top of that `0b` means binary.
/// Surrounding whitespace is ignored, anything else that is not a digit
/// in the chosen base makes the whole value invalid.
pub fn parse_number(input: &str) -> Result<u32, ParseError> {
    let s = input.trim();
    let bad = || ParseError::NotNumeric(input.to_string());

    // strtoul skips whitespace again after the 0b we strip off ourselves.
    let (digits, radix) = if let Some(rest) = strip_prefix2(s, "0b") {
        (rest.trim_start(), 2)
    } else if let Some(rest) = strip_prefix2(s, "0x") {
        (rest, 16)
    } else if s.len() > 1 && s.starts_with('0') {
        (&s[1..], 8)
    } else {
        (s, 10)
    };

    // from_str_radix also takes a leading '+', we don't.
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(bad());
    }
    u32::from_str_radix(digits, radix).map_err(|e| {
        match e.kind() {
            IntErrorKind::PosOverflow => ParseError::Overflow(input.to_string()),
            _ => bad(),
        }
    })
}

// case-insensitive version of str::strip_prefix for 2-character ASCII prefixes.
fn strip_prefix2<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    match s.get(..2) {
        Some(p) if p.eq_ignore_ascii_case(prefix) => Some(&s[2..]),
        _ => None,
    }
}

/// Parse a `first:second` pair of numbers, split on the first `:`.
pub fn parse_pair(input: &str) -> Result<(u32, u32), ParseError> {
    let idx = match input.find(':') {
        Some(idx) => idx,
        None => return Err(ParseError::MissingDelimiter(input.to_string())),
    };
    let (first, second) = (&input[..idx], &input[idx + 1..]);

    let field = |side, value: &str| {
        parse_number(value).map_err(|e| {
            match e {
                ParseError::Overflow(_) => ParseError::FieldOverflow { side, value: value.to_string() },
                _ => ParseError::Field { side, value: value.to_string() },
            }
        })
    };
    Ok((field(PairSide::First, first)?, field(PairSide::Second, second)?))
}

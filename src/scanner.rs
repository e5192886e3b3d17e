//! Literal and identifier scanning over a line buffer.
//!
//! These are cursor-style scanners: each takes the line bytes and a mutable
//! byte offset, consumes what it recognizes, and leaves the cursor unmoved
//! when nothing matches.
//!
//! Numeric literals come in three shapes:
//!
//! | Input            | Value                         |
//! |------------------|-------------------------------|
//! | `42`, `3.14`, `.5` | decimal, optional `E` exponent |
//! | `&FF`            | hexadecimal                   |
//! | `%1010`          | binary                        |

// ---------------------------------------------------------------------------
// Numeric literals
// ---------------------------------------------------------------------------

/// Consume a numeric literal at the cursor, if one is present.
pub fn parse_numeric(line: &[u8], column: &mut usize) -> Option<f64> {
    match line.get(*column) {
        Some(b'&') => parse_radix(line, column, 16),
        Some(b'%') => parse_radix(line, column, 2),
        Some(b'0'..=b'9' | b'.') => parse_decimal(line, column),
        _ => None,
    }
}

/// Consume a prefixed radix literal (`&` hex, `%` binary). The prefix byte
/// is at the cursor; at least one digit must follow or nothing is consumed.
fn parse_radix(line: &[u8], column: &mut usize, radix: u32) -> Option<f64> {
    let mut pos = *column + 1;
    let mut value = 0.0_f64;
    let mut digit_count = 0;
    while let Some(&byte) = line.get(pos) {
        let Some(digit) = char::from(byte).to_digit(radix) else {
            break;
        };
        value = value * f64::from(radix) + f64::from(digit);
        digit_count += 1;
        pos += 1;
    }
    if digit_count == 0 {
        return None;
    }
    *column = pos;
    Some(value)
}

/// Consume a decimal literal: digits, an optional fraction (the `.` only
/// counts when a digit follows it), and an optional `E` exponent (only when
/// a digit follows the `E` and its optional sign, so `2EOR3` still lexes as
/// `2` then the word operator).
fn parse_decimal(line: &[u8], column: &mut usize) -> Option<f64> {
    let start = *column;
    let mut pos = start;
    while line.get(pos).is_some_and(|&c| c.is_ascii_digit()) {
        pos += 1;
    }
    if line.get(pos) == Some(&b'.') && line.get(pos + 1).is_some_and(|&c| c.is_ascii_digit()) {
        pos += 1;
        while line.get(pos).is_some_and(|&c| c.is_ascii_digit()) {
            pos += 1;
        }
    }
    if pos == start {
        return None;
    }
    if matches!(line.get(pos), Some(&(b'e' | b'E'))) {
        let mut exp_pos = pos + 1;
        if matches!(line.get(exp_pos), Some(&(b'+' | b'-'))) {
            exp_pos += 1;
        }
        if line.get(exp_pos).is_some_and(|&c| c.is_ascii_digit()) {
            while line.get(exp_pos).is_some_and(|&c| c.is_ascii_digit()) {
                exp_pos += 1;
            }
            pos = exp_pos;
        }
    }
    let text = std::str::from_utf8(&line[start..pos]).ok()?;
    let value = if text.starts_with('.') {
        format!("0{text}").parse().ok()?
    } else {
        text.parse().ok()?
    };
    *column = pos;
    Some(value)
}

/// Parse an optional leading number the way `strtod` does: skip leading
/// whitespace, accept an optional sign, then a decimal literal. Returns 0
/// when no numeric prefix is present.
#[must_use]
pub fn parse_leading_double(text: &[u8]) -> f64 {
    let mut pos = 0;
    while text.get(pos).is_some_and(|&c| c.is_ascii_whitespace()) {
        pos += 1;
    }
    let mut negative = false;
    if let Some(&(sign @ (b'+' | b'-'))) = text.get(pos) {
        negative = sign == b'-';
        pos += 1;
    }
    let mut cursor = pos;
    parse_decimal(text, &mut cursor).map_or(0.0, |value| if negative { -value } else { value })
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Whether `byte` can start a symbol name.
#[must_use]
pub const fn is_symbol_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

/// Consume a symbol name at the cursor: a letter or underscore, then
/// letters, digits, and underscores, then at most one BBC BASIC style
/// sigil (`$` or `%`).
///
/// The caller is expected to have checked [`is_symbol_start`] first.
pub fn scan_symbol_name<'l>(line: &'l [u8], column: &mut usize) -> &'l str {
    let start = *column;
    let mut pos = start;
    while line
        .get(pos)
        .is_some_and(|&c| c.is_ascii_alphanumeric() || c == b'_')
    {
        pos += 1;
    }
    if matches!(line.get(pos), Some(&(b'$' | b'%'))) {
        pos += 1;
    }
    *column = pos;
    std::str::from_utf8(&line[start..pos]).unwrap_or("")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Locale-tolerant number parsing for form values.
//!
//! Form inputs are typed by German-speaking users, so `"12,5"` and `"12.5"`
//! both mean twelve and a half. Parsing happens once, at the boundary, and
//! never coerces garbage to zero.

use crate::errors::{CalcError, CalcResult};

/// Parse a non-negative decimal that may use a comma or a dot as separator.
///
/// # Errors
///
/// `CalcError::InvalidInput` when the value is empty, contains anything but
/// digits and a single separator, or is negative.
///
/// # Example
///
/// ```rust
/// use opening_core::input::parse_decimal;
///
/// assert_eq!(parse_decimal("tiefe", "24,5").unwrap(), 24.5);
/// assert_eq!(parse_decimal("tiefe", " 30 ").unwrap(), 30.0);
/// assert!(parse_decimal("tiefe", "").is_err());
/// assert!(parse_decimal("tiefe", "1.000,5").is_err());
/// ```
pub fn parse_decimal(field: &str, raw: &str) -> CalcResult<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CalcError::invalid_input(field, raw, "Value is empty"));
    }

    if let Some(rest) = trimmed.strip_prefix('-') {
        if is_plain_decimal(rest) {
            return Err(CalcError::invalid_input(field, raw, "Value cannot be negative"));
        }
    }

    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !is_plain_decimal(digits) {
        return Err(CalcError::invalid_input(
            field,
            raw,
            "Expected a number with at most one decimal separator",
        ));
    }

    digits
        .replace(',', ".")
        .parse::<f64>()
        .map_err(|e| CalcError::invalid_input(field, raw, e.to_string()))
}

/// Parse a story count: a non-negative whole number (`"3"` or `"3,0"`).
pub fn parse_story_count(field: &str, raw: &str) -> CalcResult<u32> {
    let value = parse_decimal(field, raw)?;
    if value.fract() != 0.0 {
        return Err(CalcError::invalid_input(field, raw, "Story count must be a whole number"));
    }
    if value > f64::from(u32::MAX) {
        return Err(CalcError::invalid_input(field, raw, "Story count is out of range"));
    }
    Ok(value as u32)
}

/// Digits with at most one `,` or `.` and at least one digit
fn is_plain_decimal(s: &str) -> bool {
    let separators = s.chars().filter(|c| *c == ',' || *c == '.').count();
    separators <= 1
        && s.chars().any(|c| c.is_ascii_digit())
        && s.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comma_and_dot_separators() {
        assert_eq!(parse_decimal("d3", "20,25").unwrap(), 20.25);
        assert_eq!(parse_decimal("d3", "20.25").unwrap(), 20.25);
        assert_eq!(parse_decimal("d3", "0").unwrap(), 0.0);
        assert_eq!(parse_decimal("d3", ",5").unwrap(), 0.5);
        assert_eq!(parse_decimal("d3", "+7").unwrap(), 7.0);
    }

    #[test]
    fn test_malformed_values_are_rejected() {
        for raw in ["", "   ", "abc", "12cm", "1,2,3", "1.2.3", "1.000,5", "NaN", "inf", "1e3", ","] {
            let err = parse_decimal("hoehe", raw).unwrap_err();
            assert_eq!(err.error_code(), "INVALID_INPUT", "accepted {raw:?}");
        }
    }

    #[test]
    fn test_negative_values_are_rejected() {
        match parse_decimal("t1", "-5") {
            Err(CalcError::InvalidInput { field, reason, .. }) => {
                assert_eq!(field, "t1");
                assert!(reason.contains("negative"));
            }
            other => panic!("expected InvalidInput, got {other:?}"),
        }
    }

    #[test]
    fn test_story_count() {
        assert_eq!(parse_story_count("obergeschosse", "3").unwrap(), 3);
        assert_eq!(parse_story_count("obergeschosse", "3,0").unwrap(), 3);
        assert!(parse_story_count("obergeschosse", "2,5").is_err());
        assert!(parse_story_count("obergeschosse", "-1").is_err());
    }
}

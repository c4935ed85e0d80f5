//! Numeric coercion of raw cell text
//!
//! Spreadsheet exports write integers as `120`, `120.0` or ` 120 `; all of
//! these are accepted. Anything non-finite is rejected.

/// Parse a numeric cell. Returns `None` for blank or non-numeric text.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Parse a year cell. Fractional years are rejected.
pub fn parse_year(raw: &str) -> Option<i32> {
    let value = parse_number(raw)?;
    if value.fract() != 0.0 || value < i32::MIN as f64 || value > i32::MAX as f64 {
        return None;
    }
    Some(value as i32)
}

/// Parse a numeric administrative code and render it canonically (`"32.0"` -> `"32"`).
pub fn parse_code(raw: &str) -> Option<String> {
    let value = parse_number(raw)?;
    if value.fract() != 0.0 || value < 0.0 {
        return None;
    }
    Some(format!("{}", value as u64))
}

/// Render a number the way the dataset file stores it: integral values
/// without a decimal point, everything else with Rust's shortest
/// round-trip formatting.
pub fn canonical_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

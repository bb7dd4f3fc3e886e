//! Field sanity checks for upstream voting data
//!
//! The event transport sometimes serializes a missing field as a literal
//! string ("undefined", "null") instead of omitting it. Every such value is
//! treated as absent.

/// Literal strings that stand in for a missing value
const PLACEHOLDERS: &[&str] = &["undefined", "null", "none", "nil", "nan", "[object object]"];

/// Check whether a raw string is a placeholder for "missing"
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || PLACEHOLDERS
            .iter()
            .any(|p| trimmed.eq_ignore_ascii_case(p))
}

/// Check whether an optional field carries real data
pub fn is_present(value: Option<&str>) -> bool {
    value.is_some_and(|v| !is_placeholder(v))
}

/// Return the trimmed value if it carries real data
pub fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !is_placeholder(v))
}

/// Check for a `#RRGGBB` hex color
pub fn is_hex_color(value: &str) -> bool {
    let value = value.trim();
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

//! Lenient number parsing for provider fields that arrive as text
//! ("1.2345%", "$190.12", "(+0.85%)", "1,234,567").

use serde_json::Value;

/// Parse a number out of provider text. Returns `None` unless the result is finite.
pub fn parse_loose_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .chars()
        .filter(|c| !matches!(c, '%' | '$' | ',' | '+' | ' '))
        .collect();

    if cleaned.is_empty() {
        return None;
    }

    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Number from a JSON value that may be a number or a string
pub fn loose_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_loose_number(s),
        _ => None,
    }
}

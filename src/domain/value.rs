// Value typing and coercion helpers shared by resolvers and modifiers

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declared type of a token value or a modifier input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Number,
    Boolean,
    Date,
    Relation,
    Media,
    Object,
    Array,
    Any,
}

impl ValueType {
    /// Map a schema widget name to the value type it produces
    pub fn from_widget(widget: &str) -> Self {
        match widget.to_ascii_lowercase().as_str() {
            "number" | "currency" | "rating" | "range" => ValueType::Number,
            "checkbox" | "boolean" | "toggle" => ValueType::Boolean,
            "date" | "datetime" | "daterange" => ValueType::Date,
            "relation" => ValueType::Relation,
            "media" | "mediaupload" | "image" | "file" => ValueType::Media,
            "group" | "address" | "seo" | "json" => ValueType::Object,
            "tags" | "repeater" | "megamenu" => ValueType::Array,
            _ => ValueType::String,
        }
    }
}

/// Final coercion of a token value into substitution text.
///
/// `null` becomes the empty string, strings pass through, numbers and
/// booleans use their canonical text, and objects/arrays are serialized as
/// JSON.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format_number(f),
            _ => n.to_string(),
        },
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

/// True for the values `default` replaces: `null` and the empty string
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Truthiness used by the `if` modifier
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Value::String(s) => !(s.is_empty() || s == "false" || s == "0"),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Leading-prefix float parse: `"12.5px"` → 12.5, `"abc"` → None
pub fn parse_float(input: &str) -> Option<f64> {
    let s = input.trim_start();
    let bytes = s.as_bytes();
    let mut end = 0;

    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }

    if s[end..].starts_with("Infinity") {
        let sign = if s.starts_with('-') { -1.0 } else { 1.0 };
        return Some(sign * f64::INFINITY);
    }

    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut has_digits = end > digits_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        if frac_end > frac_start || has_digits {
            has_digits = has_digits || frac_end > frac_start;
            end = frac_end;
        }
    }

    if !has_digits {
        return None;
    }

    // Exponent only counts when followed by at least one digit
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }

    s[..end].parse::<f64>().ok()
}

/// Numeric view of a value, following `parseFloat` on its text
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_float(s),
        _ => None,
    }
}

/// Format a float the way template authors expect: integral values without
/// a fractional part, everything else in shortest round-trip form.
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

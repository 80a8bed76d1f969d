// Text modifiers: case mapping, truncation, slugs, trimming, encoding

use anyhow::{Context, Result};
use serde_json::Value;

use super::arg;
use crate::domain::template::{FnModifier, ModifierContext, ModifierRegistry, ParamSpec};
use crate::domain::value::{stringify, ValueType};

const TEXT: &[ValueType] = &[ValueType::String, ValueType::Number, ValueType::Boolean];

pub fn register(registry: &mut ModifierRegistry) {
    registry.register(Box::new(FnModifier::new("upper", "Uppercase the value", TEXT, &[], upper)));
    registry.register(Box::new(FnModifier::new("lower", "Lowercase the value", TEXT, &[], lower)));
    registry.register(Box::new(FnModifier::new(
        "capitalize",
        "Uppercase the first letter of every word",
        TEXT,
        &[],
        capitalize,
    )));
    registry.register(Box::new(FnModifier::new(
        "truncate",
        "Cut to a maximum length, appending a suffix when cut",
        TEXT,
        &[ParamSpec::required("length"), ParamSpec::optional("suffix", Some(""))],
        truncate,
    )));
    registry.register(Box::new(FnModifier::new(
        "slugify",
        "Lowercase URL slug with dashes",
        TEXT,
        &[],
        slugify,
    )));
    registry.register(Box::new(FnModifier::new("trim", "Strip surrounding whitespace", TEXT, &[], trim)));
    registry.register(Box::new(FnModifier::new(
        "urlencode",
        "Percent-encode for use in a URL",
        TEXT,
        &[],
        urlencode,
    )));
}

fn upper(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(Value::String(stringify(value).to_uppercase()))
}

fn lower(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(Value::String(stringify(value).to_lowercase()))
}

fn capitalize(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start && !ch.is_whitespace() {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    Ok(Value::String(out))
}

fn truncate(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    let length: usize = arg(args, 0)
        .context("truncate requires a length")?
        .trim()
        .parse()
        .context("truncate length must be a non-negative integer")?;
    let suffix = arg(args, 1).unwrap_or("");

    let text = stringify(value);
    if text.chars().count() <= length {
        return Ok(Value::String(text));
    }
    let mut cut: String = text.chars().take(length).collect();
    cut.push_str(suffix);
    Ok(Value::String(cut))
}

fn slugify(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let lowered = stringify(value).to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut pending_dash = false;

    for ch in lowered.chars() {
        if ch.is_whitespace() || ch == '_' || ch == '-' {
            pending_dash = true;
        } else if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        }
        // Anything else is dropped without breaking the current word
    }
    Ok(Value::String(slug))
}

fn trim(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(Value::String(stringify(value).trim().to_string()))
}

fn urlencode(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(Value::String(urlencoding::encode(&stringify(value)).into_owned()))
}

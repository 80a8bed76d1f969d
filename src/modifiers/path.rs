// Path modifiers. Pure string work on URLs and file paths; every modifier
// drops the query string and fragment first.

use anyhow::{Context, Result};
use serde_json::Value;
use url::Url;

use super::arg;
use crate::domain::template::{FnModifier, ModifierContext, ModifierRegistry, ParamSpec};
use crate::domain::value::{stringify, ValueType};

const PATHLIKE: &[ValueType] = &[ValueType::String, ValueType::Media];

pub fn register(registry: &mut ModifierRegistry) {
    registry.register(Box::new(FnModifier::new("basename", "Last path segment", PATHLIKE, &[], basename)));
    registry.register(Box::new(FnModifier::new("dirname", "Parent path", PATHLIKE, &[], dirname)));
    registry.register(Box::new(FnModifier::new(
        "extension",
        "File extension without the dot",
        PATHLIKE,
        &[],
        extension,
    )));
    registry.register(Box::new(FnModifier::new(
        "filename",
        "Last segment without its extension",
        PATHLIKE,
        &[],
        filename,
    )));
    registry.register(Box::new(FnModifier::new(
        "path",
        "Normalized path, or the segment at an index (negative counts from the end)",
        PATHLIKE,
        &[ParamSpec::optional("index", None)],
        path,
    )));
    registry.register(Box::new(FnModifier::new(
        "cleanurl",
        "URL without query, fragment or trailing slash",
        PATHLIKE,
        &[],
        cleanurl,
    )));
}

pub fn strip_query(input: &str) -> &str {
    match input.find(&['?', '#'][..]) {
        Some(pos) => &input[..pos],
        None => input,
    }
}

fn base_of(input: &str) -> &str {
    let trimmed = strip_query(input).trim_end_matches('/');
    trimmed.rsplit('/').next().unwrap_or("")
}

fn split_extension(base: &str) -> (&str, &str) {
    match base.rfind('.') {
        Some(pos) if pos > 0 => (&base[..pos], &base[pos + 1..]),
        _ => (base, ""),
    }
}

fn basename(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(Value::String(base_of(&stringify(value)).to_string()))
}

fn dirname(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    let stripped = strip_query(&text);
    let trimmed = stripped.trim_end_matches('/');
    let dir = match trimmed.rfind('/') {
        None if stripped.starts_with('/') => "/",
        None => ".",
        Some(0) => "/",
        Some(pos) => &trimmed[..pos],
    };
    Ok(Value::String(dir.to_string()))
}

fn extension(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    Ok(Value::String(split_extension(base_of(&text)).1.to_string()))
}

fn filename(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    Ok(Value::String(split_extension(base_of(&text)).0.to_string()))
}

fn path(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    let stripped = strip_query(&text);
    // Absolute URLs contribute only their path component
    let raw_path = match Url::parse(stripped) {
        Ok(url) if url.has_host() => url.path().to_string(),
        _ => stripped.to_string(),
    };

    let Some(index) = arg(args, 0).map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(Value::String(collapse_slashes(&raw_path)));
    };
    let index: i64 = index
        .parse()
        .with_context(|| format!("path index must be an integer, got '{}'", index))?;

    let segments: Vec<&str> = raw_path.split('/').filter(|s| !s.is_empty()).collect();
    let position = if index < 0 {
        segments.len() as i64 + index
    } else {
        index
    };
    let segment = usize::try_from(position)
        .ok()
        .and_then(|i| segments.get(i).copied())
        .unwrap_or("");
    Ok(Value::String(segment.to_string()))
}

fn collapse_slashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut previous_slash = false;
    for ch in input.chars() {
        if ch == '/' {
            if !previous_slash {
                out.push(ch);
            }
            previous_slash = true;
        } else {
            out.push(ch);
            previous_slash = false;
        }
    }
    out
}

fn cleanurl(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    let text = stringify(value);
    let stripped = strip_query(&text);
    let trimmed = stripped.trim_end_matches('/');
    let cleaned = if trimmed.is_empty() && stripped.starts_with('/') {
        "/"
    } else {
        trimmed
    };
    Ok(Value::String(cleaned.to_string()))
}

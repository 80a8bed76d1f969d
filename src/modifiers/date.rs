// Date modifier: presets, literal formats and relative time

use anyhow::{anyhow, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, SecondsFormat, Timelike, Utc};
use serde_json::Value;
use std::fmt::Write;

use super::arg;
use crate::domain::template::{FnModifier, ModifierContext, ModifierRegistry, ParamSpec};
use crate::domain::value::ValueType;

pub fn register(registry: &mut ModifierRegistry) {
    registry.register(Box::new(FnModifier::new(
        "date",
        "Format a date with a preset (iso, date, time, datetime, short, long, full, relative, timestamp) or a format string",
        &[ValueType::Date, ValueType::String, ValueType::Number],
        &[ParamSpec::optional("format", Some("date"))],
        date,
    )));
}

fn date(value: &Value, args: &[String], ctx: &ModifierContext) -> Result<Value> {
    let Some(parsed) = parse_date(value) else {
        return Ok(Value::String(String::new()));
    };
    let format = arg(args, 0).map(str::trim).filter(|f| !f.is_empty()).unwrap_or("date");
    format_date(&parsed, format, ctx.now).map(Value::String)
}

/// Accepts RFC 3339, `YYYY-MM-DD[ HH:MM:SS]` (UTC) and epoch milliseconds
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp_millis(n.as_f64()? as i64),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
                if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
                    return Some(naive.and_utc());
                }
            }
            if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return day.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
            }
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                return DateTime::from_timestamp_millis(s.parse().ok()?);
            }
            None
        }
        _ => None,
    }
}

pub fn format_date(dt: &DateTime<Utc>, format: &str, now: DateTime<Utc>) -> Result<String> {
    let formatted = match format {
        "iso" => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        "date" => dt.format("%Y-%m-%d").to_string(),
        "time" => dt.format("%H:%M:%S").to_string(),
        "datetime" => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        "short" => dt.format("%m/%d/%Y").to_string(),
        "long" => dt.format("%B %-d, %Y").to_string(),
        "full" => dt.format("%A, %B %-d, %Y").to_string(),
        "timestamp" => dt.timestamp_millis().to_string(),
        "relative" => relative(dt, now),
        literal if literal.contains('%') => strftime(dt, literal)?,
        literal => pattern(dt, literal),
    };
    Ok(formatted)
}

fn strftime(dt: &DateTime<Utc>, format: &str) -> Result<String> {
    let items: Vec<Item> = StrftimeItems::new(format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("invalid date format '{}'", format));
    }
    let mut out = String::new();
    write!(out, "{}", dt.format_with_items(items.into_iter()))
        .map_err(|_| anyhow!("invalid date format '{}'", format))?;
    Ok(out)
}

const PATTERN_TOKENS: &[&str] = &["YYYY", "MMMM", "MMM", "YY", "MM", "DD", "HH", "mm", "ss", "M", "D", "H"];

/// `YYYY-MM-DD`-style patterns. Unrecognized characters are copied.
fn pattern(dt: &DateTime<Utc>, format: &str) -> String {
    let mut out = String::new();
    let mut rest = format;

    'outer: while !rest.is_empty() {
        for token in PATTERN_TOKENS {
            if let Some(after) = rest.strip_prefix(token) {
                let piece = match *token {
                    "YYYY" => format!("{:04}", dt.year()),
                    "YY" => format!("{:02}", dt.year() % 100),
                    "MMMM" => dt.format("%B").to_string(),
                    "MMM" => dt.format("%b").to_string(),
                    "MM" => format!("{:02}", dt.month()),
                    "M" => dt.month().to_string(),
                    "DD" => format!("{:02}", dt.day()),
                    "D" => dt.day().to_string(),
                    "HH" => format!("{:02}", dt.hour()),
                    "H" => dt.hour().to_string(),
                    "mm" => format!("{:02}", dt.minute()),
                    _ => format!("{:02}", dt.second()),
                };
                out.push_str(&piece);
                rest = after;
                continue 'outer;
            }
        }
        let mut chars = rest.chars();
        if let Some(ch) = chars.next() {
            out.push(ch);
        }
        rest = chars.as_str();
    }
    out
}

fn relative(dt: &DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = now.signed_duration_since(*dt).num_seconds();
    let seconds = delta.unsigned_abs();
    if seconds < 45 {
        return "just now".to_string();
    }

    let (amount, unit) = match seconds {
        s if s < 3_600 => (s / 60, "minute"),
        s if s < 86_400 => (s / 3_600, "hour"),
        s if s < 30 * 86_400 => (s / 86_400, "day"),
        s if s < 365 * 86_400 => (s / (30 * 86_400), "month"),
        s => (s / (365 * 86_400), "year"),
    };
    let amount = amount.max(1);
    let plural = if amount == 1 { "" } else { "s" };

    if delta >= 0 {
        format!("{} {}{} ago", amount, unit, plural)
    } else {
        format!("in {} {}{}", amount, unit, plural)
    }
}

// Logical modifiers: fallbacks, ternary and comparisons

use anyhow::{Context, Result};
use serde_json::Value;
use std::cmp::Ordering;

use super::arg;
use crate::domain::template::{FnModifier, ModifierContext, ModifierRegistry, ParamSpec};
use crate::domain::value::{as_number, is_blank, is_truthy, parse_float, stringify, ValueType};

const ANY: &[ValueType] = &[ValueType::Any];

pub fn register(registry: &mut ModifierRegistry) {
    let compare = [
        ParamSpec::required("other"),
        ParamSpec::optional("then", None),
        ParamSpec::optional("else", Some("")),
    ];

    registry.register(Box::new(FnModifier::new(
        "default",
        "Fallback for missing or empty values (0 and \"false\" are kept)",
        ANY,
        &[ParamSpec::required("fallback")],
        default,
    )));
    registry.register(Box::new(FnModifier::new(
        "if",
        "Pick a branch by truthiness",
        ANY,
        &[ParamSpec::required("then"), ParamSpec::optional("else", Some(""))],
        if_then,
    )));
    registry.register(Box::new(FnModifier::new("eq", "Equal to", ANY, &compare, eq)));
    registry.register(Box::new(FnModifier::new("ne", "Not equal to", ANY, &compare, ne)));
    registry.register(Box::new(FnModifier::new("gt", "Greater than", ANY, &compare, gt)));
    registry.register(Box::new(FnModifier::new("lt", "Less than", ANY, &compare, lt)));
}

fn default(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    if is_blank(value) {
        Ok(Value::String(arg(args, 0).unwrap_or("").to_string()))
    } else {
        Ok(value.clone())
    }
}

fn if_then(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    let branch = if is_truthy(value) {
        arg(args, 0).unwrap_or("")
    } else {
        arg(args, 1).unwrap_or("")
    };
    Ok(Value::String(branch.to_string()))
}

/// `"true"`/`"false"`, or the `then`/`else` arguments when given
fn outcome(result: bool, args: &[String]) -> Value {
    let text = if args.len() >= 2 {
        if result {
            arg(args, 1).unwrap_or("")
        } else {
            arg(args, 2).unwrap_or("")
        }
    } else if result {
        "true"
    } else {
        "false"
    };
    Value::String(text.to_string())
}

fn other<'a>(args: &'a [String], name: &str) -> Result<&'a str> {
    arg(args, 0).with_context(|| format!("{} requires a value to compare against", name))
}

fn eq(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(outcome(stringify(value) == other(args, "eq")?, args))
}

fn ne(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    Ok(outcome(stringify(value) != other(args, "ne")?, args))
}

/// Numeric ordering when both sides parse, text ordering otherwise
fn compare(value: &Value, other: &str) -> Option<Ordering> {
    match (as_number(value), parse_float(other)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(stringify(value).as_str().cmp(other)),
    }
}

fn gt(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    let ordering = compare(value, other(args, "gt")?);
    Ok(outcome(ordering == Some(Ordering::Greater), args))
}

fn lt(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    let ordering = compare(value, other(args, "lt")?);
    Ok(outcome(ordering == Some(Ordering::Less), args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn run(f: fn(&Value, &[String], &ModifierContext) -> Result<Value>, value: Value, args: &[&str]) -> Value {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        f(&value, &args, &ModifierContext::new(Utc::now())).unwrap()
    }

    #[test]
    fn test_default_only_replaces_blank() {
        assert_eq!(run(default, Value::Null, &["N/A"]), json!("N/A"));
        assert_eq!(run(default, json!(""), &["N/A"]), json!("N/A"));
        assert_eq!(run(default, json!(0), &["N/A"]), json!(0));
        assert_eq!(run(default, json!("false"), &["N/A"]), json!("false"));
        assert_eq!(run(default, json!("x"), &["N/A"]), json!("x"));
    }

    #[test]
    fn test_if_branches() {
        assert_eq!(run(if_then, json!("published"), &["Live", "Draft"]), json!("Live"));
        assert_eq!(run(if_then, json!(""), &["Live", "Draft"]), json!("Draft"));
        assert_eq!(run(if_then, json!(false), &["Live"]), json!(""));
        assert_eq!(run(if_then, Value::Null, &["Live", "Draft"]), json!("Draft"));
    }

    #[test]
    fn test_equality() {
        assert_eq!(run(eq, json!("draft"), &["draft"]), json!("true"));
        assert_eq!(run(eq, json!(3), &["3"]), json!("true"));
        assert_eq!(run(ne, json!("draft"), &["draft"]), json!("false"));
        assert_eq!(run(eq, json!("draft"), &["draft", "Draft!", "Live"]), json!("Draft!"));
        assert_eq!(run(eq, json!("live"), &["draft", "Draft!", "Live"]), json!("Live"));
    }

    #[test]
    fn test_ordering() {
        assert_eq!(run(gt, json!(10), &["9"]), json!("true"));
        assert_eq!(run(lt, json!("10"), &["9"]), json!("false"));
        // Text comparison when either side is not numeric
        assert_eq!(run(lt, json!("apple"), &["banana"]), json!("true"));
        assert_eq!(run(gt, json!(5), &["3", "big", "small"]), json!("big"));
    }

    #[test]
    fn test_missing_comparison_argument() {
        let result = eq(&json!("x"), &[], &ModifierContext::new(Utc::now()));
        assert!(result.is_err());
    }
}

// Math modifiers. Input goes through `parseFloat`; non-numeric input is
// returned unchanged.

use anyhow::{bail, Context, Result};
use serde_json::Value;

use super::arg;
use crate::domain::template::{FnModifier, ModifierContext, ModifierRegistry, ParamSpec};
use crate::domain::value::{as_number, format_number, parse_float, ValueType};

const NUMERIC: &[ValueType] = &[ValueType::Number, ValueType::String];

/// Upper bound for `round`/`number` precision
pub const MAX_DECIMALS: usize = 100;

pub fn register(registry: &mut ModifierRegistry) {
    let operand = [ParamSpec::required("operand")];
    let decimals = [ParamSpec::optional("decimals", Some("0"))];

    registry.register(Box::new(FnModifier::new("add", "Add a number", NUMERIC, &operand, add)));
    registry.register(Box::new(FnModifier::new("subtract", "Subtract a number", NUMERIC, &operand, subtract)));
    registry.register(Box::new(FnModifier::new("multiply", "Multiply by a number", NUMERIC, &operand, multiply)));
    registry.register(Box::new(FnModifier::new("divide", "Divide by a non-zero number", NUMERIC, &operand, divide)));
    registry.register(Box::new(FnModifier::new("round", "Round to decimals", NUMERIC, &decimals, round)));
    registry.register(Box::new(FnModifier::new("ceil", "Round up", NUMERIC, &[], ceil)));
    registry.register(Box::new(FnModifier::new("floor", "Round down", NUMERIC, &[], floor)));
    registry.register(Box::new(FnModifier::new("abs", "Absolute value", NUMERIC, &[], abs)));
    registry.register(Box::new(FnModifier::new("min", "Smaller of value and operand", NUMERIC, &operand, min)));
    registry.register(Box::new(FnModifier::new("max", "Larger of value and operand", NUMERIC, &operand, max)));
    registry.register(Box::new(FnModifier::new(
        "number",
        "Fixed-point formatting",
        NUMERIC,
        &decimals,
        number,
    )));
}

fn operand(args: &[String], name: &str) -> Result<f64> {
    let raw = arg(args, 0).with_context(|| format!("{} requires a numeric argument", name))?;
    parse_float(raw).with_context(|| format!("{}: '{}' is not a number", name, raw))
}

fn decimals(args: &[String]) -> Result<usize> {
    let Some(raw) = arg(args, 0).map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(0);
    };
    let decimals = raw
        .parse::<usize>()
        .with_context(|| format!("decimals must be a non-negative integer, got '{}'", raw))?;
    if decimals > MAX_DECIMALS {
        bail!("decimals must be at most {}, got {}", MAX_DECIMALS, decimals);
    }
    Ok(decimals)
}

/// Apply `op` to the numeric view of `value`, or hand the value back untouched
fn numeric(value: &Value, op: impl FnOnce(f64) -> Result<f64>) -> Result<Value> {
    match as_number(value) {
        Some(n) => Ok(Value::String(format_number(op(n)?))),
        None => Ok(value.clone()),
    }
}

fn add(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n + operand(args, "add")?))
}

fn subtract(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n - operand(args, "subtract")?))
}

fn multiply(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n * operand(args, "multiply")?))
}

fn divide(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| {
        let divisor = operand(args, "divide")?;
        if divisor == 0.0 {
            bail!("division by zero");
        }
        Ok(n / divisor)
    })
}

fn round(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| {
        let factor = 10f64.powi(i32::try_from(decimals(args)?)?);
        Ok((n * factor).round() / factor)
    })
}

fn ceil(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n.ceil()))
}

fn floor(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n.floor()))
}

fn abs(value: &Value, _: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n.abs()))
}

fn min(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n.min(operand(args, "min")?)))
}

fn max(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    numeric(value, |n| Ok(n.max(operand(args, "max")?)))
}

fn number(value: &Value, args: &[String], _: &ModifierContext) -> Result<Value> {
    match as_number(value) {
        Some(n) => Ok(Value::String(format!("{:.*}", decimals(args)?, n))),
        None => Ok(value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn run(f: fn(&Value, &[String], &ModifierContext) -> Result<Value>, value: Value, args: &[&str]) -> Result<Value> {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        f(&value, &args, &ModifierContext::new(Utc::now()))
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(run(add, json!(2), &["3"]).unwrap(), json!("5"));
        assert_eq!(run(subtract, json!("10"), &["2.5"]).unwrap(), json!("7.5"));
        assert_eq!(run(multiply, json!("4px"), &["2"]).unwrap(), json!("8"));
        assert_eq!(run(divide, json!(9), &["2"]).unwrap(), json!("4.5"));
    }

    #[test]
    fn test_non_numeric_input_unchanged() {
        assert_eq!(run(add, json!("abc"), &["1"]).unwrap(), json!("abc"));
        assert_eq!(run(abs, json!(true), &[]).unwrap(), json!(true));
    }

    #[test]
    fn test_bad_operand_is_error() {
        assert!(run(add, json!(1), &[]).is_err());
        assert!(run(add, json!(1), &["x"]).is_err());
        assert!(run(divide, json!(1), &["0"]).is_err());
    }

    #[test]
    fn test_rounding() {
        assert_eq!(run(round, json!(2.5), &[]).unwrap(), json!("3"));
        assert_eq!(run(round, json!("3.14159"), &["2"]).unwrap(), json!("3.14"));
        assert_eq!(run(ceil, json!(1.2), &[]).unwrap(), json!("2"));
        assert_eq!(run(floor, json!(-1.2), &[]).unwrap(), json!("-2"));
        assert_eq!(run(abs, json!(-7), &[]).unwrap(), json!("7"));
    }

    #[test]
    fn test_min_max() {
        assert_eq!(run(min, json!(5), &["3"]).unwrap(), json!("3"));
        assert_eq!(run(max, json!(5), &["3"]).unwrap(), json!("5"));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(run(number, json!(3.14159), &["2"]).unwrap(), json!("3.14"));
        assert_eq!(run(number, json!("7"), &["1"]).unwrap(), json!("7.0"));
        assert_eq!(run(number, json!(2.6), &[]).unwrap(), json!("3"));
        assert!(run(number, json!(1), &["-1"]).is_err());
    }

    #[test]
    fn test_precision_is_capped() {
        assert!(run(number, json!(1.5), &["100"]).is_ok());
        assert!(run(number, json!(1.5), &["101"]).is_err());
        assert!(run(number, json!(1.5), &["70000"]).is_err());
        assert!(run(round, json!(1.5), &["50000000"]).is_err());
    }
}

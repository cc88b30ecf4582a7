use super::constraint::{Constraint, Scalar, ValueType};
use super::Violation;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d/%m/%y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

pub(super) fn check(constraint: &Constraint, value: &Value) -> Result<(), Violation> {
    match constraint {
        Constraint::Type(types) => check_type(types, value),
        Constraint::Allowed(allowed) => check_allowed(allowed, value),
        Constraint::Forbidden(forbidden) => check_forbidden(forbidden, value),
        Constraint::Min(bound) => check_bound("min", bound, value, Ordering::Less),
        Constraint::Max(bound) => check_bound("max", bound, value, Ordering::Greater),
        Constraint::MinLength(min) => check_length("minlength", *min, value, Ordering::Less),
        Constraint::MaxLength(max) => check_length("maxlength", *max, value, Ordering::Greater),
        Constraint::Regex(regex) => match value {
            Value::String(text) if !regex.is_match(text) => Err(Violation::new(
                "regex",
                format!("value does not match regex '{}'", regex.as_str()),
            )),
            _ => Ok(()),
        },
        Constraint::Empty(false) => match value {
            Value::String(text) if text.is_empty() => {
                Err(Violation::new("empty", "empty values not allowed"))
            }
            Value::Array(items) if items.is_empty() => {
                Err(Violation::new("empty", "empty values not allowed"))
            }
            _ => Ok(()),
        },
        Constraint::Empty(true) => Ok(()),
        Constraint::Contains(required) => check_contains(required, value),
        Constraint::Schema(nested) => {
            for element in elements(value) {
                nested.evaluate(element).map_err(|violation| {
                    Violation::new("schema", format!("list element: {}", violation.message))
                })?;
            }
            Ok(())
        }
    }
}

fn check_type(types: &[ValueType], value: &Value) -> Result<(), Violation> {
    if types.iter().any(|value_type| is_type(*value_type, value)) {
        return Ok(());
    }

    let names: Vec<&str> = types.iter().map(|value_type| value_type.name()).collect();
    Err(Violation::new(
        "type",
        format!("must be of {} type", names.join(" or ")),
    ))
}

fn is_type(value_type: ValueType, value: &Value) -> bool {
    match (value_type, value) {
        (ValueType::String, Value::String(_)) => true,
        (ValueType::Integer, Value::Number(number)) => number.is_i64() || number.is_u64(),
        (ValueType::Integer, Value::String(text)) => text.trim().parse::<i64>().is_ok(),
        (ValueType::Float, Value::Number(number)) => number.is_f64(),
        (ValueType::Number, Value::Number(_)) => true,
        (ValueType::Float | ValueType::Number, Value::String(text)) => parse_number(text).is_some(),
        (ValueType::Boolean, Value::Bool(_)) => true,
        (ValueType::Boolean, Value::String(text)) => parse_bool(text).is_some(),
        (ValueType::Date, Value::String(text)) => DATE_FORMATS
            .iter()
            .any(|format| NaiveDate::parse_from_str(text.trim(), format).is_ok()),
        (ValueType::Datetime, Value::String(text)) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text).is_ok()
                || DATETIME_FORMATS
                    .iter()
                    .any(|format| NaiveDateTime::parse_from_str(text, format).is_ok())
        }
        (ValueType::List, Value::Array(_)) => true,
        (ValueType::Dict, Value::Object(_)) => true,
        _ => false,
    }
}

fn check_allowed(allowed: &[Scalar], value: &Value) -> Result<(), Violation> {
    for element in elements(value) {
        if !allowed.iter().any(|candidate| scalar_matches(candidate, element)) {
            return Err(Violation::new(
                "allowed",
                format!("unallowed value {}", describe(element)),
            ));
        }
    }
    Ok(())
}

fn check_forbidden(forbidden: &[Scalar], value: &Value) -> Result<(), Violation> {
    for element in elements(value) {
        if forbidden.iter().any(|candidate| scalar_matches(candidate, element)) {
            return Err(Violation::new(
                "forbidden",
                format!("unallowed value {}", describe(element)),
            ));
        }
    }
    Ok(())
}

fn check_contains(required: &[Scalar], value: &Value) -> Result<(), Violation> {
    let present = elements(value);
    for expected in required {
        if !present.iter().any(|element| scalar_matches(expected, element)) {
            return Err(Violation::new(
                "contains",
                format!("missing members '{expected}'"),
            ));
        }
    }
    Ok(())
}

/// Fails when the value compares to the bound as `failing`.
fn check_bound(
    rule: &'static str,
    bound: &Scalar,
    value: &Value,
    failing: Ordering,
) -> Result<(), Violation> {
    let ordering = match bound.as_number() {
        Some(limit) => {
            let actual = as_number(value).ok_or_else(|| {
                Violation::new(rule, format!("{} is not a number", describe(value)))
            })?;
            actual.partial_cmp(&limit)
        }
        None => {
            let actual = as_text(value).ok_or_else(|| {
                Violation::new(rule, format!("{} cannot be compared", describe(value)))
            })?;
            Some(actual.as_ref().cmp(bound.to_string().as_str()))
        }
    };

    if ordering == Some(failing) {
        return Err(Violation::new(rule, format!("{rule} value is {bound}")));
    }
    Ok(())
}

fn check_length(
    rule: &'static str,
    limit: usize,
    value: &Value,
    failing: Ordering,
) -> Result<(), Violation> {
    let length = match value {
        Value::String(text) => text.chars().count(),
        Value::Array(items) => items.len(),
        _ => return Ok(()),
    };

    if length.cmp(&limit) == failing {
        let label = if rule == "minlength" { "min" } else { "max" };
        return Err(Violation::new(rule, format!("{label} length is {limit}")));
    }
    Ok(())
}

/// List values are checked element-wise; scalars behave as one-element lists.
fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn scalar_matches(scalar: &Scalar, value: &Value) -> bool {
    match scalar {
        Scalar::Text(expected) => as_text(value).is_some_and(|actual| actual == expected.as_str()),
        Scalar::Integer(_) | Scalar::Float(_) => match (scalar.as_number(), as_number(value)) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        },
        Scalar::Bool(expected) => match value {
            Value::Bool(actual) => actual == expected,
            Value::String(text) => parse_bool(text) == Some(*expected),
            _ => false,
        },
    }
}

fn as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(text) => Some(Cow::Borrowed(text.as_str())),
        Value::Number(number) => Some(Cow::Owned(number.to_string())),
        Value::Bool(flag) => Some(Cow::Owned(flag.to_string())),
        _ => None,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => parse_number(text),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|number| number.is_finite())
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => other.to_string(),
    }
}

use super::{RuleError, RuleSet};
use regex::Regex;
use serde_yaml::Value as Yaml;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    String,
    Integer,
    Float,
    Number,
    Boolean,
    Date,
    Datetime,
    List,
    /// JSON objects; table cells never hold one, so this only matches
    /// values handed to [`RuleSet::evaluate`] directly.
    Dict,
}

impl ValueType {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "string" => Self::String,
            "integer" => Self::Integer,
            "float" => Self::Float,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "date" => Self::Date,
            "datetime" => Self::Datetime,
            "list" => Self::List,
            "dict" => Self::Dict,
            _ => return None,
        })
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::List => "list",
            Self::Dict => "dict",
        }
    }
}

/// A literal taken from a rule document.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn parse(rule: &str, value: &Yaml) -> Result<Self, RuleError> {
        match value {
            Yaml::String(text) => Ok(Self::Text(text.clone())),
            Yaml::Bool(flag) => Ok(Self::Bool(*flag)),
            Yaml::Number(number) => match number.as_i64() {
                Some(integer) => Ok(Self::Integer(integer)),
                None => number
                    .as_f64()
                    .map(Self::Float)
                    .ok_or_else(|| invalid(rule, "a scalar value")),
            },
            _ => Err(invalid(rule, "a scalar value")),
        }
    }

    pub(crate) fn as_number(&self) -> Option<f64> {
        match self {
            Self::Integer(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            Self::Text(_) | Self::Bool(_) => None,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Bool(value) => write!(f, "{value}"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Constraint {
    Type(Vec<ValueType>),
    Allowed(Vec<Scalar>),
    Forbidden(Vec<Scalar>),
    Min(Scalar),
    Max(Scalar),
    MinLength(usize),
    MaxLength(usize),
    Regex(Regex),
    Empty(bool),
    Contains(Vec<Scalar>),
    Schema(Box<RuleSet>),
}

impl Constraint {
    pub(crate) fn parse(rule: &str, parameter: &Yaml) -> Result<Self, RuleError> {
        match rule {
            "type" => parse_types(parameter).map(Self::Type),
            "allowed" => parse_scalars(rule, parameter).map(Self::Allowed),
            "forbidden" => parse_scalars(rule, parameter).map(Self::Forbidden),
            "contains" => parse_scalars(rule, parameter).map(Self::Contains),
            "min" => parse_bound(rule, parameter).map(Self::Min),
            "max" => parse_bound(rule, parameter).map(Self::Max),
            "minlength" => parse_length(rule, parameter).map(Self::MinLength),
            "maxlength" => parse_length(rule, parameter).map(Self::MaxLength),
            "empty" => parse_flag(rule, parameter).map(Self::Empty),
            "regex" => parse_regex(parameter).map(Self::Regex),
            "schema" => match parameter {
                Yaml::Mapping(mapping) => RuleSet::from_mapping(mapping)
                    .map(|nested| Self::Schema(Box::new(nested))),
                _ => Err(invalid(rule, "a nested rule document")),
            },
            other => Err(RuleError::UnknownRule(other.to_string())),
        }
    }
}

pub(crate) fn parse_flag(rule: &str, parameter: &Yaml) -> Result<bool, RuleError> {
    parameter.as_bool().ok_or_else(|| invalid(rule, "a boolean"))
}

fn parse_types(parameter: &Yaml) -> Result<Vec<ValueType>, RuleError> {
    let names: Vec<&str> = match parameter {
        Yaml::String(name) => vec![name.as_str()],
        Yaml::Sequence(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(|| invalid("type", "type names")))
            .collect::<Result<_, _>>()?,
        _ => return Err(invalid("type", "a type name or a list of type names")),
    };

    names
        .into_iter()
        .map(|name| {
            ValueType::from_name(name).ok_or_else(|| RuleError::UnknownType(name.to_string()))
        })
        .collect()
}

fn parse_scalars(rule: &str, parameter: &Yaml) -> Result<Vec<Scalar>, RuleError> {
    match parameter {
        Yaml::Sequence(items) => items.iter().map(|item| Scalar::parse(rule, item)).collect(),
        _ => Err(invalid(rule, "a list of values")),
    }
}

fn parse_bound(rule: &str, parameter: &Yaml) -> Result<Scalar, RuleError> {
    match Scalar::parse(rule, parameter)? {
        Scalar::Bool(_) => Err(invalid(rule, "a number or a string")),
        bound => Ok(bound),
    }
}

fn parse_length(rule: &str, parameter: &Yaml) -> Result<usize, RuleError> {
    parameter
        .as_u64()
        .and_then(|length| usize::try_from(length).ok())
        .ok_or_else(|| invalid(rule, "a non-negative integer"))
}

fn parse_regex(parameter: &Yaml) -> Result<Regex, RuleError> {
    let pattern = parameter
        .as_str()
        .ok_or_else(|| invalid("regex", "a pattern string"))?;

    Regex::new(&format!("^(?:{pattern})$")).map_err(|source| RuleError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

fn invalid(rule: &str, expected: &'static str) -> RuleError {
    RuleError::InvalidParameter {
        rule: rule.to_string(),
        expected,
    }
}

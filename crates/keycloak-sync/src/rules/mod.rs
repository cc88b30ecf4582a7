//! Constraint language shared by column validation and identifier filtering.
//!
//! A rule document such as `{type: integer, min: 18, nullable: true}` is
//! compiled once into a [`RuleSet`], a flat list of tagged constraints, and
//! then evaluated against any number of values. Nested documents (`schema`)
//! compile recursively into their own rule sets.

mod checks;
mod constraint;

pub use constraint::{Constraint, Scalar, ValueType};

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error("rule '{rule}' expects {expected}")]
    InvalidParameter {
        rule: String,
        expected: &'static str,
    },
    #[error("unknown type '{0}'")]
    UnknownType(String),
    #[error("regex '{pattern}' does not compile: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("rule names must be strings")]
    NonStringKey,
}

/// The first constraint a value failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub rule: &'static str,
    pub message: String,
}

impl Violation {
    pub(crate) fn new(rule: &'static str, message: impl Into<String>) -> Self {
        Self {
            rule,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    required: bool,
    nullable: bool,
    constraints: Vec<Constraint>,
}

impl RuleSet {
    pub fn compile<'a, I>(rules: I) -> Result<Self, RuleError>
    where
        I: IntoIterator<Item = (&'a str, &'a serde_yaml::Value)>,
    {
        let mut set = RuleSet::default();

        for (name, parameter) in rules {
            match name {
                "required" => set.required = constraint::parse_flag(name, parameter)?,
                "nullable" => set.nullable = constraint::parse_flag(name, parameter)?,
                _ => {
                    let parsed = Constraint::parse(name, parameter)?;
                    // type errors read better than whatever follows them
                    if matches!(parsed, Constraint::Type(_)) {
                        set.constraints.insert(0, parsed);
                    } else {
                        set.constraints.push(parsed);
                    }
                }
            }
        }

        Ok(set)
    }

    pub fn from_mapping(mapping: &serde_yaml::Mapping) -> Result<Self, RuleError> {
        let mut rules = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let name = key.as_str().ok_or(RuleError::NonStringKey)?;
            rules.push((name, value));
        }
        Self::compile(rules)
    }

    pub fn evaluate(&self, value: &Value) -> Result<(), Violation> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else if self.required {
                Err(Violation::new("required", "required field"))
            } else {
                Err(Violation::new("nullable", "null value not allowed"))
            };
        }

        for constraint in &self.constraints {
            checks::check(constraint, value)?;
        }

        Ok(())
    }

    /// Evaluates a table cell, `None` being an absent value.
    pub fn evaluate_cell(&self, cell: Option<&str>) -> Result<(), Violation> {
        match cell {
            Some(text) => self.evaluate(&Value::String(text.to_string())),
            None => self.evaluate(&Value::Null),
        }
    }
}

//! Schema validation of a loaded table against the template's `data_model`.
//!
//! Configuration problems (unsupported format, duplicated or missing columns,
//! malformed rules) are all detected before any cell is read. Cells are then
//! scanned column by column in row order and the first failing cell stops the
//! whole pass.

use crate::error::ConfigurationError;
use crate::rules::{RuleSet, Violation};
use crate::table::{Column, Table, TABLE_FORMAT};
use crate::template::{ColumnRule, Template};
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("column '{column}' is invalid in line {row} (value {}): {reason}", describe(.value))]
pub struct ValidationError {
    pub column: String,
    /// 1-based index of the data row.
    pub row: usize,
    pub value: Option<String>,
    pub reason: Violation,
}

fn describe(value: &Option<String>) -> String {
    match value {
        Some(text) => format!("'{text}'"),
        None => "absent".to_string(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid template: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid CSV file: {0}")]
    Validation(#[from] ValidationError),
}

/// `data_model` columns resolved against a table, ready to be scanned.
pub struct TableCheck<'t> {
    plan: Vec<(&'t Column, RuleSet)>,
}

impl TableCheck<'_> {
    /// Scans every column in `data_model` order and stops at the first
    /// failing cell.
    pub fn scan(&self) -> Result<(), ValidationError> {
        for (column, rules) in &self.plan {
            scan(column, rules)?;
            info!(column = %column.name, "column is valid");
        }
        Ok(())
    }
}

/// Runs every configuration check of `validate_table` without reading a
/// cell: format, duplicate rules, column existence and rule compilation.
pub fn prepare_table<'t>(
    table: &'t Table,
    template: &Template,
) -> Result<TableCheck<'t>, ConfigurationError> {
    if !template.format.eq_ignore_ascii_case(TABLE_FORMAT) {
        return Err(ConfigurationError::UnsupportedFormat(template.format.clone()));
    }

    let mut names = HashSet::new();
    for rule in &template.data_model {
        if !names.insert(rule.name.as_str()) {
            return Err(ConfigurationError::DuplicateColumnRule(rule.name.clone()));
        }
    }

    let plan = template
        .data_model
        .iter()
        .map(|rule| prepare(table, rule))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TableCheck { plan })
}

/// Validates every `data_model` column of the table.
pub fn validate_table(table: &Table, template: &Template) -> Result<(), SchemaError> {
    prepare_table(table, template)?.scan()?;
    Ok(())
}

/// Validates a single named column.
pub fn validate_column(table: &Table, rule: &ColumnRule) -> Result<(), SchemaError> {
    let (column, rules) = prepare(table, rule)?;
    scan(column, &rules)?;
    Ok(())
}

fn prepare<'t>(
    table: &'t Table,
    rule: &ColumnRule,
) -> Result<(&'t Column, RuleSet), ConfigurationError> {
    let column = table
        .column(&rule.name)
        .ok_or_else(|| ConfigurationError::ColumnNotFound(rule.name.clone()))?;

    let rules = RuleSet::compile(rule.rules.iter().map(|(name, value)| (name.as_str(), value)))
        .map_err(|source| ConfigurationError::MalformedRule {
            column: rule.name.clone(),
            source,
        })?;

    Ok((column, rules))
}

fn scan(column: &Column, rules: &RuleSet) -> Result<(), ValidationError> {
    for (index, cell) in column.cells.iter().enumerate() {
        if let Err(reason) = rules.evaluate_cell(cell.as_deref()) {
            debug!(column = %column.name, row = index + 1, "cell failed validation");
            return Err(ValidationError {
                column: column.name.clone(),
                row: index + 1,
                value: cell.clone(),
                reason,
            });
        }
    }
    Ok(())
}

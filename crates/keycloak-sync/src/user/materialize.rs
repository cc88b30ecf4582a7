use super::{User, UserField};
use crate::error::ConfigurationError;
use crate::table::{Column, Table};
use crate::template::{AttributePair, Mapper, MapperTarget, Template};
use std::collections::HashSet;
use tracing::debug;

/// One resolved mapper entry.
enum Step<'t> {
    Field { field: UserField, column: &'t Column },
    Attributes(Vec<(&'t str, &'t Column)>),
}

/// A mapper resolved against a table: every field name, column and custom
/// attribute has been checked, no user exists yet.
pub struct UserPlan<'t> {
    row_count: usize,
    steps: Vec<Step<'t>>,
    custom: &'t [AttributePair],
}

impl<'t> UserPlan<'t> {
    /// Resolves the template mapper against `table`.
    ///
    /// Field names are checked before any column, so an unknown field is
    /// reported whatever the table holds.
    pub fn resolve(table: &'t Table, template: &'t Template) -> Result<Self, ConfigurationError> {
        let mapper = &template.mapper;
        let fields = resolve_fields(mapper)?;

        let username_column = match mapper.get("username") {
            Some(MapperTarget::Column(name)) => lookup(table, name)?,
            _ => return Err(ConfigurationError::MissingUsernameMapping),
        };

        let mut steps = Vec::with_capacity(fields.len());
        for (entry, field) in mapper.entries().iter().zip(fields) {
            steps.push(match (&entry.target, field.is_attributes()) {
                (MapperTarget::Column(name), false) => Step::Field {
                    field,
                    column: lookup(table, name)?,
                },
                (MapperTarget::Attributes(pairs), true) => {
                    let mut columns = Vec::with_capacity(pairs.len());
                    for (index, pair) in pairs.iter().enumerate() {
                        let (key, name) = split_pair(pair)
                            .ok_or(ConfigurationError::MalformedAttributeMapping { index })?;
                        columns.push((key, lookup(table, name)?));
                    }
                    Step::Attributes(columns)
                }
                (_, is_attributes) => return Err(invalid_target(&entry.field, is_attributes)),
            });
        }

        let custom = template.custom_attributes.as_deref().unwrap_or_default();
        check_custom_attributes(custom)?;

        Ok(Self {
            row_count: username_column.cells.len(),
            steps,
            custom,
        })
    }

    /// Number of users the plan builds.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Allocates one user per row and applies every step in mapper order,
    /// then the custom attributes.
    pub fn build(&self) -> Vec<User> {
        let mut users = vec![User::default(); self.row_count];

        for step in &self.steps {
            match step {
                Step::Field { field, column } => {
                    for (user, cell) in users.iter_mut().zip(&column.cells) {
                        user.set(*field, cell.clone());
                    }
                }
                Step::Attributes(columns) => {
                    for (key, column) in columns {
                        for (user, cell) in users.iter_mut().zip(&column.cells) {
                            let attributes = user.attributes_mut();
                            if let Some(value) = cell {
                                attributes.insert((*key).to_string(), value.clone());
                            }
                        }
                    }
                }
            }
        }

        set_custom_attributes(&mut users, self.custom);
        debug!(users = users.len(), "materialized users");
        users
    }
}

/// Turns table rows into users, one per row of the `username` column.
///
/// The whole mapper is resolved against the table before any user is
/// allocated, so an unknown field or missing column never leaves half-built
/// records behind.
pub fn materialize(table: &Table, template: &Template) -> Result<Vec<User>, ConfigurationError> {
    Ok(UserPlan::resolve(table, template)?.build())
}

/// Sets every static `{key, value}` pair on every user, overwriting values
/// that came from columns.
pub fn apply_custom_attributes(
    users: &mut [User],
    pairs: &[AttributePair],
) -> Result<(), ConfigurationError> {
    check_custom_attributes(pairs)?;
    set_custom_attributes(users, pairs);
    Ok(())
}

fn set_custom_attributes(users: &mut [User], pairs: &[AttributePair]) {
    for user in users.iter_mut() {
        for pair in pairs {
            if let Some((key, value)) = split_pair(pair) {
                user.set_attribute(key, value);
            }
        }
    }
}

/// Builds one output column per mapper entry (one per pair for
/// `attributes`), in mapper order. Missing values become absent cells.
pub fn flatten(users: &[User], mapper: &Mapper) -> Result<Table, ConfigurationError> {
    let fields = resolve_fields(mapper)?;
    let mut names = HashSet::new();
    let mut columns = Vec::new();

    for (entry, field) in mapper.entries().iter().zip(fields) {
        match (&entry.target, field.is_attributes()) {
            (MapperTarget::Column(name), false) => {
                let cells = users
                    .iter()
                    .map(|user| user.get(field).map(str::to_string))
                    .collect();
                columns.push(Column::new(name.clone(), cells));
            }
            (MapperTarget::Attributes(pairs), true) => {
                for (index, pair) in pairs.iter().enumerate() {
                    let (key, name) = split_pair(pair)
                        .ok_or(ConfigurationError::MalformedAttributeMapping { index })?;
                    let cells = users
                        .iter()
                        .map(|user| user.attribute(key).map(str::to_string))
                        .collect();
                    columns.push(Column::new(name, cells));
                }
            }
            (_, is_attributes) => return Err(invalid_target(&entry.field, is_attributes)),
        }
    }

    for column in &columns {
        if !names.insert(column.name.as_str()) {
            return Err(ConfigurationError::DuplicateExportColumn(column.name.clone()));
        }
    }

    Ok(Table::from_aligned(columns, users.len()))
}

fn resolve_fields(mapper: &Mapper) -> Result<Vec<UserField>, ConfigurationError> {
    mapper
        .entries()
        .iter()
        .map(|entry| {
            UserField::from_name(&entry.field)
                .ok_or_else(|| ConfigurationError::UnknownMapperField(entry.field.clone()))
        })
        .collect()
}

fn lookup<'t>(table: &'t Table, name: &str) -> Result<&'t Column, ConfigurationError> {
    table
        .column(name)
        .ok_or_else(|| ConfigurationError::ColumnNotFound(name.to_string()))
}

fn split_pair(pair: &AttributePair) -> Option<(&str, &str)> {
    Some((pair.key.as_deref()?, pair.value.as_deref()?))
}

fn check_custom_attributes(pairs: &[AttributePair]) -> Result<(), ConfigurationError> {
    match pairs.iter().position(|pair| split_pair(pair).is_none()) {
        Some(index) => Err(ConfigurationError::MalformedCustomAttribute { index }),
        None => Ok(()),
    }
}

fn invalid_target(field: &str, is_attributes: bool) -> ConfigurationError {
    ConfigurationError::InvalidMapperTarget {
        field: field.to_string(),
        reason: if is_attributes {
            "must be a list of key/value pairs"
        } else {
            "must name a single column"
        },
    }
}

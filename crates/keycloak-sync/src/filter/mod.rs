//! Selection of remote users through a template identifier rule.
//!
//! An identifier block names one user field plus constraints in the same rule
//! language as `data_model`:
//!
//! ```yaml
//! identifier:
//!   name: role
//!   allowed: [ADMIN, VIEWER]
//! ```

mod roles;

pub use roles::RoleResolver;

use crate::directory::RemoteUser;
use crate::error::ConfigurationError;
use crate::rules::{RuleError, RuleSet};
use crate::template::{RuleScope, Template};
use tracing::debug;

/// A compiled identifier rule. Compiling once per session means a malformed
/// block is reported a single time rather than for every record.
#[derive(Debug, Clone)]
pub struct IdentifierFilter {
    field: String,
    rules: RuleSet,
}

impl IdentifierFilter {
    pub fn compile(template: &Template, scope: RuleScope) -> Result<Self, ConfigurationError> {
        Self::from_identifier(template.identifier(scope)?, scope.key())
    }

    pub fn from_identifier(
        identifier: &serde_yaml::Mapping,
        block: &'static str,
    ) -> Result<Self, ConfigurationError> {
        let field = identifier
            .get("name")
            .and_then(serde_yaml::Value::as_str)
            .ok_or(ConfigurationError::MissingIdentifierName(block))?
            .to_string();

        let mut constraints = Vec::with_capacity(identifier.len());
        for (key, value) in identifier {
            let name = key.as_str().ok_or(ConfigurationError::MalformedIdentifier {
                block,
                source: RuleError::NonStringKey,
            })?;
            if name != "name" {
                constraints.push((name, value));
            }
        }

        let rules = RuleSet::compile(constraints)
            .map_err(|source| ConfigurationError::MalformedIdentifier { block, source })?;

        Ok(Self { field, rules })
    }

    /// User field the rule tests.
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matches(&self, record: &RemoteUser) -> bool {
        match self.rules.evaluate(record.field(&self.field)) {
            Ok(()) => true,
            Err(violation) => {
                debug!(id = %record.id, field = %self.field, %violation, "user filtered out");
                false
            }
        }
    }
}

//! Declarative template documents.
//!
//! A template drives one sync, export or purge run: how the CSV file is read,
//! which rules every column must satisfy, how columns map onto user fields and
//! which identifier rules select remote users. This module only checks the
//! structural shape of the document; business meaning (valid field names,
//! existing columns, rule vocabulary) is enforced by the components that
//! consume it.

mod mapper;

pub use mapper::{AttributePair, Mapper, MapperEntry, MapperTarget};

use crate::error::ConfigurationError;
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unable to read template file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("template is not a valid document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Template {
    pub format: String,
    pub separator: String,
    #[serde(default = "HeaderSpec::first_row")]
    pub header: HeaderSpec,
    pub data_model: Vec<ColumnRule>,
    pub mapper: Mapper,
    #[serde(default)]
    pub custom_attributes: Option<Vec<AttributePair>>,
    #[serde(default)]
    pub export_rules: Option<ExportRules>,
    #[serde(default)]
    pub delete_rules: Option<RuleBlock>,
}

impl Template {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TemplateError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TemplateError> {
        Ok(serde_yaml::from_reader(reader)?)
    }

    pub fn from_yaml(document: &str) -> Result<Self, TemplateError> {
        Ok(serde_yaml::from_str(document)?)
    }

    /// Export settings, required by the export workflow.
    pub fn export_rules(&self) -> Result<&ExportRules, ConfigurationError> {
        self.export_rules
            .as_ref()
            .ok_or(ConfigurationError::MissingRuleBlock(RuleScope::Export.key()))
    }

    /// Raw identifier document of the named rule block.
    pub fn identifier(&self, scope: RuleScope) -> Result<&serde_yaml::Mapping, ConfigurationError> {
        let identifier = match scope {
            RuleScope::Export => self.export_rules()?.identifier.as_ref(),
            RuleScope::Delete => self
                .delete_rules
                .as_ref()
                .ok_or(ConfigurationError::MissingRuleBlock(scope.key()))?
                .identifier
                .as_ref(),
        };

        identifier.ok_or(ConfigurationError::MissingIdentifier(scope.key()))
    }
}

/// Named rule blocks carrying an identifier rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleScope {
    Export,
    Delete,
}

impl RuleScope {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Export => "export_rules",
            Self::Delete => "delete_rules",
        }
    }
}

/// Which row of the file holds column names, if any.
///
/// Accepts a row index, a boolean (`true` is row 0) or null. Missing keys
/// default to the first row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSpec {
    Row(usize),
    Absent,
}

impl HeaderSpec {
    pub const fn first_row() -> Self {
        Self::Row(0)
    }

    pub const fn writes_header(self) -> bool {
        matches!(self, Self::Row(_))
    }
}

impl<'de> Deserialize<'de> for HeaderSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawHeader {
            Flag(bool),
            Index(usize),
        }

        Ok(match Option::<RawHeader>::deserialize(deserializer)? {
            Some(RawHeader::Index(row)) => HeaderSpec::Row(row),
            Some(RawHeader::Flag(true)) => HeaderSpec::Row(0),
            Some(RawHeader::Flag(false)) | None => HeaderSpec::Absent,
        })
    }
}

/// One `data_model` entry: a column name plus its open set of rules.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnRule {
    pub name: String,
    #[serde(flatten)]
    pub rules: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleBlock {
    #[serde(default)]
    pub identifier: Option<serde_yaml::Mapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportRules {
    #[serde(default)]
    pub identifier: Option<serde_yaml::Mapping>,
    pub separator: String,
    #[serde(default = "HeaderSpec::first_row")]
    pub header: HeaderSpec,
    pub mapper: Mapper,
    #[serde(default)]
    pub available_roles: Vec<String>,
}

use crate::config::ConfigError;
use crate::directory::DirectoryError;
use crate::rules::RuleError;
use crate::storage::StorageError;
use crate::table::LoadError;
use crate::telemetry::TelemetryError;
use crate::template::TemplateError;
use crate::validation::SchemaError;
use crate::workflows::WorkflowError;
use std::fmt;

/// Problems with the template or its relationship to the loaded table.
///
/// Always fatal and always raised before any row or remote record is processed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("template format '{0}' is not supported, only CSV files are accepted")]
    UnsupportedFormat(String),
    #[error("data_model declares column '{0}' more than once")]
    DuplicateColumnRule(String),
    #[error("column '{0}' does not exist in the CSV file")]
    ColumnNotFound(String),
    #[error("unknown rule for column '{column}': {source}")]
    MalformedRule {
        column: String,
        #[source]
        source: RuleError,
    },
    #[error("mapper is not allowed to contain parameter: {0}")]
    UnknownMapperField(String),
    #[error("mapper entry '{field}' {reason}")]
    InvalidMapperTarget { field: String, reason: &'static str },
    #[error("mapper must designate a column for 'username'")]
    MissingUsernameMapping,
    #[error("attribute mapping #{index} must define both 'key' and 'value'")]
    MalformedAttributeMapping { index: usize },
    #[error("export mapper writes column '{0}' more than once")]
    DuplicateExportColumn(String),
    #[error("custom_attributes entry #{index} must define both 'key' and 'value'")]
    MalformedCustomAttribute { index: usize },
    #[error("template does not define the '{0}' block")]
    MissingRuleBlock(&'static str),
    #[error("'{0}' block must contain an identifier to filter users")]
    MissingIdentifier(&'static str),
    #[error("identifier in '{0}' block must contain a name")]
    MissingIdentifierName(&'static str),
    #[error("identifier in '{block}' block is invalid: {source}")]
    MalformedIdentifier {
        block: &'static str,
        #[source]
        source: RuleError,
    },
}

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Template(TemplateError),
    Load(LoadError),
    Schema(SchemaError),
    Configuration(ConfigurationError),
    Directory(DirectoryError),
    Storage(StorageError),
    Workflow(WorkflowError),
    PartialFailure { failed: usize, total: usize },
    Aborted,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Template(err) => write!(f, "template error: {}", err),
            AppError::Load(err) => write!(f, "csv error: {}", err),
            AppError::Schema(err) => write!(f, "{}", err),
            AppError::Configuration(err) => write!(f, "template configuration error: {}", err),
            AppError::Directory(err) => write!(f, "directory error: {}", err),
            AppError::Storage(err) => write!(f, "storage error: {}", err),
            AppError::Workflow(err) => write!(f, "{}", err),
            AppError::PartialFailure { failed, total } => {
                write!(f, "{failed} of {total} users could not be processed")
            }
            AppError::Aborted => write!(f, "aborted"),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Template(err) => Some(err),
            AppError::Load(err) => Some(err),
            AppError::Schema(err) => Some(err),
            AppError::Configuration(err) => Some(err),
            AppError::Directory(err) => Some(err),
            AppError::Storage(err) => Some(err),
            AppError::Workflow(err) => Some(err),
            AppError::PartialFailure { .. } | AppError::Aborted => None,
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<TemplateError> for AppError {
    fn from(value: TemplateError) -> Self {
        Self::Template(value)
    }
}

impl From<LoadError> for AppError {
    fn from(value: LoadError) -> Self {
        Self::Load(value)
    }
}

impl From<SchemaError> for AppError {
    fn from(value: SchemaError) -> Self {
        Self::Schema(value)
    }
}

impl From<ConfigurationError> for AppError {
    fn from(value: ConfigurationError) -> Self {
        Self::Configuration(value)
    }
}

impl From<DirectoryError> for AppError {
    fn from(value: DirectoryError) -> Self {
        Self::Directory(value)
    }
}

impl From<StorageError> for AppError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

impl From<WorkflowError> for AppError {
    fn from(value: WorkflowError) -> Self {
        Self::Workflow(value)
    }
}

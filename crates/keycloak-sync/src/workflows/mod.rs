//! End-to-end runs combining the template engine with the directory.
//!
//! Configuration and validation problems abort a run before the directory is
//! touched. Once remote work starts, a failure for one user is logged, counted
//! and skipped.

pub mod export;
pub mod purge;
pub mod sync;

pub use export::{ExportSummary, ExportWorkflow};
pub use purge::{PurgeSummary, PurgeWorkflow};
pub use sync::{load_users, SyncSummary, SyncWorkflow};

use crate::directory::DirectoryError;
use crate::error::ConfigurationError;
use crate::table::LoadError;
use crate::template::TemplateError;
use crate::validation::SchemaError;

#[derive(Debug)]
pub enum WorkflowError {
    Template(TemplateError),
    Load(LoadError),
    Schema(SchemaError),
    Configuration(ConfigurationError),
    Directory(DirectoryError),
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowError::Template(err) => write!(f, "failed to read template: {}", err),
            WorkflowError::Load(err) => write!(f, "failed to read or write CSV data: {}", err),
            WorkflowError::Schema(err) => write!(f, "{}", err),
            WorkflowError::Configuration(err) => write!(f, "invalid template: {}", err),
            WorkflowError::Directory(err) => write!(f, "directory unavailable: {}", err),
        }
    }
}

impl std::error::Error for WorkflowError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WorkflowError::Template(err) => Some(err),
            WorkflowError::Load(err) => Some(err),
            WorkflowError::Schema(err) => Some(err),
            WorkflowError::Configuration(err) => Some(err),
            WorkflowError::Directory(err) => Some(err),
        }
    }
}

impl From<TemplateError> for WorkflowError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}

impl From<LoadError> for WorkflowError {
    fn from(err: LoadError) -> Self {
        Self::Load(err)
    }
}

impl From<SchemaError> for WorkflowError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(err)
    }
}

impl From<ConfigurationError> for WorkflowError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<DirectoryError> for WorkflowError {
    fn from(err: DirectoryError) -> Self {
        Self::Directory(err)
    }
}

use super::WorkflowError;
use crate::directory::{DirectoryError, DirectoryGateway};
use crate::table::Table;
use crate::template::Template;
use crate::user::{User, UserPlan};
use crate::validation::{prepare_table, SchemaError};
use std::path::Path;
use tracing::{info, warn};

/// Outcome of pushing users to the directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub applied: usize,
    pub failed: usize,
}

impl SyncSummary {
    pub fn total(&self) -> usize {
        self.applied + self.failed
    }
}

/// Loads, validates and materializes a CSV file. No remote call is made.
///
/// Both the `data_model` and the mapper are resolved against the table
/// before the first cell is validated.
pub fn load_users<P: AsRef<Path>>(
    csv_path: P,
    template: &Template,
) -> Result<Vec<User>, WorkflowError> {
    let table = Table::load(csv_path, &template.separator, template.header)?;
    info!(
        rows = table.row_count(),
        columns = table.columns().len(),
        "csv file loaded"
    );

    let check = prepare_table(&table, template).map_err(SchemaError::from)?;
    let plan = UserPlan::resolve(&table, template).map_err(SchemaError::from)?;
    check.scan().map_err(SchemaError::from)?;

    Ok(plan.build())
}

#[derive(Debug)]
pub struct SyncWorkflow<'a> {
    directory: &'a dyn DirectoryGateway,
}

impl<'a> SyncWorkflow<'a> {
    pub fn new(directory: &'a dyn DirectoryGateway) -> Self {
        Self { directory }
    }

    pub fn run<P: AsRef<Path>>(
        &self,
        csv_path: P,
        template: &Template,
    ) -> Result<SyncSummary, WorkflowError> {
        let users = load_users(csv_path, template)?;
        Ok(self.apply(&users))
    }

    /// Creates or replaces every user, then assigns its role when one is set.
    pub fn apply(&self, users: &[User]) -> SyncSummary {
        let mut summary = SyncSummary::default();

        for user in users {
            match self.apply_one(user) {
                Ok(()) => summary.applied += 1,
                Err(err) => {
                    warn!(
                        username = user.username.as_deref().unwrap_or("<none>"),
                        error = %err,
                        "unable to synchronize user"
                    );
                    summary.failed += 1;
                }
            }
        }

        info!(applied = summary.applied, failed = summary.failed, "sync finished");
        summary
    }

    fn apply_one(&self, user: &User) -> Result<(), DirectoryError> {
        self.directory.create_or_replace(user)?;
        if let (Some(username), Some(role)) = (user.username.as_deref(), user.role.as_deref()) {
            self.directory.assign_role(username, role)?;
        }
        Ok(())
    }
}

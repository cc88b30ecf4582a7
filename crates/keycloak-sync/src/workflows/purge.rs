use super::WorkflowError;
use crate::directory::{DirectoryGateway, RemoteUser};
use crate::filter::IdentifierFilter;
use crate::template::{RuleScope, Template};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeSummary {
    pub scanned: usize,
    pub deleted: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct PurgeWorkflow<'a> {
    directory: &'a dyn DirectoryGateway,
}

impl<'a> PurgeWorkflow<'a> {
    pub fn new(directory: &'a dyn DirectoryGateway) -> Self {
        Self { directory }
    }

    /// Deletes the users selected by the `delete_rules` identifier.
    pub fn run(&self, template: &Template) -> Result<PurgeSummary, WorkflowError> {
        let filter = IdentifierFilter::compile(template, RuleScope::Delete)?;
        info!(field = filter.field(), "purging users");
        self.delete_matching(|record| filter.matches(record))
    }

    /// Deletes every user of the realm.
    pub fn drop_all(&self) -> Result<PurgeSummary, WorkflowError> {
        warn!("deleting every user of the realm");
        self.delete_matching(|_| true)
    }

    fn delete_matching<F>(&self, selected: F) -> Result<PurgeSummary, WorkflowError>
    where
        F: Fn(&RemoteUser) -> bool,
    {
        let mut summary = PurgeSummary::default();

        for record in self.directory.list_all()? {
            summary.scanned += 1;
            if !selected(&record) {
                continue;
            }

            let Some(username) = record.username() else {
                warn!(id = %record.id, "user has no username, skipping");
                summary.failed += 1;
                continue;
            };

            match self.directory.delete(username) {
                Ok(()) => summary.deleted += 1,
                Err(err) => {
                    warn!(username, error = %err, "unable to delete user");
                    summary.failed += 1;
                }
            }
        }

        info!(
            deleted = summary.deleted,
            failed = summary.failed,
            scanned = summary.scanned,
            "purge finished"
        );
        Ok(summary)
    }
}

use super::WorkflowError;
use crate::directory::DirectoryGateway;
use crate::filter::{IdentifierFilter, RoleResolver};
use crate::template::{RuleScope, Template};
use crate::user::{flatten, User};
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Remote users enumerated.
    pub scanned: usize,
    /// Users matching the identifier rule and written out.
    pub exported: usize,
    /// Users dropped because a lookup failed.
    pub skipped: usize,
}

#[derive(Debug)]
pub struct ExportWorkflow<'a> {
    directory: &'a dyn DirectoryGateway,
}

impl<'a> ExportWorkflow<'a> {
    pub fn new(directory: &'a dyn DirectoryGateway) -> Self {
        Self { directory }
    }

    pub fn run<P: AsRef<Path>>(
        &self,
        template: &Template,
        output: P,
    ) -> Result<ExportSummary, WorkflowError> {
        let rules = template.export_rules()?;
        let (users, summary) = self.collect(template)?;

        let table = flatten(&users, &rules.mapper)?;
        table.save(output.as_ref(), &rules.separator, rules.header.writes_header())?;
        info!(path = %output.as_ref().display(), users = summary.exported, "export written");
        Ok(summary)
    }

    /// Same as [`ExportWorkflow::run`] but serializes into `writer`.
    pub fn write<W: Write>(
        &self,
        template: &Template,
        writer: W,
    ) -> Result<ExportSummary, WorkflowError> {
        let rules = template.export_rules()?;
        let (users, summary) = self.collect(template)?;

        let table = flatten(&users, &rules.mapper)?;
        table.write(writer, &rules.separator, rules.header.writes_header())?;
        Ok(summary)
    }

    /// Enumerates the directory and returns the users selected by the
    /// `export_rules` identifier, with their resolved role.
    pub fn collect(
        &self,
        template: &Template,
    ) -> Result<(Vec<User>, ExportSummary), WorkflowError> {
        let rules = template.export_rules()?;
        let filter = IdentifierFilter::compile(template, RuleScope::Export)?;
        // reject a broken export mapper before any remote call
        flatten(&[], &rules.mapper)?;
        info!(field = filter.field(), "exporting users");

        let mut resolver = RoleResolver::new(self.directory, &rules.available_roles);
        let mut summary = ExportSummary::default();
        let mut users = Vec::new();

        for listed in self.directory.list_all()? {
            summary.scanned += 1;

            let record = match self.directory.fetch(&listed.id) {
                Ok(record) => record,
                Err(err) => {
                    warn!(id = %listed.id, error = %err, "unable to fetch user, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };

            if !filter.matches(&record) {
                continue;
            }

            let role = match resolver.resolve(&record.id) {
                Ok(role) => role,
                Err(err) => {
                    warn!(id = %record.id, error = %err, "unable to resolve role, skipping");
                    summary.skipped += 1;
                    continue;
                }
            };

            let user = record.to_user(role);
            info!(username = user.username.as_deref().unwrap_or("<none>"), "user selected");
            users.push(user);
            summary.exported += 1;
        }

        Ok((users, summary))
    }
}

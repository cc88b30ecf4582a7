use crate::cli::{DropAllArgs, ExportArgs, PurgeArgs, SyncArgs, ValidateArgs};
use keycloak_sync::config::{AppConfig, ConfigError, KeycloakSettings};
use keycloak_sync::directory::KeycloakClient;
use keycloak_sync::error::AppError;
use keycloak_sync::storage::{GcsStorage, StagingArea};
use keycloak_sync::template::Template;
use keycloak_sync::workflows::{load_users, ExportWorkflow, PurgeWorkflow, SyncWorkflow};
use std::path::Path;
use tracing::info;

const DROP_ALL_CONFIRMATION: &str = "DELETE";

pub(crate) fn run_sync(args: SyncArgs, mut config: AppConfig) -> Result<(), AppError> {
    let SyncArgs {
        file,
        template,
        connection,
        bucket,
    } = args;
    connection.apply(&mut config.keycloak);
    let download = bucket.apply(&mut config.storage);

    // keeps downloaded inputs alive until the run ends
    let staging;
    let (csv_path, template_path) = if download {
        let bucket_name = config
            .storage
            .bucket_name
            .as_deref()
            .ok_or(ConfigError::Missing("BUCKET_NAME"))?;
        let prefix = config.storage.bucket_path.as_deref();
        let storage = GcsStorage::new(config.storage.access_token.clone())?;

        staging = StagingArea::new()?;
        (
            staging.fetch(&storage, bucket_name, prefix, &path_name(&file))?,
            staging.fetch(&storage, bucket_name, prefix, &path_name(&template))?,
        )
    } else {
        (file, template)
    };

    let template = Template::load(&template_path)?;
    let users = load_users(&csv_path, &template)?;
    info!(users = users.len(), "csv file is valid");

    let client = connect(&config.keycloak)?;
    let summary = SyncWorkflow::new(&client).apply(&users);

    println!("Total update/add users: {}", summary.applied);
    if summary.failed > 0 {
        println!("Failed users: {}", summary.failed);
        return Err(AppError::PartialFailure {
            failed: summary.failed,
            total: summary.total(),
        });
    }
    Ok(())
}

pub(crate) fn run_export(args: ExportArgs, mut config: AppConfig) -> Result<(), AppError> {
    args.connection.apply(&mut config.keycloak);
    let template = Template::load(&args.template)?;
    template.export_rules()?;

    let client = connect(&config.keycloak)?;
    let summary = ExportWorkflow::new(&client).run(&template, &args.output)?;

    println!("Total export users: {}", summary.exported);
    if summary.skipped > 0 {
        println!("Skipped users: {}", summary.skipped);
    }
    Ok(())
}

pub(crate) fn run_purge(args: PurgeArgs, mut config: AppConfig) -> Result<(), AppError> {
    args.connection.apply(&mut config.keycloak);
    let template = Template::load(&args.template)?;

    let client = connect(&config.keycloak)?;
    let summary = PurgeWorkflow::new(&client).run(&template)?;
    report_deletions(summary.deleted, summary.failed)
}

pub(crate) fn run_drop_all(args: DropAllArgs, mut config: AppConfig) -> Result<(), AppError> {
    if !confirmed(&args.confirm) {
        eprintln!("refusing to delete every user: pass --confirm {DROP_ALL_CONFIRMATION}");
        return Err(AppError::Aborted);
    }
    args.connection.apply(&mut config.keycloak);

    let client = connect(&config.keycloak)?;
    let summary = PurgeWorkflow::new(&client).drop_all()?;
    report_deletions(summary.deleted, summary.failed)
}

pub(crate) fn run_validate(args: ValidateArgs) -> Result<(), AppError> {
    let template = Template::load(&args.template)?;
    let users = load_users(&args.file, &template)?;
    println!("Total valid users: {}", users.len());
    Ok(())
}

fn connect(settings: &KeycloakSettings) -> Result<KeycloakClient, AppError> {
    Ok(KeycloakClient::connect(settings.connection()?)?)
}

fn report_deletions(deleted: usize, failed: usize) -> Result<(), AppError> {
    println!("Total delete users: {deleted}");
    if failed > 0 {
        println!("Failed users: {failed}");
        return Err(AppError::PartialFailure {
            failed,
            total: deleted + failed,
        });
    }
    Ok(())
}

fn confirmed(answer: &str) -> bool {
    answer == DROP_ALL_CONFIRMATION
}

fn path_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const TEMPLATE: &str = r"format: csv
separator: ';'
header: 0
data_model:
  - name: Mail
    type: string
    regex: '\S+@\S+'
  - name: Age
    type: integer
    nullable: true
mapper:
  username: Mail
  email: Mail
";

    #[test]
    fn validate_accepts_a_conforming_file() {
        let dir = tempdir().expect("tempdir");
        let template = dir.path().join("template.yaml");
        let csv = dir.path().join("users.csv");
        fs::write(&template, TEMPLATE).expect("template written");
        fs::write(&csv, "Mail;Age\nalice@acme.com;31\nbob@acme.com;\n").expect("csv written");

        run_validate(ValidateArgs {
            file: csv,
            template,
        })
        .expect("file is valid");
    }

    #[test]
    fn validate_reports_the_failing_row() {
        let dir = tempdir().expect("tempdir");
        let template = dir.path().join("template.yaml");
        let csv = dir.path().join("users.csv");
        fs::write(&template, TEMPLATE).expect("template written");
        fs::write(&csv, "Mail;Age\nalice@acme.com;31\nbob@acme.com;old\n").expect("csv written");

        let error = run_validate(ValidateArgs {
            file: csv,
            template,
        })
        .expect_err("Age is not an integer");
        let message = error.to_string();
        assert!(message.contains("Age"), "{message}");
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn drop_all_confirmation_is_exact() {
        assert!(confirmed("DELETE"));
        assert!(!confirmed("delete"));
        assert!(!confirmed("yes"));
    }

    #[test]
    fn partial_failures_exit_non_zero() {
        assert!(report_deletions(3, 0).is_ok());
        assert!(matches!(
            report_deletions(2, 1),
            Err(AppError::PartialFailure { failed: 1, total: 3 })
        ));
    }
}

use crate::commands::{run_drop_all, run_export, run_purge, run_sync, run_validate};
use clap::{Args, Parser, Subcommand};
use keycloak_sync::config::{AppConfig, KeycloakSettings, StorageSettings};
use keycloak_sync::error::AppError;
use keycloak_sync::telemetry;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "kcsync",
    about = "Synchronize, export and purge Keycloak users from template-driven CSV files",
    version
)]
pub(crate) struct Cli {
    /// Log at debug level
    #[arg(long, global = true)]
    pub(crate) debug: bool,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create or replace users described by a CSV file
    Sync(SyncArgs),
    /// Write the users selected by export_rules to a CSV file
    Export(ExportArgs),
    /// Delete the users selected by delete_rules
    Purge(PurgeArgs),
    /// Delete every user of the realm
    DropAll(DropAllArgs),
    /// Check a CSV file against a template without contacting Keycloak
    Validate(ValidateArgs),
}

/// Keycloak connection overrides; unset flags fall back to the environment.
#[derive(Args, Debug, Default)]
pub(crate) struct ConnectionArgs {
    /// Keycloak server url
    #[arg(long = "kc-url")]
    pub(crate) server_url: Option<String>,
    /// Keycloak realm name
    #[arg(long = "kc-realm")]
    pub(crate) realm_name: Option<String>,
    /// Keycloak client id
    #[arg(long = "kc-clt")]
    pub(crate) client_id: Option<String>,
    /// Keycloak client secret
    #[arg(long = "kc-clt-sct")]
    pub(crate) client_secret: Option<String>,
}

impl ConnectionArgs {
    pub(crate) fn apply(self, settings: &mut KeycloakSettings) {
        override_with(&mut settings.server_url, self.server_url);
        override_with(&mut settings.realm_name, self.realm_name);
        override_with(&mut settings.client_id, self.client_id);
        override_with(&mut settings.client_secret, self.client_secret);
    }
}

#[derive(Args, Debug, Default)]
pub(crate) struct BucketArgs {
    /// Cloud Storage bucket holding the CSV and template files
    #[arg(long = "bk-name")]
    pub(crate) bucket_name: Option<String>,
    /// Folder inside the bucket
    #[arg(long = "bk-path")]
    pub(crate) bucket_path: Option<String>,
    /// Download inputs from the bucket configured in the environment
    #[arg(long)]
    pub(crate) from_bucket: bool,
}

impl BucketArgs {
    /// Applies overrides and tells whether inputs must be downloaded.
    pub(crate) fn apply(self, settings: &mut StorageSettings) -> bool {
        let requested = self.from_bucket || self.bucket_name.is_some();
        override_with(&mut settings.bucket_name, self.bucket_name);
        override_with(&mut settings.bucket_path, self.bucket_path);
        requested
    }
}

fn override_with(target: &mut Option<String>, value: Option<String>) {
    if let Some(value) = value.filter(|value| !value.trim().is_empty()) {
        *target = Some(value);
    }
}

#[derive(Args, Debug)]
pub(crate) struct SyncArgs {
    /// CSV file (a name inside the bucket folder when downloading)
    #[arg(short = 'f', long = "file")]
    pub(crate) file: PathBuf,
    /// Template file
    #[arg(short = 'v', long = "template")]
    pub(crate) template: PathBuf,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
    #[command(flatten)]
    pub(crate) bucket: BucketArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ExportArgs {
    /// Template file
    #[arg(short = 'v', long = "template")]
    pub(crate) template: PathBuf,
    /// Destination CSV file
    #[arg(short = 'o', long = "output", default_value = "./output.csv")]
    pub(crate) output: PathBuf,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct PurgeArgs {
    /// Template file
    #[arg(short = 'v', long = "template")]
    pub(crate) template: PathBuf,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct DropAllArgs {
    /// Must be DELETE
    #[arg(long)]
    pub(crate) confirm: String,
    #[command(flatten)]
    pub(crate) connection: ConnectionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateArgs {
    /// CSV file
    #[arg(short = 'f', long = "file")]
    pub(crate) file: PathBuf,
    /// Template file
    #[arg(short = 'v', long = "template")]
    pub(crate) template: PathBuf,
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    if cli.debug {
        config.telemetry.log_level = "debug".to_string();
    }
    telemetry::init(&config.telemetry)?;
    debug!(environment = ?config.environment, "configuration loaded");

    match cli.command {
        Command::Sync(args) => run_sync(args, config),
        Command::Export(args) => run_export(args, config),
        Command::Purge(args) => run_purge(args, config),
        Command::DropAll(args) => run_drop_all(args, config),
        Command::Validate(args) => run_validate(args),
    }
}

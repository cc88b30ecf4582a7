mod cli;
mod commands;

use keycloak_sync::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}

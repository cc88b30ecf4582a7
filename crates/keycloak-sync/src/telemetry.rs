use crate::config::TelemetryConfig;
use std::env;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

/// Variable holding a full `tracing` directive list; it overrides the level.
const FILTER_VAR: &str = "RUST_LOG";
const LEVEL_VAR: &str = "KCSYNC_LOG_LEVEL";

#[derive(Debug)]
pub enum TelemetryError {
    /// The log filter read from `variable` does not parse.
    InvalidFilter {
        variable: &'static str,
        value: String,
        source: ParseError,
    },
    AlreadyInstalled(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::InvalidFilter {
                variable,
                value,
                source,
            } => write!(f, "{variable}='{value}' is not a valid log filter: {source}"),
            TelemetryError::AlreadyInstalled(err) => {
                write!(f, "kcsync logging is already initialized: {err}")
            }
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::InvalidFilter { source, .. } => Some(source),
            TelemetryError::AlreadyInstalled(err) => Some(&**err),
        }
    }
}

/// Installs the stderr subscriber. A non-empty `RUST_LOG` wins over the
/// configured `KCSYNC_LOG_LEVEL`; a malformed value in either is an error.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match env::var(FILTER_VAR) {
        Ok(directives) if !directives.trim().is_empty() => build_filter(FILTER_VAR, &directives)?,
        _ => build_filter(LEVEL_VAR, &config.log_level)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(TelemetryError::AlreadyInstalled)
}

fn build_filter(variable: &'static str, directives: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directives).map_err(|source| TelemetryError::InvalidFilter {
        variable,
        value: directives.to_string(),
        source,
    })
}

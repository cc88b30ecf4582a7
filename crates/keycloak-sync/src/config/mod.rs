use std::env;
use std::fmt;

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the tool.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub keycloak: KeycloakSettings,
    pub storage: StorageSettings,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("KCSYNC_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let keycloak = KeycloakSettings {
            server_url: optional_var("KEYCLOAK_SERVER_URL"),
            realm_name: optional_var("KEYCLOAK_REALM_NAME"),
            client_id: optional_var("KEYCLOAK_CLIENT_ID"),
            client_secret: optional_var("KEYCLOAK_CLIENT_SECRET"),
        };

        let storage = StorageSettings {
            bucket_name: optional_var("BUCKET_NAME"),
            bucket_path: optional_var("BUCKET_PATH"),
            access_token: optional_var("GCS_ACCESS_TOKEN"),
        };

        let log_level = env::var("KCSYNC_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());

        Ok(Self {
            environment,
            keycloak,
            storage,
            telemetry: TelemetryConfig { log_level },
        })
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Connection values for the Keycloak admin API. Each may come from the
/// environment or a command-line override.
#[derive(Debug, Clone, Default)]
pub struct KeycloakSettings {
    pub server_url: Option<String>,
    pub realm_name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl KeycloakSettings {
    pub fn connection(&self) -> Result<KeycloakConnection, ConfigError> {
        Ok(KeycloakConnection {
            server_url: required(&self.server_url, "KEYCLOAK_SERVER_URL")?,
            realm_name: required(&self.realm_name, "KEYCLOAK_REALM_NAME")?,
            client_id: required(&self.client_id, "KEYCLOAK_CLIENT_ID")?,
            client_secret: required(&self.client_secret, "KEYCLOAK_CLIENT_SECRET")?,
        })
    }
}

fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value.clone().ok_or(ConfigError::Missing(name))
}

/// Fully resolved connection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeycloakConnection {
    pub server_url: String,
    pub realm_name: String,
    pub client_id: String,
    pub client_secret: String,
}

/// Bucket used to stage CSV and template files before a sync.
#[derive(Debug, Clone, Default)]
pub struct StorageSettings {
    pub bucket_name: Option<String>,
    pub bucket_path: Option<String>,
    pub access_token: Option<String>,
}

/// Logging controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(name) => {
                write!(f, "{name} must be set in the environment or on the command line")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for name in [
            "KCSYNC_ENV",
            "KCSYNC_LOG_LEVEL",
            "KEYCLOAK_SERVER_URL",
            "KEYCLOAK_REALM_NAME",
            "KEYCLOAK_CLIENT_ID",
            "KEYCLOAK_CLIENT_SECRET",
            "BUCKET_NAME",
            "BUCKET_PATH",
            "GCS_ACCESS_TOKEN",
        ] {
            env::remove_var(name);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.telemetry.log_level, "warn");
        assert!(config.keycloak.server_url.is_none());
        assert!(config.storage.bucket_name.is_none());
    }

    #[test]
    fn connection_reports_first_missing_variable() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("KEYCLOAK_SERVER_URL", "https://sso.example.com/auth/");
        env::set_var("KEYCLOAK_REALM_NAME", "staff");
        let config = AppConfig::load().expect("config loads");

        match config.keycloak.connection() {
            Err(ConfigError::Missing(name)) => assert_eq!(name, "KEYCLOAK_CLIENT_ID"),
            other => panic!("expected missing client id, got {other:?}"),
        }
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("BUCKET_NAME", "   ");
        env::set_var("KCSYNC_ENV", "prod");
        let config = AppConfig::load().expect("config loads");
        assert!(config.storage.bucket_name.is_none());
        assert_eq!(config.environment, AppEnvironment::Production);
    }
}

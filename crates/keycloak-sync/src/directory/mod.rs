//! Directory service boundary.
//!
//! Workflows only see [`DirectoryGateway`]; the Keycloak admin REST client
//! lives in [`keycloak`].

pub mod keycloak;

pub use keycloak::KeycloakClient;

use crate::user::User;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("unable to connect to the directory server: {0}")]
    Connection(String),
    #[error("directory authentication failed: {0}")]
    Authentication(String),
    #[error("user {0} does not exist")]
    UserNotFound(String),
    #[error("user record has no username")]
    MissingUsername,
    #[error("role {0} does not exist in realm")]
    RoleNotFound(String),
    #[error("directory request {operation} failed with status {status}: {message}")]
    Request {
        operation: &'static str,
        status: u16,
        message: String,
    },
    #[error("unexpected directory response: {0}")]
    InvalidResponse(String),
    #[error("directory runtime unavailable: {0}")]
    Runtime(String),
}

/// Operations the sync, export and purge workflows need from the directory.
pub trait DirectoryGateway: Debug {
    /// Creates the user, deleting any existing account with the same username
    /// first.
    fn create_or_replace(&self, user: &User) -> Result<(), DirectoryError>;
    fn delete(&self, username: &str) -> Result<(), DirectoryError>;
    fn list_all(&self) -> Result<Vec<RemoteUser>, DirectoryError>;
    fn fetch(&self, id: &str) -> Result<RemoteUser, DirectoryError>;
    fn assign_role(&self, username: &str, role: &str) -> Result<(), DirectoryError>;
    fn role_members(&self, role: &str) -> Result<Vec<RemoteUser>, DirectoryError>;
}

/// A user record as returned by the directory, kept as a JSON object so
/// identifier rules can address any of its fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteUser {
    pub id: String,
    pub document: Map<String, Value>,
}

impl RemoteUser {
    pub fn from_document(document: Value) -> Result<Self, DirectoryError> {
        let Value::Object(document) = document else {
            return Err(DirectoryError::InvalidResponse(
                "user representation is not an object".to_string(),
            ));
        };
        let id = document
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| DirectoryError::InvalidResponse("user without id".to_string()))?
            .to_string();
        Ok(Self { id, document })
    }

    /// Field value, `Null` when the record does not carry it.
    pub fn field(&self, name: &str) -> &Value {
        self.document.get(name).unwrap_or(&Value::Null)
    }

    pub fn username(&self) -> Option<&str> {
        self.text("username")
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.document.get(name).and_then(Value::as_str)
    }

    /// Converts the record into a [`User`] for export. Multi-valued
    /// attributes are concatenated and the creation timestamp is rendered as
    /// `DD/MM/YY`.
    pub fn to_user(&self, role: Option<String>) -> User {
        let attributes = self
            .document
            .get("attributes")
            .and_then(Value::as_object)
            .map(|attributes| {
                attributes
                    .iter()
                    .map(|(key, value)| (key.clone(), join_values(value)))
                    .collect()
            });

        let createdtime = self
            .document
            .get("createdTimestamp")
            .and_then(Value::as_i64)
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|created| created.format("%d/%m/%y").to_string());

        User {
            email: self.text("email").map(str::to_string),
            username: self.text("username").map(str::to_string),
            firstname: self.text("firstName").map(str::to_string),
            lastname: self.text("lastName").map(str::to_string),
            role,
            createdtime,
            attributes,
            ..User::default()
        }
    }
}

fn join_values(value: &Value) -> String {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

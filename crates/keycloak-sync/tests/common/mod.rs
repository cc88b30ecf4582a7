#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use keycloak_sync::directory::{DirectoryError, DirectoryGateway, RemoteUser};
use keycloak_sync::user::User;
use serde_json::{json, Value};
use tempfile::TempDir;

/// In-memory directory recording every mutating call.
#[derive(Debug, Default)]
pub struct FakeDirectory {
    records: Vec<Value>,
    role_members: HashMap<String, Vec<String>>,
    failing_usernames: HashSet<String>,
    failing_fetches: HashSet<String>,
    broken_roles: HashSet<String>,
    pub created: Mutex<Vec<User>>,
    pub deleted: Mutex<Vec<String>>,
    pub assigned: Mutex<Vec<(String, String)>>,
    pub role_lookups: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, id: &str, username: &str, extra: Value) -> Self {
        let mut document = json!({
            "id": id,
            "username": username,
            "email": format!("{username}@acme.com"),
            "firstName": username.to_uppercase(),
            "lastName": "Doe",
            "createdTimestamp": 1_709_251_200_000_i64,
        });
        if let (Some(target), Value::Object(extra)) = (document.as_object_mut(), extra) {
            target.extend(extra);
        }
        self.records.push(document);
        self
    }

    pub fn with_role(mut self, role: &str, members: &[&str]) -> Self {
        self.role_members.insert(
            role.to_string(),
            members.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn failing_for(mut self, username: &str) -> Self {
        self.failing_usernames.insert(username.to_string());
        self
    }

    pub fn failing_fetch(mut self, id: &str) -> Self {
        self.failing_fetches.insert(id.to_string());
        self
    }

    pub fn broken_role(mut self, role: &str) -> Self {
        self.broken_roles.insert(role.to_string());
        self
    }

    pub fn created_usernames(&self) -> Vec<String> {
        self.created
            .lock()
            .expect("created mutex")
            .iter()
            .filter_map(|user| user.username.clone())
            .collect()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("deleted mutex").clone()
    }

    pub fn assigned(&self) -> Vec<(String, String)> {
        self.assigned.lock().expect("assigned mutex").clone()
    }

    fn unavailable(operation: &'static str) -> DirectoryError {
        DirectoryError::Request {
            operation,
            status: 500,
            message: "unavailable".to_string(),
        }
    }
}

impl DirectoryGateway for FakeDirectory {
    fn create_or_replace(&self, user: &User) -> Result<(), DirectoryError> {
        let username = user.username.as_deref().ok_or(DirectoryError::MissingUsername)?;
        if self.failing_usernames.contains(username) {
            return Err(Self::unavailable("create user"));
        }
        self.created.lock().expect("created mutex").push(user.clone());
        Ok(())
    }

    fn delete(&self, username: &str) -> Result<(), DirectoryError> {
        if self.failing_usernames.contains(username) {
            return Err(Self::unavailable("delete user"));
        }
        self.deleted
            .lock()
            .expect("deleted mutex")
            .push(username.to_string());
        Ok(())
    }

    fn list_all(&self) -> Result<Vec<RemoteUser>, DirectoryError> {
        self.records
            .iter()
            .map(|record| {
                RemoteUser::from_document(json!({
                    "id": record["id"],
                    "username": record["username"],
                }))
            })
            .collect()
    }

    fn fetch(&self, id: &str) -> Result<RemoteUser, DirectoryError> {
        if self.failing_fetches.contains(id) {
            return Err(Self::unavailable("get user"));
        }
        self.records
            .iter()
            .find(|record| record["id"] == id)
            .cloned()
            .ok_or_else(|| DirectoryError::UserNotFound(id.to_string()))
            .and_then(RemoteUser::from_document)
    }

    fn assign_role(&self, username: &str, role: &str) -> Result<(), DirectoryError> {
        if self.broken_roles.contains(role) {
            return Err(DirectoryError::RoleNotFound(role.to_string()));
        }
        self.assigned
            .lock()
            .expect("assigned mutex")
            .push((username.to_string(), role.to_string()));
        Ok(())
    }

    fn role_members(&self, role: &str) -> Result<Vec<RemoteUser>, DirectoryError> {
        self.role_lookups
            .lock()
            .expect("lookups mutex")
            .push(role.to_string());
        if self.broken_roles.contains(role) {
            return Err(DirectoryError::RoleNotFound(role.to_string()));
        }
        self.role_members
            .get(role)
            .into_iter()
            .flatten()
            .map(|id| RemoteUser::from_document(json!({"id": id})))
            .collect()
    }
}

/// Writes fixture files into a temporary directory.
pub struct Fixtures {
    dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).expect("fixture written");
        path
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

pub const SYNC_TEMPLATE: &str = r#"
format: CSV
separator: ";"
header: 0
data_model:
  - name: Mail
    type: string
    regex: '[^@\s]+@[^@\s]+'
  - name: Prenom
    type: string
  - name: Nom
    type: string
    nullable: true
  - name: Profil
    type: string
    allowed: [ADMIN, EDITOR, VIEWER]
    nullable: true
  - name: Agence
    type: string
    nullable: true
mapper:
  username: Mail
  email: Mail
  firstname: Prenom
  lastname: Nom
  role: Profil
  attributes:
    - key: agency
      value: Agence
custom_attributes:
  - key: source
    value: kcsync
export_rules:
  identifier:
    name: email
    regex: '.*@acme\.com'
  separator: ","
  header: true
  mapper:
    username: Login
    role: Role
    createdtime: Created
    attributes:
      - key: agency
        value: Agency
  available_roles: [ADMIN, EDITOR, VIEWER]
delete_rules:
  identifier:
    name: username
    regex: 'tmp-.*'
"#;

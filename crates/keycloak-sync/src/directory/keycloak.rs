use super::{DirectoryError, DirectoryGateway, RemoteUser};
use crate::config::KeycloakConnection;
use crate::user::User;
use indexmap::IndexMap;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

const PAGE_SIZE: usize = 100;
const TOKEN_MARGIN: Duration = Duration::from_secs(30);

/// Keycloak admin REST client authenticated with client credentials.
///
/// Requests run on a private runtime so callers stay synchronous.
pub struct KeycloakClient {
    connection: KeycloakConnection,
    base: Url,
    http: Client,
    runtime: Runtime,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expiry")]
    expires_in: u64,
}

fn default_expiry() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RoleRepresentation {
    id: String,
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NewUser<'a> {
    username: &'a str,
    enabled: bool,
    email_verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    attributes: Option<IndexMap<&'a str, [&'a str; 1]>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    credentials: Vec<Credential<'a>>,
}

#[derive(Serialize)]
struct Credential<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
    temporary: bool,
}

impl<'a> NewUser<'a> {
    fn from_user(username: &'a str, user: &'a User) -> Self {
        Self {
            username,
            enabled: true,
            email_verified: true,
            email: user.email.as_deref(),
            first_name: user.firstname.as_deref(),
            last_name: user.lastname.as_deref(),
            attributes: user.attributes.as_ref().map(|attributes| {
                attributes
                    .iter()
                    .map(|(key, value)| (key.as_str(), [value.as_str()]))
                    .collect()
            }),
            credentials: user
                .password
                .as_deref()
                .map(|value| Credential {
                    kind: "password",
                    value,
                    temporary: false,
                })
                .into_iter()
                .collect(),
        }
    }
}

impl KeycloakClient {
    /// Builds the client and authenticates once so that bad credentials or an
    /// unreachable server surface before any user is processed.
    pub fn connect(connection: KeycloakConnection) -> Result<Self, DirectoryError> {
        let runtime = Runtime::new().map_err(|err| DirectoryError::Runtime(err.to_string()))?;
        let base = Url::parse(connection.server_url.trim_end_matches('/')).map_err(|err| {
            DirectoryError::Connection(format!("{}: {err}", connection.server_url))
        })?;

        let client = Self {
            connection,
            base,
            http: Client::new(),
            runtime,
            token: Mutex::new(None),
        };
        client.runtime.block_on(client.bearer())?;
        info!(realm = %client.connection.realm_name, "connected to keycloak");
        Ok(client)
    }

    fn url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Connection(self.connection.server_url.clone()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn admin_url(&self, segments: &[&str]) -> Result<Url, DirectoryError> {
        let mut path = vec!["admin", "realms", self.connection.realm_name.as_str()];
        path.extend_from_slice(segments);
        self.url(&path)
    }

    async fn bearer(&self) -> Result<String, DirectoryError> {
        let cached = self
            .token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = cached {
            if token.expires_at > Instant::now() + TOKEN_MARGIN {
                return Ok(token.value);
            }
        }

        let url = self.url(&[
            "realms",
            self.connection.realm_name.as_str(),
            "protocol",
            "openid-connect",
            "token",
        ])?;
        let response = self
            .http
            .post(url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.connection.client_id.as_str()),
                ("client_secret", self.connection.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|err| DirectoryError::Connection(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DirectoryError::Authentication(format!("{status}: {body}")));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|err| DirectoryError::InvalidResponse(err.to_string()))?;
        debug!(expires_in = token.expires_in, "obtained access token");

        let fresh = AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        };
        let value = fresh.value.clone();
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        Ok(value)
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<Response, DirectoryError> {
        let token = self.bearer().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|err| DirectoryError::Connection(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(DirectoryError::Request {
            operation,
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
    ) -> Result<T, DirectoryError> {
        self.execute(operation, request)
            .await?
            .json()
            .await
            .map_err(|err| DirectoryError::InvalidResponse(err.to_string()))
    }

    async fn find_user_id(&self, username: &str) -> Result<Option<String>, DirectoryError> {
        let request = self
            .http
            .get(self.admin_url(&["users"])?)
            .query(&[("username", username), ("exact", "true")]);
        let candidates: Vec<Value> = self.get_json("find user", request).await?;

        for candidate in candidates {
            let remote = RemoteUser::from_document(candidate)?;
            if remote
                .username()
                .is_some_and(|name| name.eq_ignore_ascii_case(username))
            {
                return Ok(Some(remote.id));
            }
        }
        Ok(None)
    }

    async fn require_user_id(&self, username: &str) -> Result<String, DirectoryError> {
        self.find_user_id(username)
            .await?
            .ok_or_else(|| DirectoryError::UserNotFound(username.to_string()))
    }

    async fn delete_by_id(&self, id: &str) -> Result<(), DirectoryError> {
        let request = self.http.delete(self.admin_url(&["users", id])?);
        self.execute("delete user", request).await?;
        Ok(())
    }

    async fn paged(
        &self,
        operation: &'static str,
        segments: &[&str],
    ) -> Result<Vec<RemoteUser>, DirectoryError> {
        let url = self.admin_url(segments)?;
        let mut users = Vec::new();
        let mut first = 0usize;

        loop {
            let request = self
                .http
                .get(url.clone())
                .query(&[("first", first), ("max", PAGE_SIZE)]);
            let page: Vec<Value> = self.get_json(operation, request).await?;
            let fetched = page.len();
            for document in page {
                users.push(RemoteUser::from_document(document)?);
            }
            if fetched < PAGE_SIZE {
                return Ok(users);
            }
            first += fetched;
        }
    }

    async fn realm_role(&self, role: &str) -> Result<RoleRepresentation, DirectoryError> {
        let request = self.http.get(self.admin_url(&["roles", role])?);
        self.get_json("get role", request)
            .await
            .map_err(|err| not_found_as(err, || DirectoryError::RoleNotFound(role.to_string())))
    }
}

fn not_found_as(err: DirectoryError, missing: impl FnOnce() -> DirectoryError) -> DirectoryError {
    match err {
        DirectoryError::Request { status, .. } if status == StatusCode::NOT_FOUND.as_u16() => {
            missing()
        }
        other => other,
    }
}

impl std::fmt::Debug for KeycloakClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakClient")
            .field("server_url", &self.connection.server_url)
            .field("realm", &self.connection.realm_name)
            .finish_non_exhaustive()
    }
}

impl DirectoryGateway for KeycloakClient {
    fn create_or_replace(&self, user: &User) -> Result<(), DirectoryError> {
        let username = user
            .username
            .as_deref()
            .ok_or(DirectoryError::MissingUsername)?;

        self.runtime.block_on(async {
            if let Some(existing) = self.find_user_id(username).await? {
                self.delete_by_id(&existing).await?;
                warn!(username, "update existed user");
            }

            let request = self
                .http
                .post(self.admin_url(&["users"])?)
                .json(&NewUser::from_user(username, user));
            self.execute("create user", request).await?;
            info!(username, "user added");
            Ok::<_, DirectoryError>(())
        })
    }

    fn delete(&self, username: &str) -> Result<(), DirectoryError> {
        self.runtime.block_on(async {
            let id = self.require_user_id(username).await?;
            self.delete_by_id(&id).await?;
            info!(username, "user deleted");
            Ok::<_, DirectoryError>(())
        })
    }

    fn list_all(&self) -> Result<Vec<RemoteUser>, DirectoryError> {
        self.runtime.block_on(self.paged("list users", &["users"]))
    }

    fn fetch(&self, id: &str) -> Result<RemoteUser, DirectoryError> {
        self.runtime.block_on(async {
            let request = self.http.get(self.admin_url(&["users", id])?);
            let document: Value = self
                .get_json("get user", request)
                .await
                .map_err(|err| not_found_as(err, || DirectoryError::UserNotFound(id.to_string())))?;
            RemoteUser::from_document(document)
        })
    }

    fn assign_role(&self, username: &str, role: &str) -> Result<(), DirectoryError> {
        self.runtime.block_on(async {
            let id = self.require_user_id(username).await?;
            let representation = self.realm_role(role).await?;
            let request = self
                .http
                .post(self.admin_url(&["users", &id, "role-mappings", "realm"])?)
                .json(&[representation]);
            self.execute("assign role", request).await?;
            debug!(username, role, "role assigned");
            Ok::<_, DirectoryError>(())
        })
    }

    fn role_members(&self, role: &str) -> Result<Vec<RemoteUser>, DirectoryError> {
        self.runtime.block_on(async {
            self.paged("list role members", &["roles", role, "users"])
                .await
                .map_err(|err| not_found_as(err, || DirectoryError::RoleNotFound(role.to_string())))
        })
    }
}

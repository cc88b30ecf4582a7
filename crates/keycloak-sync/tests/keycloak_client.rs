use keycloak_sync::config::KeycloakConnection;
use keycloak_sync::directory::{DirectoryError, DirectoryGateway, KeycloakClient};
use keycloak_sync::storage::{GcsStorage, ObjectStorage, StorageError};
use keycloak_sync::user::User;
use serde_json::{json, Value};
use tokio::runtime::Runtime;
use wiremock::matchers::{
    body_json, body_partial_json, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock server running on its own runtime; the clients under test block on
/// their private runtimes from the test thread.
struct Harness {
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn start() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .expect("test runtime");
        let server = runtime.block_on(MockServer::start());
        Self { server, runtime }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }

    fn with_token(self) -> Self {
        self.mount(
            Mock::given(method("POST"))
                .and(path("/realms/acme/protocol/openid-connect/token"))
                .and(body_string_contains("grant_type=client_credentials"))
                .and(body_string_contains("client_id=kcsync"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "access_token": "token-1",
                    "expires_in": 300,
                })))
                .expect(1),
        );
        self
    }

    fn connection(&self) -> KeycloakConnection {
        KeycloakConnection {
            server_url: format!("{}/", self.server.uri()),
            realm_name: "acme".to_string(),
            client_id: "kcsync".to_string(),
            client_secret: "secret".to_string(),
        }
    }

    fn client(&self) -> KeycloakClient {
        KeycloakClient::connect(self.connection()).expect("client connects")
    }

    fn verify(&self) {
        self.runtime.block_on(self.server.verify());
    }
}

fn authorized(verb: &str, route: &str) -> wiremock::MockBuilder {
    Mock::given(method(verb))
        .and(path(route.to_string()))
        .and(header("authorization", "Bearer token-1"))
}

fn remote(id: &str, username: &str) -> Value {
    json!({"id": id, "username": username})
}

#[test]
fn rejected_credentials_fail_on_connect() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("POST"))
            .and(path("/realms/acme/protocol/openid-connect/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client")),
    );

    let error = KeycloakClient::connect(harness.connection()).expect_err("credentials rejected");
    match error {
        DirectoryError::Authentication(message) => assert!(message.contains("invalid_client")),
        other => panic!("expected authentication failure, got {other:?}"),
    }
}

#[test]
fn existing_user_is_replaced_with_a_single_token() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("username", "alice"))
            .and(query_param("exact", "true"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote("u-1", "Alice")])),
            )
            .expect(1),
    );
    harness.mount(
        authorized("DELETE", "/admin/realms/acme/users/u-1")
            .respond_with(ResponseTemplate::new(204))
            .expect(1),
    );
    harness.mount(
        authorized("POST", "/admin/realms/acme/users")
            .and(body_partial_json(json!({
                "username": "alice",
                "enabled": true,
                "emailVerified": true,
                "email": "alice@acme.com",
                "attributes": {"agency": ["Paris"]},
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1),
    );

    let mut user = User {
        username: Some("alice".to_string()),
        email: Some("alice@acme.com".to_string()),
        ..User::default()
    };
    user.set_attribute("agency", "Paris");

    harness
        .client()
        .create_or_replace(&user)
        .expect("user replaced");
    harness.verify();
}

#[test]
fn new_user_is_created_without_delete() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("username", "bob"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote("u-9", "bobby")])),
            ),
    );
    harness.mount(
        authorized("DELETE", "/admin/realms/acme/users/u-9")
            .respond_with(ResponseTemplate::new(204))
            .expect(0),
    );
    harness.mount(
        authorized("POST", "/admin/realms/acme/users")
            .respond_with(ResponseTemplate::new(201))
            .expect(1),
    );

    let user = User {
        username: Some("bob".to_string()),
        ..User::default()
    };
    harness.client().create_or_replace(&user).expect("user created");
    harness.verify();
}

#[test]
fn rejected_creation_reports_status_and_body() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );
    harness.mount(
        authorized("POST", "/admin/realms/acme/users")
            .respond_with(
                ResponseTemplate::new(409).set_body_string("User exists with same email"),
            ),
    );

    let user = User {
        username: Some("carol".to_string()),
        ..User::default()
    };
    let error = harness
        .client()
        .create_or_replace(&user)
        .expect_err("conflict");
    match error {
        DirectoryError::Request {
            operation,
            status,
            message,
        } => {
            assert_eq!(operation, "create user");
            assert_eq!(status, 409);
            assert_eq!(message, "User exists with same email");
        }
        other => panic!("expected request failure, got {other:?}"),
    }
}

#[test]
fn list_all_walks_every_page() {
    let harness = Harness::start().with_token();
    let first_page: Vec<Value> = (0..100)
        .map(|index| remote(&format!("u-{index}"), &format!("user{index}")))
        .collect();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("first", "0"))
            .and(query_param("max", "100"))
            .respond_with(ResponseTemplate::new(200).set_body_json(Value::Array(first_page)))
            .expect(1),
    );
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("first", "100"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote("u-100", "user100")])),
            )
            .expect(1),
    );

    let users = harness.client().list_all().expect("users listed");
    assert_eq!(users.len(), 101);
    assert_eq!(users[0].id, "u-0");
    assert_eq!(users[100].username(), Some("user100"));
    harness.verify();
}

#[test]
fn deleting_an_unknown_user_is_reported() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("username", "ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([]))),
    );

    let error = harness.client().delete("ghost").expect_err("no such user");
    assert!(matches!(error, DirectoryError::UserNotFound(name) if name == "ghost"));
}

#[test]
fn fetch_maps_missing_records() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users/u-1").respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "u-1",
                "username": "alice",
                "createdTimestamp": 1_709_251_200_000_i64,
            })),
        ),
    );
    harness.mount(
        authorized("GET", "/admin/realms/acme/users/u-2")
            .respond_with(ResponseTemplate::new(404)),
    );

    let client = harness.client();
    let alice = client.fetch("u-1").expect("alice fetched");
    assert_eq!(alice.username(), Some("alice"));

    let error = client.fetch("u-2").expect_err("missing record");
    assert!(matches!(error, DirectoryError::UserNotFound(id) if id == "u-2"));
}

#[test]
fn assign_role_posts_the_realm_role_representation() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("username", "alice"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote("u-1", "alice")])),
            ),
    );
    harness.mount(
        authorized("GET", "/admin/realms/acme/roles/ADMIN").respond_with(
            ResponseTemplate::new(200).set_body_json(json!({
                "id": "r-1",
                "name": "ADMIN",
                "composite": false,
            })),
        ),
    );
    harness.mount(
        authorized("POST", "/admin/realms/acme/users/u-1/role-mappings/realm")
            .and(body_json(json!([{"id": "r-1", "name": "ADMIN"}])))
            .respond_with(ResponseTemplate::new(204))
            .expect(1),
    );

    harness
        .client()
        .assign_role("alice", "ADMIN")
        .expect("role assigned");
    harness.verify();
}

#[test]
fn unknown_roles_are_reported_by_name() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/users")
            .and(query_param("username", "alice"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!([remote("u-1", "alice")])),
            ),
    );
    harness.mount(
        authorized("GET", "/admin/realms/acme/roles/ROOT").respond_with(ResponseTemplate::new(404)),
    );
    harness.mount(
        authorized("GET", "/admin/realms/acme/roles/ROOT/users")
            .respond_with(ResponseTemplate::new(404)),
    );

    let client = harness.client();
    let error = client.assign_role("alice", "ROOT").expect_err("unknown role");
    assert!(matches!(error, DirectoryError::RoleNotFound(role) if role == "ROOT"));

    let error = client.role_members("ROOT").expect_err("unknown role");
    assert!(matches!(error, DirectoryError::RoleNotFound(role) if role == "ROOT"));
}

#[test]
fn role_members_are_listed() {
    let harness = Harness::start().with_token();
    harness.mount(
        authorized("GET", "/admin/realms/acme/roles/VIEWER/users")
            .and(query_param("first", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                remote("u-3", "carol"),
                remote("u-2", "bob"),
            ]))),
    );

    let members = harness.client().role_members("VIEWER").expect("members listed");
    let ids: Vec<&str> = members.iter().map(|member| member.id.as_str()).collect();
    assert_eq!(ids, ["u-3", "u-2"]);
}

#[test]
fn gcs_download_writes_the_object() {
    let harness = Harness::start();
    harness.mount(
        Mock::given(method("GET"))
            .and(path("/storage/v1/b/acme/o/imports%2Fusers.csv"))
            .and(query_param("alt", "media"))
            .and(header("authorization", "Bearer gcs-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Mail;Prenom\n"))
            .expect(1),
    );
    let dir = tempfile::tempdir().expect("tempdir");
    let destination = dir.path().join("users.csv");

    let storage = GcsStorage::with_endpoint(&harness.server.uri(), Some("gcs-token".to_string()))
        .expect("storage client");
    storage
        .download("acme", "imports/users.csv", &destination)
        .expect("object downloaded");

    let contents = std::fs::read_to_string(&destination).expect("downloaded file");
    assert_eq!(contents, "Mail;Prenom\n");
    harness.verify();
}

#[test]
fn gcs_missing_object_is_not_found() {
    let harness = Harness::start();
    harness.mount(Mock::given(method("GET")).respond_with(ResponseTemplate::new(404)));
    let dir = tempfile::tempdir().expect("tempdir");

    let storage = GcsStorage::with_endpoint(&harness.server.uri(), None).expect("storage client");
    let error = storage
        .download("acme", "users.csv", &dir.path().join("users.csv"))
        .expect_err("object is missing");
    assert!(matches!(
        error,
        StorageError::NotFound { bucket, object } if bucket == "acme" && object == "users.csv"
    ));
}

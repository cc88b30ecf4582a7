mod common;

use common::{FakeDirectory, SYNC_TEMPLATE};
use keycloak_sync::error::ConfigurationError;
use keycloak_sync::template::Template;
use keycloak_sync::workflows::{PurgeSummary, PurgeWorkflow, WorkflowError};
use serde_json::json;

fn directory() -> FakeDirectory {
    FakeDirectory::new()
        .with_user("1", "tmp-alice", json!({}))
        .with_user("2", "bob", json!({}))
        .with_user("3", "tmp-carol", json!({}))
        .with_user("4", "tmp-dave", json!({}))
}

#[test]
fn deletes_users_matching_delete_rules() {
    let directory = directory();
    let template = Template::from_yaml(SYNC_TEMPLATE).expect("template parses");

    let summary = PurgeWorkflow::new(&directory)
        .run(&template)
        .expect("purge succeeds");

    assert_eq!(
        summary,
        PurgeSummary {
            scanned: 4,
            deleted: 3,
            failed: 0,
        }
    );
    assert_eq!(directory.deleted(), ["tmp-alice", "tmp-carol", "tmp-dave"]);
}

#[test]
fn delete_failures_do_not_stop_the_pass() {
    let directory = directory().failing_for("tmp-carol");
    let template = Template::from_yaml(SYNC_TEMPLATE).expect("template parses");

    let summary = PurgeWorkflow::new(&directory)
        .run(&template)
        .expect("purge completes");

    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(directory.deleted(), ["tmp-alice", "tmp-dave"]);
}

#[test]
fn identifier_without_name_is_rejected_before_listing() {
    let directory = directory();
    let template = Template::from_yaml(
        "format: csv\nseparator: ';'\ndata_model: []\nmapper: {}\ndelete_rules:\n  identifier:\n    regex: 'tmp-.*'\n",
    )
    .expect("template parses");

    let error = PurgeWorkflow::new(&directory)
        .run(&template)
        .expect_err("identifier has no name");
    assert!(matches!(
        error,
        WorkflowError::Configuration(ConfigurationError::MissingIdentifierName("delete_rules"))
    ));
    assert!(directory.deleted().is_empty());
}

#[test]
fn drop_all_deletes_everyone() {
    let directory = directory().failing_for("bob");

    let summary = PurgeWorkflow::new(&directory)
        .drop_all()
        .expect("drop-all completes");

    assert_eq!(summary.scanned, 4);
    assert_eq!(summary.deleted, 3);
    assert_eq!(summary.failed, 1);
}

//! Purge end-to-end tests

use secref_e2e::{init_test, scope, StoreOp, TestEngine};
use secref_engine::{FailureKind, FieldStatus};
use serde_json::json;

#[tokio::test]
async fn test_purge_twice_succeeds() {
    init_test();

    let t = TestEngine::new();
    let plugin = scope("plugin:loganal");
    t.engine
        .materialize(
            &plugin,
            &json!({"auth": {"key": "s3cr3t"}, "x": {"a__Secret": "1"}}),
        )
        .await
        .unwrap();

    let first = t.engine.purge(&plugin).await.unwrap();
    let second = t.engine.purge(&plugin).await.unwrap();

    assert!(first.is_complete());
    assert!(second.is_complete());
    assert!(second.outcomes.is_empty());
    assert!(t.store.inner().is_empty());
    assert_eq!(t.ledger.scope_count(), 0);
}

#[tokio::test]
async fn test_purge_of_unknown_scope_is_a_no_op() {
    init_test();

    let t = TestEngine::new();
    let report = t.engine.purge(&scope("agent:never-saved")).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(t.store.total_calls(), 0);
    assert_eq!(t.ledger.writes(), 0);
}

#[tokio::test]
async fn test_record_deleted_out_of_band_counts_as_purged() {
    init_test();

    let t = TestEngine::new();
    let plugin = scope("plugin:loganal");
    t.engine
        .materialize(&plugin, &json!({"auth": {"key": "s3cr3t"}}))
        .await
        .unwrap();

    let name = t.name_for(&plugin, "auth.key");
    secref_engine::SecretStore::delete(t.store.inner(), &name)
        .await
        .unwrap();

    let report = t.engine.purge(&plugin).await.unwrap();
    assert!(report.is_complete());
    assert_eq!(report.outcomes[0].status, FieldStatus::Purged);
}

#[tokio::test]
async fn test_partial_purge_keeps_remaining_names() {
    init_test();

    let t = TestEngine::new();
    let plugin = scope("plugin:loganal");
    t.engine
        .materialize(
            &plugin,
            &json!({"x": {"a__Secret": "1", "b__Secret": "2", "c__Secret": "3"}}),
        )
        .await
        .unwrap();

    let stuck = t.name_for(&plugin, "x.b__Secret");
    t.store.fail_name(&stuck);

    let report = t.engine.purge(&plugin).await.unwrap();
    assert!(!report.is_complete());
    assert!(!report.ledger_removed);
    let failure = report
        .outcomes
        .iter()
        .find(|o| o.is_failed())
        .unwrap();
    assert_eq!(failure.name.as_ref(), Some(&stuck));
    assert_eq!(failure.failure().unwrap().kind, FailureKind::StoreUnavailable);

    // Only the undeleted record is left, and the ledger still points at it
    assert_eq!(t.store.inner().names(), vec![stuck.clone()]);
    assert_eq!(t.ledger_names(&plugin).await, vec![stuck.clone()]);

    // A retry finishes the job
    t.store.heal_name(&stuck);
    let retry = t.engine.purge(&plugin).await.unwrap();
    assert!(retry.is_complete());
    assert_eq!(retry.outcomes.len(), 1);
    assert!(t.store.inner().is_empty());
    assert!(t.ledger_entry(&plugin).await.is_none());
}

#[tokio::test]
async fn test_purge_leaves_other_scopes_alone() {
    init_test();

    let t = TestEngine::new();
    let prod = scope("plugin:loganal/prod");
    let global = scope("plugin:loganal");
    let tree = json!({"auth": {"key": "s3cr3t"}});

    t.engine.materialize(&prod, &tree).await.unwrap();
    t.engine.materialize(&global, &tree).await.unwrap();

    t.engine.purge(&prod).await.unwrap();
    assert_eq!(t.store.inner().len(), 1);
    assert_eq!(t.ledger_names(&global).await.len(), 1);
    assert_eq!(t.store.calls(StoreOp::Delete), 1);
}

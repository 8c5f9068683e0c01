//! Durable store contract tests against a real SQLite file.

#![cfg(feature = "sqlite")]

use dispatchflow::runtime::{Checkpoint, CheckpointStore, SqliteStore, StoreError};
use dispatchflow::state::WorkflowState;
use dispatchflow::types::{NodeId, WorkflowStatus};

async fn store_in(dir: &tempfile::TempDir) -> SqliteStore {
    let path = dir.path().join("checkpoints.db");
    std::fs::File::create(&path).expect("create db file");
    SqliteStore::connect(&format!("sqlite://{}", path.display()))
        .await
        .expect("connect")
}

fn checkpoint(session_id: &str) -> Checkpoint {
    let mut state = WorkflowState::builder()
        .org("org-1")
        .user("u-1")
        .conversation("c-1")
        .session(session_id)
        .user_message("notify all drivers about shift change")
        .build();
    state.intent = Some("communication".into());
    state.confidence = Some(0.85);
    state.node_history = vec!["classify".into(), "notify_gate".into()];
    Checkpoint {
        session_id: session_id.into(),
        version: 1,
        status: WorkflowStatus::Suspended,
        current_node: NodeId::named("notify_gate"),
        state,
        updated_at: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn roundtrip_preserves_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir).await;

    let original = checkpoint("sq-1");
    store.compare_and_swap(None, &original).await.unwrap();

    let loaded = store.load("sq-1").await.unwrap().unwrap();
    assert_eq!(loaded.session_id, original.session_id);
    assert_eq!(loaded.version, original.version);
    assert_eq!(loaded.status, original.status);
    assert_eq!(loaded.current_node, original.current_node);
    assert_eq!(loaded.state, original.state);
    assert_eq!(
        loaded.updated_at.to_rfc3339(),
        original.updated_at.to_rfc3339()
    );
}

#[tokio::test]
async fn cas_create_and_update_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let store = store_in(&dir).await;

    let v1 = checkpoint("sq-2");
    store.compare_and_swap(None, &v1).await.unwrap();

    // Duplicate create is a conflict.
    let err = store.compare_and_swap(None, &v1).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict { expected: None, .. }));

    // Advance succeeds against the live version.
    let v2 = v1.advanced(
        WorkflowStatus::Completed,
        NodeId::named("response_generator"),
        v1.state.clone(),
    );
    store.compare_and_swap(Some(1), &v2).await.unwrap();

    // A stale writer loses.
    let err = store.compare_and_swap(Some(1), &v2).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Conflict {
            expected: Some(1),
            ..
        }
    ));

    let current = store.load("sq-2").await.unwrap().unwrap();
    assert_eq!(current.version, 2);
    assert_eq!(current.status, WorkflowStatus::Completed);
}

#[tokio::test]
async fn survives_reconnect() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("durable.db");
    std::fs::File::create(&path).unwrap();
    let url = format!("sqlite://{}", path.display());

    {
        let store = SqliteStore::connect(&url).await.unwrap();
        store
            .compare_and_swap(None, &checkpoint("sq-3"))
            .await
            .unwrap();
    }

    // A fresh connection (a "new process") sees the suspended session.
    let store = SqliteStore::connect(&url).await.unwrap();
    let loaded = store.load("sq-3").await.unwrap().unwrap();
    assert_eq!(loaded.status, WorkflowStatus::Suspended);
    assert_eq!(store.list_sessions().await.unwrap(), vec!["sq-3"]);
}

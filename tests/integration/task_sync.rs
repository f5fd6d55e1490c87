//! Integration tests for live task collection sync.
//!
//! Validates:
//! - Start delivers the owner's current collection and clears loading
//! - Live changes replace the snapshot wholesale
//! - Failures keep the last snapshot and are cleared by new data
//! - Stop resets the state and detaches from the store
//! - Records from other owners never enter the snapshot
//! - A session binding drives the sync from sign-in to sign-out

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use taskdeck::binding::SessionBinding;
use taskdeck::session::{Identity, MemoryAuth, SessionManager};
use taskdeck::sync::{MemoryTaskStore, SubscriptionError, SyncState, TaskCollectionSync};
use taskdeck_proto::task::{Priority, RawTaskRecord, SyncFlag};

fn setup() -> (Arc<MemoryTaskStore>, TaskCollectionSync<MemoryTaskStore>) {
    let store = Arc::new(MemoryTaskStore::new());
    let sync = TaskCollectionSync::new(Arc::clone(&store));
    (store, sync)
}

fn titles(state: &SyncState) -> Vec<String> {
    let mut titles: Vec<String> = state.snapshot.iter().map(|t| t.title.clone()).collect();
    titles.sort();
    titles
}

#[tokio::test]
async fn start_loads_current_collection() {
    let (store, sync) = setup();
    store.put(
        "alice",
        RawTaskRecord::from_json(
            "t1",
            json!({"title": "Water plants", "priority": "HIGH", "syncFlag": "pending"}),
        ),
    );
    store.put("alice", RawTaskRecord::new("t2"));

    sync.start("alice");
    let state = sync.loaded().await;

    assert_eq!(state.owner.as_deref(), Some("alice"));
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(state.snapshot.len(), 2);

    let t1 = state.snapshot.get("t1").unwrap();
    assert_eq!(t1.priority, Priority::High);
    assert_eq!(t1.sync_flag, SyncFlag::Pending);
    assert_eq!(t1.owner_id, "alice");

    // Missing fields take their defaults.
    let t2 = state.snapshot.get("t2").unwrap();
    assert_eq!(t2.title, "");
    assert!(!t2.completed);
    assert_eq!(t2.priority, Priority::Low);
    assert_eq!(state.snapshot.pending_count(), 1);
}

#[tokio::test]
async fn live_changes_replace_snapshot() {
    let (store, sync) = setup();
    sync.start("alice");
    assert!(sync.snapshot().is_empty());

    store.put("alice", RawTaskRecord::new("t1").with_field("title", "One"));
    store.put("alice", RawTaskRecord::new("t2").with_field("title", "Two"));
    assert_eq!(titles(&sync.state()), vec!["One", "Two"]);

    store.put(
        "alice",
        RawTaskRecord::new("t1")
            .with_field("title", "One (edited)")
            .with_field("completed", true),
    );
    store.remove("alice", "t2");

    let state = sync.state();
    assert_eq!(titles(&state), vec!["One (edited)"]);
    assert!(state.snapshot.get("t1").unwrap().completed);
}

#[tokio::test]
async fn soft_deleted_tasks_stay_in_snapshot_but_not_active() {
    let (store, sync) = setup();
    store.put(
        "alice",
        RawTaskRecord::from_json("t1", json!({"title": "Old", "isDeleted": true})),
    );
    store.put("alice", RawTaskRecord::new("t2").with_field("title", "New"));

    sync.start("alice");
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.len(), 2);
    let active: Vec<&str> = snapshot.active().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(active, vec!["t2"]);
}

#[tokio::test]
async fn failure_keeps_last_snapshot() {
    let (store, sync) = setup();
    store.put("alice", RawTaskRecord::new("t1").with_field("title", "Keep me"));
    sync.start("alice");

    let denied = SubscriptionError::PermissionDenied("rules rejected read".to_string());
    store.fail("alice", denied.clone());

    let state = sync.state();
    assert_eq!(state.error, Some(denied));
    assert!(!state.loading);
    assert_eq!(titles(&state), vec!["Keep me"]);

    // Fresh data clears the error.
    store.put("alice", RawTaskRecord::new("t2").with_field("title", "Later"));
    let state = sync.state();
    assert!(state.error.is_none());
    assert_eq!(state.snapshot.len(), 2);
}

#[tokio::test]
async fn failure_after_initial_data_is_reported() {
    let store = Arc::new(MemoryTaskStore::deferred());
    let sync = TaskCollectionSync::new(Arc::clone(&store));
    sync.start("alice");
    assert!(sync.is_loading());

    let offline = SubscriptionError::Unavailable("offline".to_string());
    store.fail("alice", offline.clone());
    assert_eq!(store.flush(), 2);

    let state = sync.state();
    assert!(!state.loading);
    assert_eq!(state.error, Some(offline));
    assert!(state.snapshot.is_empty());
}

#[tokio::test]
async fn stop_resets_and_detaches() {
    let (store, sync) = setup();
    store.put("alice", RawTaskRecord::new("t1"));
    sync.start("alice");
    assert_eq!(store.active_subscriptions(), 1);

    sync.stop();
    let state = sync.state();
    assert!(state.owner.is_none());
    assert!(state.snapshot.is_empty());
    assert!(!state.loading);
    assert!(state.error.is_none());
    assert_eq!(store.active_subscriptions(), 0);

    // Later changes are not seen.
    store.put("alice", RawTaskRecord::new("t2"));
    assert!(sync.snapshot().is_empty());

    // Stopping again is harmless.
    sync.stop();
    assert!(!sync.is_active());
}

#[tokio::test]
async fn foreign_records_are_dropped() {
    let (store, sync) = setup();
    store.put(
        "alice",
        RawTaskRecord::from_json("mine", json!({"title": "Mine", "ownerId": "alice"})),
    );
    store.put(
        "alice",
        RawTaskRecord::from_json("stray", json!({"title": "Stray", "userId": "mallory"})),
    );

    sync.start("alice");
    let snapshot = sync.snapshot();
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.is_owned_by("alice"));
    assert!(snapshot.get("stray").is_none());
}

#[tokio::test]
async fn receivers_see_each_snapshot() {
    let (store, sync) = setup();
    let mut rx = sync.subscribe();
    sync.start("alice");
    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();

    store.put("alice", RawTaskRecord::new("t1"));
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().snapshot.len(), 1);
}

async fn wait_for(
    sync: &TaskCollectionSync<MemoryTaskStore>,
    pred: impl FnMut(&SyncState) -> bool,
) -> SyncState {
    let mut rx = sync.subscribe();
    let state = tokio::time::timeout(Duration::from_secs(1), rx.wait_for(pred))
        .await
        .expect("sync did not reach expected state")
        .unwrap()
        .clone();
    state
}

#[tokio::test]
async fn binding_follows_sign_in_and_sign_out() {
    let auth = Arc::new(MemoryAuth::new());
    let store = Arc::new(MemoryTaskStore::new());
    store.put("alice", RawTaskRecord::new("a1").with_field("title", "Alice task"));
    store.put("bob", RawTaskRecord::new("b1").with_field("title", "Bob task"));

    let session = SessionManager::new(Arc::clone(&auth));
    session.initialize().unwrap();
    let sync = Arc::new(TaskCollectionSync::new(Arc::clone(&store)));
    let binding = SessionBinding::attach(&session, Arc::clone(&sync));

    auth.sign_in(Identity::new("alice"));
    let state = wait_for(&sync, |s| s.owner.as_deref() == Some("alice") && !s.loading).await;
    assert_eq!(titles(&state), vec!["Alice task"]);

    session.sign_out().await.unwrap();
    let state = wait_for(&sync, |s| s.owner.is_none()).await;
    assert!(state.snapshot.is_empty());
    assert_eq!(store.active_subscriptions(), 0);

    auth.sign_in(Identity::new("bob"));
    let state = wait_for(&sync, |s| s.owner.as_deref() == Some("bob") && !s.loading).await;
    assert_eq!(titles(&state), vec!["Bob task"]);

    binding.shutdown();
    assert!(!sync.is_active());
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test]
async fn binding_waits_for_settled_session() {
    let auth = Arc::new(MemoryAuth::deferred());
    let store = Arc::new(MemoryTaskStore::new());
    let session = SessionManager::new(Arc::clone(&auth));
    session.initialize().unwrap();
    let sync = Arc::new(TaskCollectionSync::new(Arc::clone(&store)));
    let _binding = SessionBinding::attach(&session, Arc::clone(&sync));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.subscribe_count(), 0);

    auth.emit_current();
    tokio::time::sleep(Duration::from_millis(20)).await;
    // Settled without an identity: still nothing to sync.
    assert_eq!(store.subscribe_count(), 0);

    auth.sign_in(Identity::new("alice"));
    wait_for(&sync, |s| s.owner.as_deref() == Some("alice")).await;
    assert_eq!(store.subscribe_count(), 1);
}

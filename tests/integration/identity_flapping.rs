//! Integration tests for owner isolation under rapid identity changes.
//!
//! Validates:
//! - A notification already in flight for a replaced owner never lands
//! - Stop followed by a late notification leaves the state empty
//! - Restarting for the same owner discards the older subscription's data
//! - Flapping sign-ins through a binding converge on the last identity
//! - A lapse and return of the same identity resubscribes with a clean state

use std::sync::Arc;
use std::time::Duration;

use taskdeck::binding::SessionBinding;
use taskdeck::session::{Identity, MemoryAuth, SessionManager};
use taskdeck::sync::{MemoryTaskStore, SubscriptionError, TaskCollectionSync};
use taskdeck_proto::task::RawTaskRecord;

fn seeded_deferred_store() -> Arc<MemoryTaskStore> {
    let store = Arc::new(MemoryTaskStore::deferred());
    store.put("alice", RawTaskRecord::new("a1").with_field("title", "Alice 1"));
    store.put("alice", RawTaskRecord::new("a2").with_field("title", "Alice 2"));
    store.put("bob", RawTaskRecord::new("b1").with_field("title", "Bob 1"));
    // Nobody is subscribed yet, so nothing was queued.
    assert_eq!(store.pending(), 0);
    store
}

#[test]
fn late_notification_for_previous_owner_is_discarded() {
    let store = seeded_deferred_store();
    let sync = TaskCollectionSync::new(Arc::clone(&store));

    sync.start("alice");
    sync.start("bob");
    assert_eq!(store.active_subscriptions(), 1);

    // Alice's initial delivery was queued before her subscription was
    // cancelled; it arrives now, followed by Bob's.
    assert_eq!(store.flush(), 2);

    let state = sync.state();
    assert_eq!(state.owner.as_deref(), Some("bob"));
    assert!(!state.loading);
    assert_eq!(state.snapshot.len(), 1);
    assert!(state.snapshot.is_owned_by("bob"));
    assert!(state.snapshot.get("a1").is_none());
}

#[test]
fn late_error_for_previous_owner_is_discarded() {
    let store = seeded_deferred_store();
    let sync = TaskCollectionSync::new(Arc::clone(&store));

    sync.start("alice");
    store.fail("alice", SubscriptionError::Other("boom".to_string()));
    sync.start("bob");
    store.flush();

    let state = sync.state();
    assert_eq!(state.owner.as_deref(), Some("bob"));
    assert!(state.error.is_none());
}

#[test]
fn late_notification_after_stop_is_discarded() {
    let store = seeded_deferred_store();
    let sync = TaskCollectionSync::new(Arc::clone(&store));

    sync.start("alice");
    sync.stop();
    assert_eq!(store.flush(), 1);

    let state = sync.state();
    assert!(state.owner.is_none());
    assert!(state.snapshot.is_empty());
    assert!(!state.loading);
}

#[test]
fn restart_for_same_owner_uses_newest_subscription() {
    let store = seeded_deferred_store();
    let sync = TaskCollectionSync::new(Arc::clone(&store));

    sync.start("alice");
    let first_generation = sync.state().generation;
    sync.start("alice");
    assert!(sync.state().generation > first_generation);

    // Only the newest subscription's delivery is applied; both carry the
    // same collection, so the snapshot matches Alice's data either way.
    store.flush();
    let state = sync.state();
    assert_eq!(state.snapshot.len(), 2);
    assert!(state.snapshot.is_owned_by("alice"));
    assert_eq!(store.active_subscriptions(), 1);
}

#[test]
fn many_switches_leave_one_subscription() {
    let store = seeded_deferred_store();
    let sync = TaskCollectionSync::new(Arc::clone(&store));

    for i in 0..50 {
        let owner = if i % 2 == 0 { "alice" } else { "bob" };
        sync.start(owner);
    }
    assert_eq!(store.active_subscriptions(), 1);
    assert_eq!(store.subscribe_count(), 50);

    store.flush();
    let state = sync.state();
    assert_eq!(state.owner.as_deref(), Some("bob"));
    assert!(state.snapshot.is_owned_by("bob"));
    assert_eq!(state.snapshot.len(), 1);
}

#[tokio::test]
async fn flapping_sign_ins_converge_on_last_identity() {
    let auth = Arc::new(MemoryAuth::new());
    let store = Arc::new(MemoryTaskStore::new());
    store.put("alice", RawTaskRecord::new("a1"));
    store.put("bob", RawTaskRecord::new("b1"));
    store.put("carol", RawTaskRecord::new("c1"));

    let session = SessionManager::new(Arc::clone(&auth));
    session.initialize().unwrap();
    let sync = Arc::new(TaskCollectionSync::new(Arc::clone(&store)));
    let binding = SessionBinding::attach(&session, Arc::clone(&sync));

    for uid in ["alice", "bob", "alice", "carol"] {
        auth.sign_in(Identity::new(uid));
        auth.expire();
    }
    auth.sign_in(Identity::new("carol"));

    let mut rx = sync.subscribe();
    let state = tokio::time::timeout(
        Duration::from_secs(1),
        rx.wait_for(|s| s.owner.as_deref() == Some("carol") && !s.loading),
    )
    .await
    .expect("sync never followed the last identity")
    .unwrap()
    .clone();

    assert_eq!(state.snapshot.len(), 1);
    assert!(state.snapshot.is_owned_by("carol"));
    assert_eq!(store.active_subscriptions(), 1);

    binding.shutdown();
    assert_eq!(store.active_subscriptions(), 0);
}

#[test]
fn same_identity_returning_after_lapse_resubscribes() {
    let auth = Arc::new(MemoryAuth::new());
    let store = Arc::new(MemoryTaskStore::new());
    store.put("alice", RawTaskRecord::new("a1").with_field("title", "Alice 1"));

    let session = SessionManager::new(Arc::clone(&auth));
    session.initialize().unwrap();
    let sync = Arc::new(TaskCollectionSync::new(Arc::clone(&store)));
    let _binding = SessionBinding::attach(&session, Arc::clone(&sync));

    auth.sign_in(Identity::new("alice"));
    assert_eq!(sync.snapshot().len(), 1);

    // The store revokes access as the session lapses.
    store.fail(
        "alice",
        SubscriptionError::PermissionDenied("signed out".to_string()),
    );
    auth.expire();

    // Identity loss already cleared the view.
    let state = sync.state();
    assert!(state.owner.is_none());
    assert!(state.snapshot.is_empty());
    assert!(state.error.is_none());
    assert_eq!(store.active_subscriptions(), 0);

    auth.sign_in(Identity::new("alice"));
    let state = sync.state();
    assert_eq!(store.subscribe_count(), 2);
    assert_eq!(store.active_subscriptions(), 1);
    assert!(state.error.is_none());
    assert!(!state.loading);
    assert_eq!(state.snapshot.len(), 1);
    assert!(state.snapshot.is_owned_by("alice"));
}

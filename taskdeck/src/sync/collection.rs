//! Subscription lifecycle and snapshot projection for one owner at a time.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use taskdeck_proto::task::{RawTaskRecord, Task, TaskSnapshot};
use tokio::sync::watch;

use super::{SubscriptionError, SyncState, TaskStore};
use crate::subscription::Subscription;

/// Subscription bookkeeping guarded by one lock.
///
/// Every notification compares its generation against `generation` under
/// this lock before touching the published state.
#[derive(Default)]
struct Control {
    generation: u64,
    subscription: Option<Subscription>,
}

/// Keeps a local projection of one owner's task collection.
///
/// At most one store subscription is open at a time. The snapshot is
/// replaced wholesale on each notification and never mixes owners.
pub struct TaskCollectionSync<S: TaskStore> {
    store: Arc<S>,
    control: Arc<Mutex<Control>>,
    state: Arc<watch::Sender<SyncState>>,
}

impl<S: TaskStore> TaskCollectionSync<S> {
    /// Creates an idle sync bound to `store`.
    #[must_use]
    pub fn new(store: Arc<S>) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self {
            store,
            control: Arc::new(Mutex::new(Control::default())),
            state: Arc::new(state),
        }
    }

    /// Opens a subscription to `owner`'s collection, closing any open one
    /// first.
    ///
    /// The snapshot is cleared and `loading` set until the new
    /// subscription delivers data or fails.
    pub fn start(&self, owner: &str) {
        let (generation, previous) = {
            let mut control = self.control.lock();
            control.generation += 1;
            let generation = control.generation;
            self.state.send_replace(SyncState {
                owner: Some(owner.to_string()),
                generation,
                snapshot: TaskSnapshot::default(),
                loading: true,
                error: None,
            });
            (generation, control.subscription.take())
        };

        if let Some(mut previous) = previous {
            previous.cancel();
            tracing::debug!(generation = generation - 1, "closed previous task subscription");
        }

        let subscription = self.store.subscribe(
            owner,
            data_listener(&self.control, &self.state, generation, owner),
            error_listener(&self.control, &self.state, generation, owner),
        );

        let mut control = self.control.lock();
        if control.generation == generation {
            control.subscription = Some(subscription);
            tracing::debug!(owner, generation, "task subscription opened");
        } else {
            // A concurrent start/stop already superseded this one.
            drop(control);
            drop(subscription);
            tracing::debug!(owner, generation, "task subscription superseded while opening");
        }
    }

    /// Closes the open subscription, if any, and resets the state to
    /// empty, not loading, no error. Safe to call at any time.
    pub fn stop(&self) {
        let previous = {
            let mut control = self.control.lock();
            control.generation += 1;
            self.state.send_replace(SyncState {
                generation: control.generation,
                ..SyncState::default()
            });
            control.subscription.take()
        };

        if let Some(mut previous) = previous {
            previous.cancel();
            tracing::debug!("task subscription closed");
        }
    }

    /// Waits until the current subscription is no longer loading and
    /// returns the state at that point.
    pub async fn loaded(&self) -> SyncState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| !s.loading).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Current state.
    ///
    /// Do not hold a borrow from [`Self::subscribe`] across calls to
    /// `start` or `stop`.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Latest snapshot.
    #[must_use]
    pub fn snapshot(&self) -> TaskSnapshot {
        self.state.borrow().snapshot.clone()
    }

    /// True from `start` until the first notification or failure.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    /// Last subscription failure, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<SubscriptionError> {
        self.state.borrow().error.clone()
    }

    /// Owner of the open subscription.
    #[must_use]
    pub fn owner(&self) -> Option<String> {
        self.state.borrow().owner.clone()
    }

    /// Returns `true` while a store subscription is held.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.control.lock().subscription.is_some()
    }
}

fn data_listener(
    control: &Arc<Mutex<Control>>,
    state: &Arc<watch::Sender<SyncState>>,
    generation: u64,
    owner: &str,
) -> super::DataListener {
    let control = Arc::downgrade(control);
    let state = Arc::clone(state);
    let owner = owner.to_string();
    Box::new(move |records: Vec<RawTaskRecord>| {
        apply_data(&control, &state, generation, &owner, &records);
    })
}

fn error_listener(
    control: &Arc<Mutex<Control>>,
    state: &Arc<watch::Sender<SyncState>>,
    generation: u64,
    owner: &str,
) -> super::ErrorListener {
    let control = Arc::downgrade(control);
    let state = Arc::clone(state);
    let owner = owner.to_string();
    Box::new(move |error: SubscriptionError| {
        apply_error(&control, &state, generation, &owner, error);
    })
}

/// Replaces the snapshot with a freshly projected collection, unless the
/// notification belongs to a superseded subscription.
fn apply_data(
    control: &Weak<Mutex<Control>>,
    state: &watch::Sender<SyncState>,
    generation: u64,
    owner: &str,
    records: &[RawTaskRecord],
) {
    let Some(control) = control.upgrade() else {
        return;
    };
    let control = control.lock();
    if control.generation != generation {
        tracing::trace!(
            owner,
            generation,
            current = control.generation,
            "discarding stale task notification"
        );
        return;
    }

    let snapshot = project(owner, records);
    tracing::debug!(owner, generation, tasks = snapshot.len(), "task snapshot replaced");
    state.send_modify(|s| {
        s.snapshot = snapshot;
        s.loading = false;
        s.error = None;
    });
}

/// Records a subscription failure. The last snapshot is kept.
fn apply_error(
    control: &Weak<Mutex<Control>>,
    state: &watch::Sender<SyncState>,
    generation: u64,
    owner: &str,
    error: SubscriptionError,
) {
    let Some(control) = control.upgrade() else {
        return;
    };
    let control = control.lock();
    if control.generation != generation {
        tracing::trace!(owner, generation, "discarding stale task subscription error");
        return;
    }

    tracing::warn!(owner, generation, error = %error, "task subscription failed");
    state.send_modify(|s| {
        s.loading = false;
        s.error = Some(error);
    });
}

/// Projects raw records for `owner`, dropping records that cannot belong
/// to this collection.
fn project(owner: &str, records: &[RawTaskRecord]) -> TaskSnapshot {
    let tasks = records
        .iter()
        .filter_map(|raw| match Task::from_raw(raw, owner) {
            Ok(task) => Some(task),
            Err(e) => {
                tracing::warn!(owner, error = %e, "dropping task record");
                None
            }
        })
        .collect();
    TaskSnapshot::new(tasks)
}

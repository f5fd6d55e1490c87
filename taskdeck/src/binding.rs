//! Keeps a [`TaskCollectionSync`] pointed at the signed-in identity.
//!
//! [`SessionBinding`] observes a [`SessionManager`] and starts the sync for
//! the current uid, restarts it when the uid changes, and stops it on
//! sign-out. Nothing is started before the session has settled. The
//! observer runs inside the auth notification, so by the time an
//! identity loss is published the snapshot is already cleared.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::session::{AuthService, SessionManager, SessionState};
use crate::subscription::Subscription;
use crate::sync::{TaskCollectionSync, TaskStore};

/// Decides which owner the sync should follow for a given session state.
#[derive(Debug, Default)]
struct Reconciler {
    active: Option<String>,
    /// `changes` of the last settled state applied.
    seen: u64,
}

impl Reconciler {
    fn apply<S: TaskStore>(&mut self, state: &SessionState, sync: &TaskCollectionSync<S>) {
        if !state.ready || state.changes <= self.seen {
            return;
        }
        // A gap means intermediate states were never applied here. Ending
        // on the same uid still passed through another identity or none.
        let missed = self.seen > 0 && state.changes - self.seen > 1;
        self.seen = state.changes;

        let wanted = state.identity.as_ref().map(|i| i.uid().to_string());
        if wanted == self.active && !(missed && wanted.is_some()) {
            return;
        }
        match &wanted {
            Some(uid) if wanted == self.active => {
                tracing::debug!(%uid, "session lapsed and returned, restarting task sync");
                sync.start(uid);
            }
            Some(uid) => {
                tracing::debug!(%uid, "binding task sync to identity");
                sync.start(uid);
            }
            None => {
                tracing::debug!("identity gone, stopping task sync");
                sync.stop();
            }
        }
        self.active = wanted;
    }
}

/// Ties a session to a task sync for as long as the binding lives.
///
/// Dropping the binding detaches it from the session and stops the sync.
pub struct SessionBinding<S: TaskStore> {
    observer: Subscription,
    sync: Arc<TaskCollectionSync<S>>,
}

impl<S: TaskStore> SessionBinding<S> {
    /// Attaches `sync` to `session`.
    ///
    /// The current session state is applied right away, so a session that
    /// has already settled starts the sync without waiting for a change.
    #[must_use]
    pub fn attach<A: AuthService>(
        session: &SessionManager<A>,
        sync: Arc<TaskCollectionSync<S>>,
    ) -> Self {
        let reconciler = Arc::new(Mutex::new(Reconciler::default()));
        let observer = {
            let reconciler = Arc::clone(&reconciler);
            let sync = Arc::clone(&sync);
            session.observe(move |state| reconciler.lock().apply(state, &sync))
        };
        // A notification racing with registration is applied at most once;
        // the reconciler skips states it has already seen.
        reconciler.lock().apply(&session.state(), &sync);
        Self { observer, sync }
    }

    /// Detaches from the session and stops the sync.
    pub fn shutdown(self) {
        drop(self);
    }
}

impl<S: TaskStore> Drop for SessionBinding<S> {
    fn drop(&mut self) {
        self.observer.cancel();
        self.sync.stop();
        tracing::debug!("session binding stopped");
    }
}

//! Session manager: one persistent auth listener, one settled readiness
//! signal, and a sign-out that defers to the service's own notification.
//!
//! State is published two ways: through a `watch` channel for async
//! consumers, and to synchronous observers registered with
//! [`SessionManager::observe`], which run before the auth notification
//! returns.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::watch;

use super::{AuthError, AuthService, Identity, SessionPhase, SessionState};
use crate::subscription::Subscription;

type SessionObserver = Arc<dyn Fn(&SessionState) + Send + Sync>;

#[derive(Default)]
struct Observers {
    next_id: u64,
    list: Vec<(u64, SessionObserver)>,
}

/// Tracks the authenticated identity over the life of the process.
///
/// Construct one per auth service and share it by reference or `Arc`;
/// there is no global instance.
pub struct SessionManager<A: AuthService> {
    auth: Arc<A>,
    /// Published state. Shared with the listener closure.
    state: Arc<watch::Sender<SessionState>>,
    observers: Arc<Mutex<Observers>>,
    /// The single listener registration, once `initialize` succeeds.
    listener: Mutex<Option<Subscription>>,
    /// Set while a sign-out request is outstanding.
    signing_out: AtomicBool,
}

impl<A: AuthService> SessionManager<A> {
    /// Creates an uninitialized manager for the given auth service.
    #[must_use]
    pub fn new(auth: Arc<A>) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            auth,
            state: Arc::new(state),
            observers: Arc::new(Mutex::new(Observers::default())),
            listener: Mutex::new(None),
            signing_out: AtomicBool::new(false),
        }
    }

    /// Registers the auth state listener. Subsequent calls are no-ops.
    ///
    /// The listener stays registered until the manager is dropped, so
    /// sign-outs and expiries later in the session are observed too.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Registration`] if the service rejects the
    /// listener. The manager stays uninitialized and `initialize` may be
    /// retried.
    pub fn initialize(&self) -> Result<(), AuthError> {
        let mut slot = self.listener.lock();
        if slot.is_some() {
            tracing::trace!("session manager already initialized");
            return Ok(());
        }

        let state = Arc::clone(&self.state);
        let observers = Arc::clone(&self.observers);
        let registration = self.auth.on_state_change(Box::new(move |identity| {
            if let Some(published) = apply_notification(&state, identity) {
                notify_observers(&observers, &published);
            }
        }));

        match registration {
            Ok(subscription) => {
                *slot = Some(subscription);
                tracing::debug!("auth state listener registered");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not register auth state listener");
                Err(e)
            }
        }
    }

    /// Waits for the first auth notification and returns the state at
    /// that point (or later, if more notifications already arrived).
    ///
    /// Never completes if `initialize` was not called.
    pub async fn ready(&self) -> SessionState {
        let mut rx = self.state.subscribe();
        // The sender lives as long as `self`, so the wait cannot fail.
        match rx.wait_for(|s| s.ready).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        }
    }

    /// Current session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Returns a receiver notified on every session change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Registers a synchronous observer, called with every published state
    /// on the thread that delivered the auth notification.
    ///
    /// Observers run outside the manager's locks but must not block.
    /// Concurrent notifications may reach an observer out of order;
    /// [`SessionState::changes`] tells newer states from older ones.
    pub fn observe(
        &self,
        observer: impl Fn(&SessionState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = {
            let mut observers = self.observers.lock();
            let id = observers.next_id;
            observers.next_id += 1;
            observers.list.push((id, Arc::new(observer)));
            id
        };
        let observers = Arc::downgrade(&self.observers);
        Subscription::new(move || {
            if let Some(observers) = observers.upgrade() {
                observers.lock().list.retain(|(other, _)| *other != id);
            }
        })
    }

    /// Latest known identity. Only meaningful once [`Self::is_ready`].
    #[must_use]
    pub fn current_identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    /// Returns `true` once the first notification has been received.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    /// The navigation signal: settled and signed in.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        let initialized = self.listener.lock().is_some();
        let state = self.state.borrow();
        match (initialized, state.ready, state.identity.is_some()) {
            (false, false, _) => SessionPhase::Uninitialized,
            (true, false, _) => SessionPhase::AwaitingFirstNotification,
            (_, true, true) => SessionPhase::SignedIn,
            (_, true, false) => SessionPhase::SignedOut,
        }
    }

    /// Asks the auth service to end the session.
    ///
    /// The published identity is not touched here; it changes when the
    /// service notifies the listener. While a request is outstanding,
    /// further calls return `Ok(())` without contacting the service.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SignOut`] if the service fails the request.
    /// The session state keeps the last identity the service confirmed.
    pub async fn sign_out(&self) -> Result<(), AuthError> {
        if self.signing_out.swap(true, Ordering::AcqRel) {
            tracing::debug!("sign-out already in flight");
            return Ok(());
        }
        let _in_flight = InFlight(&self.signing_out);

        match self.auth.sign_out().await {
            Ok(()) => {
                tracing::info!("sign-out requested");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "sign-out failed");
                Err(e)
            }
        }
    }
}

/// Clears the in-flight flag when the sign-out future completes or is
/// dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Applies one auth notification to the published state and returns the
/// new state if anything changed.
///
/// Receivers are only woken when readiness settles or the uid changes.
fn apply_notification(
    state: &watch::Sender<SessionState>,
    identity: Option<Identity>,
) -> Option<SessionState> {
    let mut published = None;
    state.send_if_modified(|s| {
        let settling = !s.ready;
        let changed = s.identity != identity;
        if settling {
            tracing::info!(signed_in = identity.is_some(), "session settled");
        } else if changed {
            tracing::debug!(
                uid = identity.as_ref().map_or("<none>", Identity::uid),
                "session identity changed"
            );
        }
        s.ready = true;
        s.identity = identity;
        if settling || changed {
            s.changes += 1;
            published = Some(s.clone());
            true
        } else {
            false
        }
    });
    published
}

fn notify_observers(observers: &Mutex<Observers>, state: &SessionState) {
    let current: Vec<SessionObserver> = observers
        .lock()
        .list
        .iter()
        .map(|(_, observer)| Arc::clone(observer))
        .collect();
    for observer in current {
        observer(state);
    }
}

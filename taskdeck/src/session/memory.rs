//! In-process authentication service.
//!
//! [`MemoryAuth`] behaves like a hosted auth backend as far as the
//! [`AuthService`] contract goes: each new listener immediately receives
//! the current state, and every sign-in, expiry, or sign-out is fanned
//! out to all listeners. Failure injection and a deferred mode let tests
//! exercise the awaiting-first-notification window and error paths.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use super::{AuthError, AuthService, Identity, IdentityListener};
use crate::subscription::Subscription;

type SharedListener = Arc<dyn Fn(Option<Identity>) + Send + Sync>;

#[derive(Default)]
struct AuthInner {
    current: Option<Identity>,
    listeners: HashMap<u64, SharedListener>,
    next_listener_id: u64,
    registrations: usize,
    sign_out_calls: usize,
    /// Skip the initial notification to new listeners.
    deferred: bool,
    /// When set, sign-out clears the session without notifying.
    quiet_sign_out: bool,
    fail_next_registration: bool,
    sign_out_failure: Option<String>,
    sign_out_delay: Option<Duration>,
}

/// In-memory [`AuthService`].
#[derive(Default)]
pub struct MemoryAuth {
    inner: Arc<Mutex<AuthInner>>,
}

impl MemoryAuth {
    /// Creates a signed-out service that notifies new listeners right away.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service that does not notify new listeners until the next
    /// session change or [`emit_current`](Self::emit_current).
    #[must_use]
    pub fn deferred() -> Self {
        let auth = Self::default();
        auth.inner.lock().deferred = true;
        auth
    }

    /// Delays every sign-out request by `delay` before it takes effect.
    #[must_use]
    pub fn with_sign_out_delay(self, delay: Duration) -> Self {
        self.inner.lock().sign_out_delay = Some(delay);
        self
    }

    /// Signs `identity` in and notifies every listener.
    pub fn sign_in(&self, identity: Identity) {
        self.inner.lock().current = Some(identity);
        self.emit_current();
    }

    /// Ends the session as if it expired server-side.
    pub fn expire(&self) {
        self.inner.lock().current = None;
        self.emit_current();
    }

    /// Re-delivers the current state to every listener.
    pub fn emit_current(&self) {
        let (identity, listeners) = {
            let inner = self.inner.lock();
            let listeners: Vec<SharedListener> = inner.listeners.values().cloned().collect();
            (inner.current.clone(), listeners)
        };
        for listener in listeners {
            listener(identity.clone());
        }
    }

    /// Identity the service currently considers signed in.
    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.inner.lock().current.clone()
    }

    /// Number of listeners currently registered.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Number of successful registrations over the service's lifetime.
    #[must_use]
    pub fn registration_count(&self) -> usize {
        self.inner.lock().registrations
    }

    /// Number of sign-out requests received.
    #[must_use]
    pub fn sign_out_calls(&self) -> usize {
        self.inner.lock().sign_out_calls
    }

    /// Makes the next `on_state_change` call fail.
    pub fn fail_next_registration(&self) {
        self.inner.lock().fail_next_registration = true;
    }

    /// Makes sign-out requests fail with `reason` until cleared.
    pub fn fail_sign_out(&self, reason: &str) {
        self.inner.lock().sign_out_failure = Some(reason.to_string());
    }

    /// Removes all injected failures.
    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock();
        inner.fail_next_registration = false;
        inner.sign_out_failure = None;
    }

    /// Controls whether a successful sign-out notifies listeners.
    pub fn set_notify_on_sign_out(&self, notify: bool) {
        self.inner.lock().quiet_sign_out = !notify;
    }
}

fn remove_listener(inner: &Weak<Mutex<AuthInner>>, id: u64) {
    if let Some(inner) = inner.upgrade() {
        inner.lock().listeners.remove(&id);
    }
}

impl AuthService for MemoryAuth {
    fn on_state_change(&self, listener: IdentityListener) -> Result<Subscription, AuthError> {
        let listener: SharedListener = Arc::from(listener);
        let (id, initial) = {
            let mut inner = self.inner.lock();
            if std::mem::take(&mut inner.fail_next_registration) {
                return Err(AuthError::Registration("injected failure".to_string()));
            }
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.registrations += 1;
            inner.listeners.insert(id, Arc::clone(&listener));
            let initial = (!inner.deferred).then(|| inner.current.clone());
            (id, initial)
        };

        if let Some(identity) = initial {
            listener(identity);
        }

        let weak = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || remove_listener(&weak, id)))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let delay = {
            let mut inner = self.inner.lock();
            inner.sign_out_calls += 1;
            inner.sign_out_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let notify = {
            let mut inner = self.inner.lock();
            if let Some(reason) = inner.sign_out_failure.clone() {
                return Err(AuthError::SignOut(reason));
            }
            inner.current = None;
            !inner.quiet_sign_out
        };
        if notify {
            self.emit_current();
        }
        Ok(())
    }
}

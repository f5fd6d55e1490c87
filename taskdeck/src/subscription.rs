//! Scoped listener registrations.
//!
//! Every collaborator that accepts a listener hands back a [`Subscription`].
//! Cancelling it detaches the listener; the cancel action runs at most
//! once, whether through [`Subscription::cancel`] or on drop.

use std::fmt;

/// Handle to a registered listener. Dropping it detaches the listener.
#[must_use = "dropping a Subscription detaches its listener immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wraps the action that detaches a listener.
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to detach.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Detaches the listener. Calling this again is a no-op.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Returns `true` until the listener has been detached.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.cancel.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

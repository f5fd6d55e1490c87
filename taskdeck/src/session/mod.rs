//! Authentication identity tracking for `Taskdeck`.
//!
//! [`SessionManager`] keeps one persistent listener on an [`AuthService`]
//! and publishes a [`SessionState`] that settles `ready` on the first
//! notification. [`memory::MemoryAuth`] is an in-process auth service for
//! tests and the demo.

pub mod manager;
pub mod memory;

use std::fmt;
use std::future::Future;
use std::hash::{Hash, Hasher};

pub use manager::SessionManager;
pub use memory::MemoryAuth;

use crate::subscription::Subscription;

/// Errors reported by the authentication service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The state listener could not be registered.
    #[error("failed to register auth state listener: {0}")]
    Registration(String),
    /// The service refused or failed to end the session.
    #[error("sign-out failed: {0}")]
    SignOut(String),
}

/// The authenticated principal of a session.
///
/// Two identities are equal when their stable `uid`s are equal; profile
/// fields are informational.
#[derive(Debug, Clone, Eq)]
pub struct Identity {
    uid: String,
    email: Option<String>,
    display_name: Option<String>,
}

impl Identity {
    /// Creates an identity with the given stable identifier.
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
            display_name: None,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Stable identifier; also the owner id of the identity's tasks.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Email address, if the service reported one.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Display name, if the service reported one.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uid.hash(state);
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uid)
    }
}

/// Observable session state.
///
/// `identity` is only meaningful once `ready` is `true`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Latest identity confirmed by the auth service.
    pub identity: Option<Identity>,
    /// Set on the first notification from the auth service and never
    /// cleared afterwards.
    pub ready: bool,
    /// Number of updates published so far. Advances when readiness settles
    /// and on every identity change, so an observer that sees it jump by
    /// more than one knows it missed an intermediate state.
    pub changes: u64,
}

impl SessionState {
    /// Returns `true` when the state is settled and carries an identity.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.ready && self.identity.is_some()
    }
}

/// Lifecycle phase of a [`SessionManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// `initialize` has not registered a listener yet.
    Uninitialized,
    /// Listener registered, first notification not yet received.
    AwaitingFirstNotification,
    /// Settled with an identity.
    SignedIn,
    /// Settled without an identity.
    SignedOut,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::AwaitingFirstNotification => write!(f, "awaiting-first-notification"),
            Self::SignedIn => write!(f, "signed-in"),
            Self::SignedOut => write!(f, "signed-out"),
        }
    }
}

/// Callback invoked with the new identity (or `None`) on every session
/// change.
pub type IdentityListener = Box<dyn Fn(Option<Identity>) + Send + Sync>;

/// Authentication service collaborator.
///
/// Implementations deliver the current identity to every registered
/// listener whenever the session changes, starting with one notification
/// describing the state at registration time.
pub trait AuthService: Send + Sync + 'static {
    /// Registers a state listener.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Registration`] if the listener cannot be
    /// registered.
    fn on_state_change(&self, listener: IdentityListener) -> Result<Subscription, AuthError>;

    /// Ends the current session. On success the service notifies its
    /// listeners with `None`.
    fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send;
}

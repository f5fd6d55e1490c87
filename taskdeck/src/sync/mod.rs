//! Live per-owner task collection sync for `Taskdeck`.
//!
//! [`TaskCollectionSync`] holds at most one subscription to a
//! [`TaskStore`] and projects each full-collection notification into a
//! [`SyncState`]. Notifications from superseded subscriptions are
//! discarded by generation token.

pub mod collection;
pub mod memory;

pub use collection::TaskCollectionSync;
pub use memory::MemoryTaskStore;

use taskdeck_proto::task::{RawTaskRecord, TaskSnapshot};

use crate::subscription::Subscription;

/// Errors reported by the task store for a live subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    /// The store refused access to the collection.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    /// The store could not be reached or dropped the stream.
    #[error("store unavailable: {0}")]
    Unavailable(String),
    /// Any other store failure.
    #[error("subscription failed: {0}")]
    Other(String),
}

/// Callback receiving the full current collection.
pub type DataListener = Box<dyn Fn(Vec<RawTaskRecord>) + Send + Sync>;

/// Callback receiving a subscription failure.
pub type ErrorListener = Box<dyn Fn(SubscriptionError) + Send + Sync>;

/// Remote task store collaborator.
pub trait TaskStore: Send + Sync + 'static {
    /// Opens a live subscription to `owner`'s task collection.
    ///
    /// `on_data` receives the whole collection on every change, starting
    /// with its current contents. `on_error` receives failures; the store
    /// does not retry on its own.
    fn subscribe(&self, owner: &str, on_data: DataListener, on_error: ErrorListener)
    -> Subscription;
}

/// Observable state of a [`TaskCollectionSync`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncState {
    /// Owner of the open subscription, if any.
    pub owner: Option<String>,
    /// Generation of the open subscription; bumped by every start and stop.
    pub generation: u64,
    /// Latest projected collection.
    pub snapshot: TaskSnapshot,
    /// True from `start` until the first notification or failure.
    pub loading: bool,
    /// Last failure reported for the current subscription.
    pub error: Option<SubscriptionError>,
}

impl SyncState {
    /// Returns `true` while a subscription is open.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.owner.is_some()
    }
}

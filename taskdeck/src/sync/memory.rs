//! In-process task store.
//!
//! [`MemoryTaskStore`] keeps one collection per owner and pushes the full
//! collection to every subscriber of that owner on each change, starting
//! with the current contents at subscribe time.
//!
//! In deferred mode notifications are queued instead of delivered, and
//! [`MemoryTaskStore::flush`] delivers them later, including to listeners
//! whose subscription was cancelled in the meantime. That reproduces a
//! notification that was already in flight when the subscriber detached.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use taskdeck_proto::task::RawTaskRecord;
use uuid::Uuid;

use super::{DataListener, ErrorListener, SubscriptionError, TaskStore};
use crate::subscription::Subscription;

type SharedData = Arc<dyn Fn(Vec<RawTaskRecord>) + Send + Sync>;
type SharedError = Arc<dyn Fn(SubscriptionError) + Send + Sync>;

struct Listener {
    owner: String,
    on_data: SharedData,
    on_error: SharedError,
}

enum Delivery {
    Data(SharedData, Vec<RawTaskRecord>),
    Error(SharedError, SubscriptionError),
}

impl Delivery {
    fn run(self) {
        match self {
            Self::Data(listener, records) => listener(records),
            Self::Error(listener, error) => listener(error),
        }
    }
}

#[derive(Default)]
struct StoreInner {
    /// Owner -> (document id -> record).
    collections: HashMap<String, BTreeMap<String, RawTaskRecord>>,
    listeners: HashMap<u64, Listener>,
    next_listener_id: u64,
    subscribe_count: usize,
    deferred: bool,
    queue: VecDeque<Delivery>,
}

impl StoreInner {
    fn records(&self, owner: &str) -> Vec<RawTaskRecord> {
        self.collections
            .get(owner)
            .map(|c| c.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Builds a full-collection delivery for every subscriber of `owner`.
    fn fan_out(&self, owner: &str) -> Vec<Delivery> {
        let records = self.records(owner);
        self.listeners
            .values()
            .filter(|l| l.owner == owner)
            .map(|l| Delivery::Data(Arc::clone(&l.on_data), records.clone()))
            .collect()
    }
}

/// In-memory [`TaskStore`].
#[derive(Default)]
pub struct MemoryTaskStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl MemoryTaskStore {
    /// Creates a store that delivers notifications synchronously.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that queues notifications until [`Self::flush`].
    #[must_use]
    pub fn deferred() -> Self {
        let store = Self::default();
        store.inner.lock().deferred = true;
        store
    }

    /// Inserts or replaces a record in `owner`'s collection.
    pub fn put(&self, owner: &str, record: RawTaskRecord) {
        let deliveries = {
            let mut inner = self.inner.lock();
            inner
                .collections
                .entry(owner.to_string())
                .or_default()
                .insert(record.id.clone(), record);
            inner.fan_out(owner)
        };
        self.dispatch(deliveries);
    }

    /// Adds a document with a store-assigned id and returns that id.
    pub fn add(&self, owner: &str, fields: Map<String, Value>) -> String {
        let id = Uuid::now_v7().to_string();
        self.put(
            owner,
            RawTaskRecord {
                id: id.clone(),
                fields,
            },
        );
        id
    }

    /// Removes a record. Returns `false` if it did not exist.
    pub fn remove(&self, owner: &str, id: &str) -> bool {
        let (removed, deliveries) = {
            let mut inner = self.inner.lock();
            let removed = inner
                .collections
                .get_mut(owner)
                .and_then(|c| c.remove(id))
                .is_some();
            let deliveries = if removed {
                inner.fan_out(owner)
            } else {
                Vec::new()
            };
            (removed, deliveries)
        };
        self.dispatch(deliveries);
        removed
    }

    /// Reports `error` to every subscriber of `owner`.
    pub fn fail(&self, owner: &str, error: SubscriptionError) {
        let deliveries: Vec<Delivery> = {
            let inner = self.inner.lock();
            inner
                .listeners
                .values()
                .filter(|l| l.owner == owner)
                .map(|l| Delivery::Error(Arc::clone(&l.on_error), error.clone()))
                .collect()
        };
        self.dispatch(deliveries);
    }

    /// Delivers every queued notification in order and returns how many
    /// were delivered. Listeners cancelled since queueing still run.
    pub fn flush(&self) -> usize {
        let mut delivered = 0;
        // Deliveries may enqueue more work; drain until quiet.
        loop {
            let batch: Vec<Delivery> = self.inner.lock().queue.drain(..).collect();
            if batch.is_empty() {
                return delivered;
            }
            delivered += batch.len();
            for delivery in batch {
                delivery.run();
            }
        }
    }

    /// Number of queued notifications.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().queue.len()
    }

    /// Number of open subscriptions across all owners.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Number of `subscribe` calls over the store's lifetime.
    #[must_use]
    pub fn subscribe_count(&self) -> usize {
        self.inner.lock().subscribe_count
    }

    /// Current records of `owner`.
    #[must_use]
    pub fn records(&self, owner: &str) -> Vec<RawTaskRecord> {
        self.inner.lock().records(owner)
    }

    /// Runs deliveries now, or queues them in deferred mode. Never called
    /// with the store lock held.
    fn dispatch(&self, deliveries: Vec<Delivery>) {
        if deliveries.is_empty() {
            return;
        }
        {
            let mut inner = self.inner.lock();
            if inner.deferred {
                inner.queue.extend(deliveries);
                return;
            }
        }
        for delivery in deliveries {
            delivery.run();
        }
    }
}

fn remove_listener(inner: &Weak<Mutex<StoreInner>>, id: u64) {
    if let Some(inner) = inner.upgrade() {
        inner.lock().listeners.remove(&id);
    }
}

impl TaskStore for MemoryTaskStore {
    fn subscribe(
        &self,
        owner: &str,
        on_data: DataListener,
        on_error: ErrorListener,
    ) -> Subscription {
        let on_data: SharedData = Arc::from(on_data);
        let (id, initial) = {
            let mut inner = self.inner.lock();
            let id = inner.next_listener_id;
            inner.next_listener_id += 1;
            inner.subscribe_count += 1;
            inner.listeners.insert(
                id,
                Listener {
                    owner: owner.to_string(),
                    on_data: Arc::clone(&on_data),
                    on_error: Arc::from(on_error),
                },
            );
            (id, Delivery::Data(on_data, inner.records(owner)))
        };
        self.dispatch(vec![initial]);

        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || remove_listener(&weak, id))
    }
}

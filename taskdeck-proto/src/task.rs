//! Task record contract for `Taskdeck`.
//!
//! The remote store hands out documents with untyped field presence: any
//! field may be missing, null, or carry a legacy encoding (`0`/`1` flags,
//! `userId` instead of `ownerId`). [`Task::from_raw`] projects such a
//! document into a typed [`Task`], filling the documented defaults for
//! anything it cannot read. A [`TaskSnapshot`] is the full projected
//! collection for one owner at one point in time.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field names accepted for the owner, newest first.
const OWNER_KEYS: &[&str] = &["ownerId", "userId"];
/// Field names accepted for the sync flag.
const SYNC_KEYS: &[&str] = &["syncFlag", "isSynced"];
/// Field names accepted for the soft-delete marker.
const DELETED_KEYS: &[&str] = &["deletedFlag", "isDeleted"];

/// Errors raised when a raw record cannot be projected into a [`Task`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The record carries no document identifier.
    #[error("task record has no id")]
    MissingId,
    /// The record names an owner other than the collection's owner.
    #[error("task {id} belongs to {found}, not {expected}")]
    ForeignOwner {
        /// Document identifier of the rejected record.
        id: String,
        /// Owner the collection was opened for.
        expected: String,
        /// Owner named by the record.
        found: String,
    },
    /// A priority string outside `low`/`medium`/`high`.
    #[error("unknown priority: {0}")]
    UnknownPriority(String),
}

/// Priority level of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Default priority.
    #[default]
    Low,
    /// Medium priority.
    Medium,
    /// High priority.
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(RecordError::UnknownPriority(s.to_string())),
        }
    }
}

/// Whether the store has acknowledged the latest local write of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncFlag {
    /// A write is still waiting to reach the store.
    Pending,
    /// The record matches the store.
    #[default]
    Synced,
}

impl fmt::Display for SyncFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Synced => write!(f, "synced"),
        }
    }
}

/// A document as delivered by the task store: an identifier assigned by
/// the store plus whatever fields the document happens to contain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTaskRecord {
    /// Store-assigned document identifier.
    pub id: String,
    /// Document body. Field presence and types are not guaranteed.
    pub fields: Map<String, Value>,
}

impl RawTaskRecord {
    /// Creates a record with an empty body.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Map::new(),
        }
    }

    /// Creates a record from a JSON value. Non-object values yield an
    /// empty body.
    pub fn from_json(id: impl Into<String>, body: Value) -> Self {
        let fields = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Sets a single field, returning the updated record.
    #[must_use]
    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }

    /// Returns the first non-null value among `keys`.
    fn first(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|k| self.fields.get(*k))
            .find(|v| !v.is_null())
    }
}

/// A single task as seen by consumers of the sync layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Store-assigned identifier, unique within one owner's collection.
    pub id: String,
    /// Identity that owns the collection this task was read from.
    pub owner_id: String,
    /// Task title. Empty when the document has none.
    pub title: String,
    /// Whether the task is done.
    pub completed: bool,
    /// Creation time assigned by the store.
    pub created_at: Option<DateTime<Utc>>,
    /// Last update time assigned by the store.
    pub updated_at: Option<DateTime<Utc>>,
    /// Write acknowledgement state.
    pub sync_flag: SyncFlag,
    /// Soft-delete marker.
    pub deleted_flag: bool,
    /// Optional due date.
    pub due_date: Option<NaiveDate>,
    /// Priority, `low` unless the document says otherwise.
    pub priority: Priority,
}

impl Task {
    /// Projects a raw store document into a `Task` owned by `owner`.
    ///
    /// Missing or unreadable fields take their defaults: empty title,
    /// not completed, [`SyncFlag::Synced`], not deleted, [`Priority::Low`],
    /// no timestamps, no due date. A missing owner field is filled with
    /// `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingId`] for a record without an id, and
    /// [`RecordError::ForeignOwner`] when the document names a different
    /// owner than the collection was opened for.
    pub fn from_raw(raw: &RawTaskRecord, owner: &str) -> Result<Self, RecordError> {
        if raw.id.is_empty() {
            return Err(RecordError::MissingId);
        }

        // Legacy documents carry a numeric placeholder here; only a string
        // owner is authoritative.
        if let Some(Value::String(found)) = raw.first(OWNER_KEYS)
            && !found.is_empty()
            && found != owner
        {
            return Err(RecordError::ForeignOwner {
                id: raw.id.clone(),
                expected: owner.to_string(),
                found: found.clone(),
            });
        }

        Ok(Self {
            id: raw.id.clone(),
            owner_id: owner.to_string(),
            title: raw
                .first(&["title"])
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            completed: raw.first(&["completed"]).and_then(as_flag).unwrap_or(false),
            created_at: raw.first(&["createdAt"]).and_then(as_timestamp),
            updated_at: raw.first(&["updatedAt"]).and_then(as_timestamp),
            sync_flag: raw
                .first(SYNC_KEYS)
                .and_then(as_sync_flag)
                .unwrap_or_default(),
            deleted_flag: raw.first(DELETED_KEYS).and_then(as_flag).unwrap_or(false),
            due_date: raw.first(&["dueDate"]).and_then(as_date),
            priority: raw
                .first(&["priority"])
                .and_then(Value::as_str)
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
        })
    }

    /// Returns `true` unless the task is soft-deleted.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !self.deleted_flag
    }
}

/// Reads a boolean flag stored as a bool, a number, or a string.
fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n.abs() > 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_sync_flag(value: &Value) -> Option<SyncFlag> {
    if let Value::String(s) = value {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => return Some(SyncFlag::Pending),
            "synced" => return Some(SyncFlag::Synced),
            _ => {}
        }
    }
    as_flag(value).map(|synced| {
        if synced {
            SyncFlag::Synced
        } else {
            SyncFlag::Pending
        }
    })
}

/// Reads a store timestamp: RFC 3339 text, epoch milliseconds, or a
/// `{seconds, nanoseconds}` object (leading underscores allowed).
fn as_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map
                .get("seconds")
                .or_else(|| map.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .or_else(|| map.get("_nanoseconds"))
                .and_then(Value::as_u64)
                .and_then(|n| u32::try_from(n).ok())
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, nanos)
        }
        _ => None,
    }
}

/// Reads a due date as `YYYY-MM-DD` or the date part of an RFC 3339 time.
fn as_date(value: &Value) -> Option<NaiveDate> {
    let s = value.as_str()?.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok().or_else(|| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc).date_naive())
    })
}

/// The full projected task collection of one owner.
///
/// Snapshots are never patched: every store notification produces a new
/// one that replaces the previous snapshot as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSnapshot {
    tasks: Vec<Task>,
}

impl TaskSnapshot {
    /// Creates a snapshot from already-projected tasks.
    #[must_use]
    pub const fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }

    /// Number of tasks, soft-deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` if the snapshot holds no tasks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Iterates over every task, soft-deleted ones included.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Tasks that are not soft-deleted.
    #[must_use]
    pub fn active(&self) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.is_active()).collect()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Number of tasks with a write still pending.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.sync_flag == SyncFlag::Pending)
            .count()
    }

    /// Returns `true` if every task belongs to `owner`.
    #[must_use]
    pub fn is_owned_by(&self, owner: &str) -> bool {
        self.tasks.iter().all(|t| t.owner_id == owner)
    }
}

impl<'a> IntoIterator for &'a TaskSnapshot {
    type Item = &'a Task;
    type IntoIter = std::slice::Iter<'a, Task>;

    fn into_iter(self) -> Self::IntoIter {
        self.tasks.iter()
    }
}

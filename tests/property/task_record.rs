//! Property tests for raw task record projection and the suggestion parser.
//!
//! Verifies that:
//! 1. Arbitrary documents never panic during projection.
//! 2. A projected task always belongs to the collection owner.
//! 3. Documents without a string owner field are never rejected.
//! 4. The comma-split parser yields trimmed, non-empty, comma-free entries.

use proptest::prelude::*;
use serde_json::{Map, Value};
use taskdeck_proto::suggest::parse_task_list;
use taskdeck_proto::task::{Priority, RawTaskRecord, RecordError, SyncFlag, Task};

/// Field names the projection knows about, plus a couple it does not.
const KEYS: &[&str] = &[
    "ownerId",
    "userId",
    "title",
    "completed",
    "createdAt",
    "updatedAt",
    "syncFlag",
    "isSynced",
    "deletedFlag",
    "isDeleted",
    "dueDate",
    "priority",
    "color",
    "tags",
];

/// Strategy for arbitrary JSON values, two levels deep.
fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<f64>().prop_map(Value::from),
        ".{0,24}".prop_map(Value::String),
        prop_oneof![
            Just("low"),
            Just("HIGH"),
            Just("pending"),
            Just("2024-02-29"),
            Just("2024-01-01T00:00:00Z")
        ]
        .prop_map(|s| Value::String(s.to_string())),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,12}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

/// Strategy for a raw record whose body uses the known field names.
fn arb_record() -> impl Strategy<Value = RawTaskRecord> {
    (
        "[a-zA-Z0-9]{0,12}",
        prop::collection::vec((prop::sample::select(KEYS), arb_json()), 0..10),
    )
        .prop_map(|(id, fields)| {
            let mut raw = RawTaskRecord::new(id);
            for (key, value) in fields {
                raw = raw.with_field(key, value);
            }
            raw
        })
}

proptest! {
    /// Projection never panics, and a projected task belongs to the owner.
    #[test]
    fn projection_is_total_and_owned(raw in arb_record(), owner in "[a-z]{1,8}") {
        match Task::from_raw(&raw, &owner) {
            Ok(task) => {
                prop_assert_eq!(&task.owner_id, &owner);
                prop_assert_eq!(&task.id, &raw.id);
            }
            Err(RecordError::MissingId) => prop_assert!(raw.id.is_empty()),
            Err(RecordError::ForeignOwner { expected, found, .. }) => {
                prop_assert_eq!(&expected, &owner);
                prop_assert_ne!(&found, &owner);
            }
            Err(other) => prop_assert!(false, "unexpected error: {other}"),
        }
    }

    /// Records without any owner field always project, with defaults for
    /// every field that is absent.
    #[test]
    fn ownerless_records_always_project(id in "[a-z0-9]{1,12}", owner in "[a-z]{1,8}") {
        let task = Task::from_raw(&RawTaskRecord::new(id), &owner)
            .expect("ownerless record should project");
        prop_assert_eq!(task.priority, Priority::Low);
        prop_assert_eq!(task.sync_flag, SyncFlag::Synced);
        prop_assert!(!task.deleted_flag);
    }

    /// Parsed entries are trimmed, non-empty, and contain no commas.
    #[test]
    fn parsed_entries_are_clean(text in ".{0,200}") {
        let tasks = parse_task_list(&text);
        prop_assert!(tasks.len() <= text.matches(',').count() + 1);
        for t in &tasks {
            prop_assert!(!t.is_empty());
            prop_assert_eq!(t.trim(), t.as_str());
            prop_assert!(!t.contains(','));
        }
    }

    /// Joining clean entries with commas and parsing again is lossless.
    #[test]
    fn parse_preserves_order(entries in prop::collection::vec("[A-Za-z][A-Za-z ]{0,20}[A-Za-z]", 0..6)) {
        let text = entries.join(" , ");
        prop_assert_eq!(parse_task_list(&text), entries);
    }
}

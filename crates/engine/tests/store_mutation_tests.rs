//! Mutation semantics of DocumentStore
//!
//! - No-op idempotence (no timestamp bump, no disk write)
//! - Optimistic concurrency with version tokens
//! - Ordering of the sorted view, including re-ordering after updates
//! - Write failures leave memory untouched and the queue usable

use chrono::NaiveDate;
use planstore_core::{StoreError, Version};
use planstore_engine::{
    DocumentStore, Plan, PlanDraft, PlanFields, PlanFilter, PlanPatch, StoreOptions,
    WriteOptions,
};
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

fn open_plans(path: &Path) -> DocumentStore<Plan> {
    DocumentStore::open(path, StoreOptions::default()).unwrap()
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn dates(store: &DocumentStore<Plan>, filter: &PlanFilter) -> Vec<NaiveDate> {
    store
        .list(filter)
        .unwrap()
        .into_iter()
        .map(|r| r.fields.date)
        .collect()
}

// ============================================================================
// Create / Get
// ============================================================================

#[test]
fn test_create_assigns_ids_and_timestamps() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));

    let a = store
        .create(PlanDraft::new("Easy", "2024-01-05", "Run").with_metadata("rpe", json!(3)))
        .unwrap();
    let b = store
        .create(PlanDraft::new("Lift", "2024-01-06", "strength"))
        .unwrap();

    assert_eq!((a.id, b.id), (1, 2));
    assert_eq!(a.created_at, a.updated_at);
    assert_eq!(a.fields.category, "run");
    assert_eq!(store.get(1).unwrap(), Some(a));
    assert_eq!(store.get(99).unwrap(), None);
}

#[test]
fn test_invalid_input_is_rejected_without_write() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plans.json");
    let store = open_plans(&path);
    let before = std::fs::read(&path).unwrap();

    let err = store
        .create(PlanDraft::new("Easy", "2024-13-01", "run"))
        .unwrap_err();
    match err {
        StoreError::Validation(e) => assert_eq!(e.field, "date"),
        other => panic!("expected validation error, got {:?}", other),
    }

    assert_eq!(std::fs::read(&path).unwrap(), before);
    assert_eq!(store.check_health().unwrap().next_id, 1);
}

#[test]
fn test_returned_records_are_copies() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    let mut created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run"))
        .unwrap();

    created.fields.title = "Mutated".to_string();
    created.fields.metadata.insert("x".to_string(), json!(1));

    let stored = store.get(created.id).unwrap().unwrap();
    assert_eq!(stored.fields.title, "Easy");
    assert!(stored.fields.metadata.is_empty());
}

// ============================================================================
// Update / Replace / Delete
// ============================================================================

#[test]
fn test_update_missing_record_is_not_found() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));

    let err = store
        .update(7, PlanPatch::new().title("x"), WriteOptions::none())
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(7)));

    let err = store
        .replace(7, PlanDraft::new("x", "2024-01-01", "run"), WriteOptions::none())
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(7)));
}

#[test]
fn test_delete_missing_record_is_false() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    assert!(!store.delete(42, WriteOptions::none()).unwrap());
}

#[test]
fn test_update_bumps_updated_at_and_version() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    let created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run"))
        .unwrap();

    let updated = store
        .update(created.id, PlanPatch::new().title("Easier"), WriteOptions::none())
        .unwrap();
    assert!(updated.updated_at > created.updated_at);
    assert_eq!(updated.created_at, created.created_at);
    assert_ne!(updated.version().unwrap(), created.version().unwrap());
}

#[test]
fn test_noop_update_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plans.json");
    let store = open_plans(&path);
    let created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run").with_content("5 km"))
        .unwrap();
    let on_disk = std::fs::read(&path).unwrap();

    let same = store
        .update(
            created.id,
            PlanPatch::new().title("Easy").content("5 km").category("RUN"),
            WriteOptions::none(),
        )
        .unwrap();
    assert_eq!(same, created);
    assert_eq!(same.version().unwrap(), created.version().unwrap());
    assert_eq!(std::fs::read(&path).unwrap(), on_disk);

    let replaced = store
        .replace(
            created.id,
            PlanDraft::new(" Easy ", "2024-01-05", "run").with_content("5 km"),
            WriteOptions::none(),
        )
        .unwrap();
    assert_eq!(replaced.updated_at, created.updated_at);
    assert_eq!(std::fs::read(&path).unwrap(), on_disk);
}

#[test]
fn test_replace_resets_omitted_fields() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    let created = store
        .create(
            PlanDraft::new("Easy", "2024-01-05", "run")
                .with_content("5 km")
                .with_metadata("rpe", json!(3)),
        )
        .unwrap();

    let replaced = store
        .replace(
            created.id,
            PlanDraft::new("Swim", "2024-01-05", "swim"),
            WriteOptions::none(),
        )
        .unwrap();
    assert_eq!(replaced.fields.content, "");
    assert!(replaced.fields.metadata.is_empty());
    assert_eq!(replaced.created_at, created.created_at);
}

#[test]
fn test_conflicting_updates() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    let created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run"))
        .unwrap();
    let initial = created.version().unwrap();

    let first = store
        .update(
            created.id,
            PlanPatch::new().title("First"),
            WriteOptions::expecting(initial.clone()),
        )
        .unwrap();

    let err = store
        .update(
            created.id,
            PlanPatch::new().title("Second"),
            WriteOptions::expecting(initial.clone()),
        )
        .unwrap_err();
    let conflict = err.as_conflict().expect("expected conflict error");
    assert_eq!(conflict.id, created.id);
    assert_eq!(conflict.expected, initial);
    assert_eq!(conflict.current_version, first.version().unwrap());
    assert_eq!(conflict.current_record::<PlanFields>().unwrap(), first);

    // Store still holds the first update
    assert_eq!(store.get(created.id).unwrap(), Some(first));
}

#[test]
fn test_conflict_on_delete_and_replace() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    let created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run"))
        .unwrap();
    let stale = Version::from("not-the-current-version");

    let err = store
        .delete(created.id, WriteOptions::expecting(stale.clone()))
        .unwrap_err();
    assert!(err.is_conflict());

    let err = store
        .replace(
            created.id,
            PlanDraft::new("Other", "2024-01-05", "run"),
            WriteOptions::expecting(stale),
        )
        .unwrap_err();
    assert!(err.is_conflict());

    // Matching version passes
    assert!(store
        .delete(created.id, WriteOptions::expecting(created.version().unwrap()))
        .unwrap());
}

#[test]
fn test_version_survives_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plans.json");
    let version = {
        let store = open_plans(&path);
        store
            .create(PlanDraft::new("Easy", "2024-01-05", "run").with_metadata("z", json!({"b": 1, "a": 2})))
            .unwrap()
            .version()
            .unwrap()
    };

    let store = open_plans(&path);
    store
        .update(1, PlanPatch::new().title("Still mine"), WriteOptions::expecting(version))
        .unwrap();
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn test_list_orders_by_date() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));

    let first = store
        .create(PlanDraft::new("A", "2024-01-05", "run"))
        .unwrap();
    store
        .create(PlanDraft::new("B", "2024-01-01", "run"))
        .unwrap();

    assert_eq!(
        dates(&store, &PlanFilter::all()),
        vec![date("2024-01-01"), date("2024-01-05")]
    );

    store
        .update(first.id, PlanPatch::new().date("2023-12-01"), WriteOptions::none())
        .unwrap();
    assert_eq!(
        dates(&store, &PlanFilter::all()),
        vec![date("2023-12-01"), date("2024-01-01")]
    );
}

#[test]
fn test_same_date_ties_break_by_id() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    for title in ["c", "a", "b"] {
        store
            .create(PlanDraft::new(title, "2024-01-01", "run"))
            .unwrap();
    }
    let ids: Vec<_> = store
        .list(&PlanFilter::all())
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_list_filters_category_and_inclusive_range() {
    let temp_dir = TempDir::new().unwrap();
    let store = open_plans(&temp_dir.path().join("plans.json"));
    for (d, c) in [
        ("2024-01-01", "run"),
        ("2024-01-02", "swim"),
        ("2024-01-03", "run"),
        ("2024-01-04", "run"),
        ("2024-01-05", "run"),
    ] {
        store.create(PlanDraft::new("p", d, c)).unwrap();
    }

    let filter = PlanFilter::all()
        .category("RUN")
        .from(date("2024-01-02"))
        .to(date("2024-01-04"));
    assert_eq!(
        dates(&store, &filter),
        vec![date("2024-01-03"), date("2024-01-04")]
    );

    let swim = PlanFilter::all().category("swim");
    assert_eq!(dates(&store, &swim), vec![date("2024-01-02")]);

    let inverted = PlanFilter::all()
        .from(date("2024-02-01"))
        .to(date("2024-01-01"));
    assert!(dates(&store, &inverted).is_empty());
}

// ============================================================================
// Write failures
// ============================================================================

#[test]
fn test_failed_write_leaves_memory_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("plans.json");
    let store = open_plans(&path);
    let created = store
        .create(PlanDraft::new("Easy", "2024-01-05", "run"))
        .unwrap();

    // A non-empty directory at the target path makes the rename fail
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    std::fs::write(path.join("blocker"), b"x").unwrap();

    let err = store
        .update(created.id, PlanPatch::new().title("Lost"), WriteOptions::none())
        .unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));
    assert_eq!(store.get(created.id).unwrap(), Some(created.clone()));

    let err = store
        .create(PlanDraft::new("Also lost", "2024-01-06", "run"))
        .unwrap_err();
    assert!(matches!(err, StoreError::Io(_)));
    assert_eq!(store.check_health().unwrap().next_id, 2);

    // No temp files left behind
    let leftovers: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    // Queue is not wedged once the obstruction is gone
    std::fs::remove_dir_all(&path).unwrap();
    let next = store
        .create(PlanDraft::new("Works", "2024-01-07", "run"))
        .unwrap();
    assert_eq!(next.id, 2);

    let reopened = open_plans(&path);
    assert_eq!(reopened.check_health().unwrap().record_count, 2);
}

//! Mutation boundary, configuration files, seeds and lifecycle logging
//!
//! ## Scenarios Covered
//!
//! 1. Every `Mutation` variant runs through `apply()`
//! 2. `apply()` emits start/end events, or end_error with a stable code
//! 3. Configuration loaded from a TOML file drives result shaping and logging
//! 4. Seed files import with insert-or-update and are idempotent

mod common;

use std::io::Write;

use common::{blog_db, blog_models, ids_of};
use normstore_core::core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_AFFECTED, FIELD_DURATION_MS, FIELD_ERR_CODE,
    FIELD_ERR_KIND,
};
use normstore_core::logging_facility::init_test_capture;
use normstore_core::seed::{import_seed, parse_seed, parse_seed_file};
use normstore_core::{
    apply, Condition, Database, DatabaseConfig, Identity, Mutation, PersistOptions, ReturnData,
    StoreError, Update,
};
use serde_json::json;
use tempfile::NamedTempFile;

fn insert(entity: &str, data: serde_json::Value) -> Mutation {
    Mutation::Insert {
        entity: entity.to_string(),
        data,
        options: PersistOptions::default(),
    }
}

// ========== Command coverage ==========

#[test]
fn test_apply_runs_every_mutation() {
    let db = blog_db();

    let created = apply(
        &db,
        Mutation::Create {
            entity: "users".to_string(),
            data: json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]),
            options: PersistOptions::default(),
        },
    )
    .unwrap();
    assert_eq!(created.len(), 2);

    apply(&db, insert("users", json!({"id": 3, "name": "C"}))).unwrap();

    let upserted = apply(
        &db,
        Mutation::InsertOrUpdate {
            entity: "users".to_string(),
            data: json!([{"id": 1, "name": "A2"}, {"id": 4, "name": "D"}]),
            options: PersistOptions::default(),
        },
    )
    .unwrap();
    assert_eq!(upserted.ids(), vec![Identity::from(1), Identity::from(4)]);

    apply(
        &db,
        Mutation::Update {
            entity: "users".to_string(),
            update: Update::Partial(json!({"name": "B2"})),
            condition: Condition::from(2),
        },
    )
    .unwrap();

    let deleted = apply(
        &db,
        Mutation::Delete {
            entity: "users".to_string(),
            condition: Condition::from(3),
        },
    )
    .unwrap();
    assert_eq!(deleted.ids(), vec![Identity::from(3)]);

    let users = db.all("users").unwrap();
    assert_eq!(ids_of(&users), vec!["1", "2", "4"]);
    assert_eq!(users[1].get("name"), Some(&json!("B2")));

    let cleared = apply(&db, Mutation::DeleteAll { entity: None }).unwrap();
    assert_eq!(cleared, ReturnData::Empty);
    assert_eq!(db.count("users").unwrap(), 0);
}

#[test]
fn test_apply_propagates_errors() {
    let db = blog_db();

    let err = apply(&db, insert("ghosts", json!({"id": 1}))).unwrap_err();

    assert_eq!(
        err,
        StoreError::UnknownEntity {
            entity: "ghosts".to_string()
        }
    );
}

// ========== Lifecycle logging ==========

#[test]
fn test_apply_logs_start_and_end() {
    let capture = init_test_capture();
    let db = blog_db();

    apply(&db, insert("profiles", json!([{"bio": "a"}, {"bio": "b"}]))).unwrap();

    let events: Vec<_> = capture
        .events_for_op("insert")
        .into_iter()
        .filter(|e| e.entity.as_deref() == Some("profiles"))
        .collect();
    assert!(events
        .iter()
        .any(|e| e.event.as_deref() == Some(EVENT_START)));
    let end = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END))
        .expect("end event");
    assert_eq!(end.field(FIELD_AFFECTED), Some("2"));
    assert!(end.field(FIELD_DURATION_MS).is_some());
}

#[test]
fn test_apply_logs_error_code() {
    let capture = init_test_capture();
    let db = blog_db();

    let _ = apply(
        &db,
        Mutation::Delete {
            entity: "phantoms".to_string(),
            condition: Condition::from(1),
        },
    );

    let failure = capture
        .events_for_op("delete")
        .into_iter()
        .find(|e| {
            e.entity.as_deref() == Some("phantoms") && e.event.as_deref() == Some(EVENT_END_ERROR)
        })
        .expect("end_error event");
    assert_eq!(failure.field(FIELD_ERR_CODE), Some("ERR_UNKNOWN_ENTITY"));
    assert!(failure.field(FIELD_ERR_KIND).is_some());
    assert_eq!(failure.level, tracing::Level::ERROR);
}

// ========== Configuration ==========

#[test]
fn test_config_file_controls_wrapping() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "wrap = false").unwrap();
    writeln!(file, "recursive_depth = 1").unwrap();

    let config = DatabaseConfig::from_file(file.path()).unwrap();
    let db = Database::from_models(config, blog_models()).unwrap();
    db.query("users").unwrap().insert(&json!({"id": 1})).unwrap();

    let users = db.all("users").unwrap();
    assert!(!users[0].is_model());
    assert_eq!(db.config().recursive_depth, 1);
}

#[test]
fn test_config_logging_keeps_installed_capture() {
    let capture = init_test_capture();
    let config = DatabaseConfig::from_toml_str("logging = \"production\"").unwrap();
    config.init_logging();

    let db = Database::from_models(config, blog_models()).unwrap();
    apply(&db, insert("comments", json!({"id": 7, "body": "hi"}))).unwrap();

    assert!(capture
        .events_for_op("insert")
        .iter()
        .any(|e| e.entity.as_deref() == Some("comments") && e.event.as_deref() == Some(EVENT_END)));
}

#[test]
fn test_missing_config_file_is_io_error() {
    let err = DatabaseConfig::from_file("/nonexistent/normstore.toml").unwrap_err();

    assert!(matches!(err, StoreError::Io { .. }));
}

// ========== Seeds ==========

const SEED: &str = r#"
schema_version: 0
entities:
  users:
    - id: 1
      name: Ada
      roles:
        - { id: 1, name: admin }
    - { id: 2, name: Bob }
  posts:
    - { id: 1, user_id: 1, title: Engines }
    - { id: 2, user_id: 2, title: Hello }
"#;

#[test]
fn test_seed_file_imports_every_entity() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(SEED.as_bytes()).unwrap();
    let db = blog_db();

    let seed = parse_seed_file(file.path()).unwrap();
    let report = import_seed(&db, &seed).unwrap();

    assert_eq!(
        report.entities,
        vec![("users".to_string(), 2), ("posts".to_string(), 2)]
    );
    assert_eq!(report.total(), 4);
    assert_eq!(db.count("role_user").unwrap(), 1);

    let ada = db.query("users").unwrap().with("posts").find(1).unwrap().unwrap();
    assert_eq!(ada.get("posts").and_then(|p| p.as_array()).map(Vec::len), Some(1));
}

#[test]
fn test_seed_import_is_idempotent() {
    let db = blog_db();
    let seed = parse_seed(SEED).unwrap();

    import_seed(&db, &seed).unwrap();
    let first = db.snapshot();
    import_seed(&db, &seed).unwrap();

    assert_eq!(db.snapshot(), first);
}

#[test]
fn test_seed_with_unknown_entity_fails() {
    let db = blog_db();
    let seed = parse_seed("schema_version: 0\nentities:\n  ghosts: [{ id: 1 }]\n").unwrap();

    let err = import_seed(&db, &seed).unwrap_err();

    assert!(matches!(err, StoreError::UnknownEntity { .. }));
}

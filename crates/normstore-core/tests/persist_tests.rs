//! Write semantics: create, insert, insert-or-update, update and delete
//!
//! ## Scenarios Covered
//!
//! 1. Create replaces the target partition, insert merges into it
//! 2. Side entities found while normalizing are merged unless overridden
//! 3. Insert-or-update merges stored records and inserts new ones
//! 4. Updates by identity, by payload key and by predicate
//! 5. Deletes return what they removed; missing identities are no-ops
//! 6. Every write returns the canonical stored state

mod common;

use common::{blog_db, ids_of, plain_blog_db, seeded_blog_db};
use normstore_core::{Condition, Identity, PersistOptions, ReturnData, StoreError, Update};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::rc::Rc;

fn two_users() -> normstore_core::Database {
    let db = blog_db();
    db.query("users")
        .unwrap()
        .insert(&json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]))
        .unwrap();
    db
}

fn stored_name(db: &normstore_core::Database, id: i64) -> Option<Value> {
    db.state()
        .get("users", &Identity::from(id))
        .and_then(|record| record.get("name").cloned())
}

// ========== create / insert ==========

#[test]
fn test_create_replaces_partition() {
    let db = two_users();

    let result = db
        .query("users")
        .unwrap()
        .create(&json!([{"id": 3, "name": "C"}]))
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(3)]);
    assert_eq!(db.state().len("users"), 1);
    assert_eq!(stored_name(&db, 1), None);
}

#[test]
fn test_create_with_empty_payload_empties_partition() {
    let db = two_users();

    let result = db.query("users").unwrap().create(&json!([])).unwrap();

    assert_eq!(result, ReturnData::Empty);
    assert!(db.state().has_partition("users"));
    assert_eq!(db.state().len("users"), 0);
}

#[test]
fn test_insert_merges_and_overwrites_wholesale() {
    let db = two_users();
    db.query("users")
        .unwrap()
        .update(json!({"age": 40}), 1)
        .unwrap();

    db.query("users")
        .unwrap()
        .insert(&json!([{"id": 1}, {"id": 3, "name": "C"}]))
        .unwrap();

    assert_eq!(db.state().len("users"), 3);
    let user = db.state().get("users", &Identity::from(1)).cloned().unwrap();
    assert_eq!(user["name"], json!(""));
    assert_eq!(user["age"], json!(0));
    assert_eq!(user["$id"], json!("1"));
}

#[test]
fn test_insert_assigns_increments_after_stored_max() {
    let db = two_users();

    let result = db
        .query("users")
        .unwrap()
        .insert(&json!([{"name": "C"}, {"name": "D"}]))
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(3), Identity::from(4)]);
}

#[test]
fn test_side_entities_are_merged_by_default() {
    let db = seeded_blog_db();

    db.query("users")
        .unwrap()
        .create(&json!({"id": 4, "name": "Di", "posts": [{"id": 10, "title": "New"}]}))
        .unwrap();

    assert_eq!(db.state().len("users"), 1);
    assert_eq!(db.state().len("posts"), 4);
    let post = db.state().get("posts", &Identity::from(10)).cloned().unwrap();
    assert_eq!(post["user_id"], json!(4));
}

#[test]
fn test_persist_options_override_side_entities() {
    let db = seeded_blog_db();

    db.query("users")
        .unwrap()
        .insert_with(
            &json!({"id": 4, "name": "Di", "posts": [{"id": 10, "title": "New"}]}),
            &PersistOptions::create_for(["posts"]),
        )
        .unwrap();

    assert_eq!(db.state().len("users"), 4);
    assert_eq!(db.state().len("posts"), 1);
}

#[test]
fn test_scalar_payload_is_rejected() {
    let db = blog_db();

    let err = db.query("users").unwrap().insert(&json!("nope")).unwrap_err();

    assert!(matches!(err, StoreError::InvalidInput { .. }));
    assert_eq!(db.state().len("users"), 0);
}

#[test]
fn test_write_returns_model_instances_by_default() {
    let db = blog_db();

    let result = db
        .query("users")
        .unwrap()
        .insert(&json!({"id": 1, "name": "A"}))
        .unwrap();

    let ReturnData::One(item) = result else {
        panic!("expected a single item");
    };
    assert!(item.is_model());
    assert_eq!(item.get("posts"), Some(&json!([])));
    assert_eq!(item.get("profile"), Some(&Value::Null));
}

#[test]
fn test_write_returns_plain_records_when_unwrapped() {
    let db = plain_blog_db();

    let result = db
        .query("users")
        .unwrap()
        .insert(&json!([{"id": 1}, {"id": 2}]))
        .unwrap();

    let ReturnData::Many(items) = result else {
        panic!("expected many items");
    };
    assert!(items.iter().all(|item| !item.is_model()));
    assert!(items[0].get("posts").is_none());
}

#[test]
fn test_write_result_carries_requested_relations() {
    let db = blog_db();

    let result = db
        .query("users")
        .unwrap()
        .with("posts")
        .insert(&json!({"id": 1, "posts": [{"id": 1}, {"id": 2}]}))
        .unwrap();

    let ReturnData::One(item) = result else {
        panic!("expected a single item");
    };
    assert_eq!(item.get("posts").and_then(Value::as_array).map(Vec::len), Some(2));
}

// ========== insert_or_update ==========

#[test]
fn test_insert_or_update_merges_and_inserts() {
    let db = two_users();

    let result = db
        .query("users")
        .unwrap()
        .insert_or_update(&json!([{"id": 1, "name": "A2"}, {"id": 3, "name": "C"}]))
        .unwrap();

    let ReturnData::Many(items) = result else {
        panic!("expected many items");
    };
    assert_eq!(ids_of(&items), vec!["1", "3"]);
    assert_eq!(stored_name(&db, 1), Some(json!("A2")));
    assert_eq!(stored_name(&db, 2), Some(json!("B")));
    assert_eq!(stored_name(&db, 3), Some(json!("C")));
}

#[test]
fn test_insert_or_update_keeps_absent_attributes() {
    let db = seeded_blog_db();

    let result = db
        .query("users")
        .unwrap()
        .insert_or_update(&json!({"id": 1, "name": "Ada L."}))
        .unwrap();

    let ReturnData::One(item) = result else {
        panic!("expected a single item");
    };
    assert_eq!(item.get("name"), Some(&json!("Ada L.")));
    assert_eq!(item.get("age"), Some(&json!(36)));
}

#[test]
fn test_merge_never_stores_relation_fields() {
    let db = seeded_blog_db();

    db.query("users")
        .unwrap()
        .insert_or_update(&json!({"id": 1, "posts": [{"id": 9, "title": "Later"}]}))
        .unwrap();

    let user = db.state().get("users", &Identity::from(1)).cloned().unwrap();
    assert!(user.get("posts").is_none());
    assert_eq!(user["name"], json!("Ada"));

    let post = db.state().get("posts", &Identity::from(9)).cloned().unwrap();
    assert_eq!(post["user_id"], json!(1));
}

proptest! {
    #[test]
    fn prop_insert_or_update_is_idempotent(
        rows in prop::collection::vec((1u64..20, "[a-z]{0,8}", 0u64..100), 1..12)
    ) {
        let db = blog_db();
        let payload = Value::Array(
            rows.iter()
                .map(|(id, name, age)| json!({"id": id, "name": name, "age": age}))
                .collect(),
        );

        let first = db.query("users").unwrap().insert_or_update(&payload).unwrap();
        let after_first = db.snapshot();
        let second = db.query("users").unwrap().insert_or_update(&payload).unwrap();

        prop_assert_eq!(db.snapshot(), after_first);
        prop_assert_eq!(first.ids(), second.ids());
    }
}

// ========== update ==========

#[test]
fn test_update_by_identity() {
    let db = two_users();

    let result = db
        .query("users")
        .unwrap()
        .update(json!({"name": "Z"}), 1)
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(1)]);
    assert_eq!(stored_name(&db, 1), Some(json!("Z")));
    assert_eq!(stored_name(&db, 2), Some(json!("B")));
}

#[test]
fn test_update_derives_identity_from_payload() {
    let db = two_users();

    db.query("users")
        .unwrap()
        .update(json!({"id": 2, "name": "Q"}), Condition::None)
        .unwrap();

    assert_eq!(stored_name(&db, 2), Some(json!("Q")));
}

#[test]
fn test_update_of_missing_identity_is_a_noop() {
    let db = two_users();
    let before = db.snapshot();

    let result = db
        .query("users")
        .unwrap()
        .update(json!({"name": "Z"}), 42)
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(db.snapshot(), before);
}

#[test]
fn test_update_by_predicate() {
    let db = seeded_blog_db();

    let result = db
        .query("users")
        .unwrap()
        .update(
            json!({"name": "senior"}),
            Condition::when(|record| record.get("age").and_then(Value::as_i64) > Some(20)),
        )
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(1), Identity::from(2)]);
    assert_eq!(stored_name(&db, 1), Some(json!("senior")));
    assert_eq!(stored_name(&db, 3), Some(json!("Cy")));
}

#[test]
fn test_update_with_callback() {
    let db = two_users();

    db.query("users")
        .unwrap()
        .update(
            Update::with(|record| {
                record.insert("age".to_string(), json!(77));
            }),
            2,
        )
        .unwrap();

    let user = db.state().get("users", &Identity::from(2)).cloned().unwrap();
    assert_eq!(user["age"], json!(77));
}

#[test]
fn test_update_predicate_can_read_the_database() {
    let db = Rc::new(seeded_blog_db());
    let inner = Rc::clone(&db);

    let result = db
        .query("users")
        .unwrap()
        .update(
            json!({"name": "author"}),
            Condition::when(move |record| {
                let author = inner
                    .find("posts", 1)
                    .unwrap()
                    .and_then(|post| post.get("user_id").cloned());
                record.get("id") == author.as_ref()
            }),
        )
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(1)]);
    assert_eq!(stored_name(&db, 1), Some(json!("author")));
    assert_eq!(stored_name(&db, 2), Some(json!("Bob")));
}

#[test]
fn test_update_callback_can_read_the_database() {
    let db = Rc::new(seeded_blog_db());
    let inner = Rc::clone(&db);

    db.query("users")
        .unwrap()
        .update(
            Update::with(move |record| {
                let posts = inner.count("posts").unwrap();
                record.insert("age".to_string(), json!(posts));
            }),
            3,
        )
        .unwrap();

    let user = db.state().get("users", &Identity::from(3)).cloned().unwrap();
    assert_eq!(user["age"], json!(3));
    assert_eq!(user["name"], json!("Cy"));
}

#[test]
fn test_update_rejects_non_object_payload() {
    let db = two_users();

    let err = db.query("users").unwrap().update(json!([1, 2]), 1).unwrap_err();

    assert!(matches!(err, StoreError::InvalidInput { .. }));
}

// ========== delete ==========

#[test]
fn test_delete_by_identity_returns_removed_record() {
    let db = two_users();

    let result = db.query("users").unwrap().delete(1).unwrap();

    let ReturnData::One(item) = result else {
        panic!("expected a single item");
    };
    assert_eq!(item.get("name"), Some(&json!("A")));
    assert_eq!(db.state().len("users"), 1);
}

#[test]
fn test_delete_missing_identity_is_a_noop() {
    let db = two_users();

    let result = db.query("users").unwrap().delete(9).unwrap();

    assert_eq!(result, ReturnData::Empty);
    assert_eq!(db.state().len("users"), 2);
}

#[test]
fn test_delete_by_predicate() {
    let db = seeded_blog_db();

    let result = db
        .query("posts")
        .unwrap()
        .delete(Condition::when(|record| record.get("user_id") == Some(&json!(1))))
        .unwrap();

    assert_eq!(result.len(), 2);
    assert_eq!(db.state().len("posts"), 1);
}

#[test]
fn test_delete_predicate_can_read_the_database() {
    let db = Rc::new(seeded_blog_db());
    let inner = Rc::clone(&db);

    let result = db
        .query("users")
        .unwrap()
        .delete(Condition::when(move |record| {
            let posts = inner.all("posts").unwrap();
            !posts
                .iter()
                .any(|post| post.get("user_id") == record.get("id"))
        }))
        .unwrap();

    assert_eq!(result.ids(), vec![Identity::from(3)]);
    assert_eq!(db.state().len("users"), 2);
}

#[test]
fn test_delete_all_clears_every_known_partition() {
    let db = seeded_blog_db();

    db.delete_all(None).unwrap();

    for entity in ["users", "posts", "comments", "profiles", "roles", "role_user", "images"] {
        assert_eq!(db.state().len(entity), 0, "{entity} should be empty");
    }
}

#[test]
fn test_repo_delete_all_clears_only_its_entity() {
    let db = seeded_blog_db();

    db.query("posts").unwrap().delete_all();

    assert_eq!(db.state().len("posts"), 0);
    assert_eq!(db.state().len("users"), 3);
}

//! Mutation boundary
//!
//! `apply()` is the single entry point that runs a [`Mutation`] and emits
//! the operation lifecycle logs (`start`, `end`, `end_error`). The layers
//! below only log at debug level.
//!
//! ## Example
//!
//! ```
//! use normstore_core::{apply, Database, ModelSchema, Mutation, PersistOptions};
//! use serde_json::json;
//!
//! let mut db = Database::new();
//! db.register(ModelSchema::new("users").attr("id", json!(null)).attr("name", "")).unwrap();
//!
//! let result = apply(
//!     &db,
//!     Mutation::Insert {
//!         entity: "users".to_string(),
//!         data: json!({"id": 1, "name": "A"}),
//!         options: PersistOptions::default(),
//!     },
//! )
//! .unwrap();
//! assert_eq!(result.len(), 1);
//! ```

use std::time::Instant;

use crate::commands::Mutation;
use crate::database::Database;
use crate::errors::Result;
use crate::query::ReturnData;
use crate::{log_op_end, log_op_error, log_op_start};

/// Apply a mutation to the database
///
/// # Errors
///
/// Returns the underlying write's error: `UnknownEntity` for unregistered
/// entities, `InvalidInput` for payloads that cannot be normalized, and
/// `MissingPivot` for many-to-many writes without a pivot model.
pub fn apply(db: &Database, mutation: Mutation) -> Result<ReturnData> {
    let op = mutation.op();
    let entity = mutation.entity().unwrap_or("*").to_string();

    log_op_start!(op, entity = entity.as_str());
    let start = Instant::now();

    let result = apply_impl(db, mutation).map_err(|e| {
        log_op_error!(
            op,
            e.clone(),
            duration_ms = start.elapsed().as_millis() as u64,
            entity = entity.as_str()
        );
        e
    })?;

    log_op_end!(
        op,
        duration_ms = start.elapsed().as_millis() as u64,
        entity = entity.as_str(),
        affected = result.len() as u64
    );

    Ok(result)
}

fn apply_impl(db: &Database, mutation: Mutation) -> Result<ReturnData> {
    match mutation {
        Mutation::Create {
            entity,
            data,
            options,
        } => db.query(&entity)?.create_with(&data, &options),

        Mutation::Insert {
            entity,
            data,
            options,
        } => db.query(&entity)?.insert_with(&data, &options),

        Mutation::InsertOrUpdate {
            entity,
            data,
            options,
        } => db.query(&entity)?.insert_or_update_with(&data, &options),

        Mutation::Update {
            entity,
            update,
            condition,
        } => db.query(&entity)?.update(update, condition),

        Mutation::Delete { entity, condition } => db.query(&entity)?.delete(condition),

        Mutation::DeleteAll { entity } => {
            db.delete_all(entity.as_deref())?;
            Ok(ReturnData::Empty)
        }
    }
}

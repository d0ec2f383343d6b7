//! Mutation inventory applied through `apply()`

use serde_json::Value;

use crate::query::{Condition, PersistOptions, Update};

/// Every write the engine supports, as a value
///
/// Mutations are processed by [`crate::apply::apply`], which runs the write
/// against a `Database` and returns the shaped result.
#[derive(Debug, Clone)]
pub enum Mutation {
    /// Replace the entity's records with the normalized payload
    Create {
        entity: String,
        data: Value,
        options: PersistOptions,
    },

    /// Merge the normalized payload into the entity's records
    Insert {
        entity: String,
        data: Value,
        options: PersistOptions,
    },

    /// Insert new records and recursively merge existing ones
    InsertOrUpdate {
        entity: String,
        data: Value,
        options: PersistOptions,
    },

    Update {
        entity: String,
        update: Update,
        condition: Condition,
    },

    Delete {
        entity: String,
        condition: Condition,
    },

    /// Empty one partition, or every partition when `entity` is `None`
    DeleteAll { entity: Option<String> },
}

impl Mutation {
    /// Stable operation name used in logs
    pub fn op(&self) -> &'static str {
        match self {
            Mutation::Create { .. } => "create",
            Mutation::Insert { .. } => "insert",
            Mutation::InsertOrUpdate { .. } => "insert_or_update",
            Mutation::Update { .. } => "update",
            Mutation::Delete { .. } => "delete",
            Mutation::DeleteAll { .. } => "delete_all",
        }
    }

    /// Target entity, if the mutation has one
    pub fn entity(&self) -> Option<&str> {
        match self {
            Mutation::Create { entity, .. }
            | Mutation::Insert { entity, .. }
            | Mutation::InsertOrUpdate { entity, .. }
            | Mutation::Update { entity, .. }
            | Mutation::Delete { entity, .. } => Some(entity),
            Mutation::DeleteAll { entity } => entity.as_deref(),
        }
    }
}

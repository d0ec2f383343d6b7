//! Writes: create, insert, insert-or-update, update and delete

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::plan::WhereValue;
use super::shape::{Item, ReturnData};
use super::Repo;
use crate::errors::{Result, StoreError};
use crate::model::{Identity, ModelInstance, NormalizedData, Record, Records, ID_FIELD};
use crate::ops::merge_recursive;

/// Per-entity overrides of how normalized side records are persisted
///
/// Entities listed under `create` replace their partition; entities under
/// `insert` merge into it. `create` wins when an entity is in both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistOptions {
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub insert: Vec<String>,
}

impl PersistOptions {
    pub fn create_for<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            create: entities.into_iter().map(Into::into).collect(),
            insert: Vec::new(),
        }
    }

    pub fn insert_for<I, S>(entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            create: Vec::new(),
            insert: entities.into_iter().map(Into::into).collect(),
        }
    }

    fn method_for(&self, entity: &str, fallback: PersistMethod) -> PersistMethod {
        if self.create.iter().any(|e| e == entity) {
            PersistMethod::Create
        } else if self.insert.iter().any(|e| e == entity) {
            PersistMethod::Insert
        } else {
            fallback
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PersistMethod {
    Create,
    Insert,
}

/// Payload of an update
#[derive(Clone)]
pub enum Update {
    /// Partial record merged along the schema tree
    Partial(Value),
    /// Callback given a copy of the stored record; the result is written back
    With(Rc<dyn Fn(&mut Record)>),
}

impl Update {
    pub fn with<F>(f: F) -> Self
    where
        F: Fn(&mut Record) + 'static,
    {
        Update::With(Rc::new(f))
    }
}

impl From<Value> for Update {
    fn from(value: Value) -> Self {
        Update::Partial(value)
    }
}

impl fmt::Debug for Update {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Partial(value) => f.debug_tuple("Partial").field(value).finish(),
            Update::With(_) => f.write_str("With(..)"),
        }
    }
}

/// Which stored records an update or delete targets
#[derive(Clone, Default)]
pub enum Condition {
    /// Derive the identity from the update payload itself
    #[default]
    None,
    Id(Identity),
    /// Every record for which the predicate holds at call time
    When(Rc<dyn Fn(&Record) -> bool>),
}

impl Condition {
    pub fn when<F>(f: F) -> Self
    where
        F: Fn(&Record) -> bool + 'static,
    {
        Condition::When(Rc::new(f))
    }
}

impl From<Identity> for Condition {
    fn from(id: Identity) -> Self {
        Condition::Id(id)
    }
}

impl From<Option<Identity>> for Condition {
    fn from(id: Option<Identity>) -> Self {
        id.map_or(Condition::None, Condition::Id)
    }
}

macro_rules! condition_from_id {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Condition {
                fn from(id: $ty) -> Self {
                    Condition::Id(Identity::from(id))
                }
            }
        )*
    };
}

condition_from_id!(&str, String, i32, i64, u32, u64, usize);

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::None => f.write_str("None"),
            Condition::Id(id) => f.debug_tuple("Id").field(id).finish(),
            Condition::When(_) => f.write_str("When(..)"),
        }
    }
}

fn dedup(ids: Vec<Identity>) -> Vec<Identity> {
    let mut seen = std::collections::BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

impl<'db> Repo<'db> {
    // ========== Persist ==========

    /// Replace the entity's records with `data`
    ///
    /// `data` is an object, an array of objects, or `null`. Related records
    /// found while normalizing are merged into their own partitions. An empty
    /// payload empties the partition and returns [`ReturnData::Empty`].
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for payloads that are not objects, and
    /// `UnknownEntity` or `MissingPivot` for relations to unregistered models.
    pub fn create(&self, data: &Value) -> Result<ReturnData> {
        self.create_with(data, &PersistOptions::default())
    }

    /// # Errors
    ///
    /// See [`Repo::create`].
    pub fn create_with(&self, data: &Value, options: &PersistOptions) -> Result<ReturnData> {
        self.persist(PersistMethod::Create, data, options)
    }

    /// Merge `data` into the entity's records, overwriting equal identities
    ///
    /// # Errors
    ///
    /// See [`Repo::create`].
    pub fn insert(&self, data: &Value) -> Result<ReturnData> {
        self.insert_with(data, &PersistOptions::default())
    }

    /// # Errors
    ///
    /// See [`Repo::create`].
    pub fn insert_with(&self, data: &Value, options: &PersistOptions) -> Result<ReturnData> {
        self.persist(PersistMethod::Insert, data, options)
    }

    /// Insert new records and recursively merge the ones already stored
    ///
    /// Returns the target entity's affected records only, updated first
    /// then inserted.
    ///
    /// # Errors
    ///
    /// See [`Repo::create`].
    pub fn insert_or_update(&self, data: &Value) -> Result<ReturnData> {
        self.insert_or_update_with(data, &PersistOptions::default())
    }

    /// # Errors
    ///
    /// See [`Repo::create`].
    pub fn insert_or_update_with(
        &self,
        data: &Value,
        options: &PersistOptions,
    ) -> Result<ReturnData> {
        let normalized = self.db.normalize(self.entity(), data)?;
        let mut to_persist = NormalizedData::new();
        let mut updated = Vec::new();

        for (entity, records) in normalized {
            let schema = self.db.model(&entity)?;
            for (id, raw) in records {
                let mut state = self.db.state_mut();
                match state.get_mut(&entity, &id) {
                    Some(stored) => {
                        merge_recursive(stored, &raw, schema.fields());
                        if entity == self.entity() {
                            updated.push(id);
                        }
                    }
                    None => {
                        to_persist.entry(entity.clone()).or_default().insert(id, raw);
                    }
                }
            }
        }

        tracing::debug!(
            entity = self.entity(),
            updated = updated.len(),
            queued = to_persist.values().map(Records::len).sum::<usize>(),
            "insert_or_update partitioned records"
        );

        let mut ids = updated;
        if !to_persist.is_empty() {
            ids.extend(self.process_persist(PersistMethod::Insert, to_persist, options)?);
        }

        self.return_data(dedup(ids))
    }

    fn persist(
        &self,
        method: PersistMethod,
        data: &Value,
        options: &PersistOptions,
    ) -> Result<ReturnData> {
        let normalized = self.db.normalize(self.entity(), data)?;

        if normalized.is_empty() {
            if method == PersistMethod::Create {
                self.db.state_mut().replace(self.entity(), Records::new());
            }
            return Ok(ReturnData::Empty);
        }

        let ids = self.process_persist(method, normalized, options)?;
        self.return_data(ids)
    }

    /// Fill and write normalized records; returns the target entity's ids
    fn process_persist(
        &self,
        method: PersistMethod,
        data: NormalizedData,
        options: &PersistOptions,
    ) -> Result<Vec<Identity>> {
        let filled = self.db.fill_all(data)?;
        let mut ids = Vec::new();
        let mut state = self.db.state_mut();

        for (entity, records) in filled {
            let is_target = entity == self.entity();
            let fallback = if is_target {
                method
            } else {
                PersistMethod::Insert
            };

            if is_target {
                ids.extend(records.keys().cloned());
            }

            tracing::debug!(
                entity = entity.as_str(),
                count = records.len(),
                replace = options.method_for(&entity, fallback) == PersistMethod::Create,
                "persisting records"
            );

            match options.method_for(&entity, fallback) {
                PersistMethod::Create => state.replace(&entity, records),
                PersistMethod::Insert => state.merge(&entity, records),
            }
        }

        Ok(ids)
    }

    // ========== Update ==========

    /// Update stored records
    ///
    /// With [`Condition::None`] the identity comes from the payload's own
    /// primary key. Updates of absent identities are silent no-ops.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` when a partial payload is not an object.
    pub fn update(
        &self,
        data: impl Into<Update>,
        condition: impl Into<Condition>,
    ) -> Result<ReturnData> {
        let update = data.into();
        if let Update::Partial(value) = &update {
            if !value.is_object() {
                return Err(StoreError::InvalidInput {
                    entity: self.entity().to_string(),
                    reason: "update payload must be an object".to_string(),
                });
            }
        }

        match condition.into() {
            Condition::None => {
                let id = match &update {
                    Update::Partial(Value::Object(record)) => self.schema.identity(record),
                    _ => None,
                };
                self.update_by_id(&update, id)
            }
            Condition::Id(id) => self.update_by_id(&update, Some(id)),
            Condition::When(test) => self.update_where(&update, test.as_ref()),
        }
    }

    /// Apply an update to one stored record
    ///
    /// User callbacks run on a copy with no borrow of the store held.
    fn update_stored(&self, id: &Identity, update: &Update) {
        match update {
            Update::With(callback) => {
                let current = self.db.state().get(self.entity(), id).cloned();
                let Some(mut record) = current else {
                    return;
                };
                callback(&mut record);
                if let Some(stored) = self.db.state_mut().get_mut(self.entity(), id) {
                    *stored = record;
                }
            }
            Update::Partial(Value::Object(partial)) => {
                if let Some(stored) = self.db.state_mut().get_mut(self.entity(), id) {
                    merge_recursive(stored, partial, self.schema.fields());
                }
            }
            Update::Partial(_) => {}
        }
    }

    /// Identities of the stored records matching `test`, in identity order
    fn matching_ids(&self, test: &dyn Fn(&Record) -> bool) -> Vec<Identity> {
        let records = self.db.state().records(self.entity());
        records
            .iter()
            .filter(|record| test(record))
            .filter_map(Identity::of)
            .collect()
    }

    fn update_by_id(&self, update: &Update, id: Option<Identity>) -> Result<ReturnData> {
        let Some(id) = id else {
            return Ok(ReturnData::Empty);
        };

        self.update_stored(&id, update);
        self.return_data(vec![id])
    }

    fn update_where(&self, update: &Update, test: &dyn Fn(&Record) -> bool) -> Result<ReturnData> {
        let ids = self.matching_ids(test);
        for id in &ids {
            self.update_stored(id, update);
        }

        tracing::debug!(entity = self.entity(), count = ids.len(), "updated by predicate");
        self.return_many(ids)
    }

    // ========== Delete ==========

    /// Remove records by identity or predicate
    ///
    /// Returns the removed records, shaped by the wrap policy.
    ///
    /// # Errors
    ///
    /// Never fails today; kept fallible like every other write.
    pub fn delete(&self, condition: impl Into<Condition>) -> Result<ReturnData> {
        let ids = match condition.into() {
            Condition::None => Vec::new(),
            Condition::Id(id) => vec![id],
            Condition::When(test) => self.matching_ids(test.as_ref()),
        };

        let removed: Vec<Record> = {
            let mut state = self.db.state_mut();
            ids.iter()
                .filter_map(|id| state.remove(self.entity(), id))
                .collect()
        };

        tracing::debug!(entity = self.entity(), count = removed.len(), "deleted records");

        let mut items: Vec<Item> = removed
            .into_iter()
            .map(|record| {
                if self.wrap {
                    Item::Model(ModelInstance::new(self.schema, record))
                } else {
                    Item::Plain(record)
                }
            })
            .collect();

        Ok(match items.len() {
            0 => ReturnData::Empty,
            1 => items.pop().map_or(ReturnData::Empty, ReturnData::One),
            _ => ReturnData::Many(items),
        })
    }

    /// Empty the entity's partition
    pub fn delete_all(&self) {
        self.db.state_mut().clear(self.entity());
    }

    // ========== Return shaping ==========

    /// Re-read the given identities with this query's loads and wrap policy
    fn shaping_query(&self, ids: &[Identity]) -> Repo<'db> {
        let mut query = self.fresh();
        query.plan.loads = self.plan.loads.clone();
        let ids: Vec<Value> = ids.iter().map(Identity::to_value).collect();
        query.where_(ID_FIELD, WhereValue::OneOf(ids));
        query
    }

    pub(crate) fn return_data(&self, ids: Vec<Identity>) -> Result<ReturnData> {
        match ids.len() {
            0 => Ok(ReturnData::Empty),
            1 => Ok(self
                .shaping_query(&ids)
                .first()?
                .map_or(ReturnData::Empty, ReturnData::One)),
            _ => Ok(ReturnData::Many(self.shaping_query(&ids).get()?)),
        }
    }

    fn return_many(&self, ids: Vec<Identity>) -> Result<ReturnData> {
        if ids.is_empty() {
            return Ok(ReturnData::Many(Vec::new()));
        }
        Ok(ReturnData::Many(self.shaping_query(&ids).get()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_options_method_resolution() {
        let options = PersistOptions {
            create: vec!["posts".to_string()],
            insert: vec!["posts".to_string(), "comments".to_string()],
        };
        assert_eq!(
            options.method_for("posts", PersistMethod::Insert),
            PersistMethod::Create
        );
        assert_eq!(
            options.method_for("comments", PersistMethod::Create),
            PersistMethod::Insert
        );
        assert_eq!(
            options.method_for("users", PersistMethod::Create),
            PersistMethod::Create
        );
    }

    #[test]
    fn test_condition_conversions() {
        assert!(matches!(Condition::from(3), Condition::Id(id) if id.as_str() == "3"));
        assert!(matches!(Condition::from(None::<Identity>), Condition::None));
        assert!(matches!(Condition::when(|_| true), Condition::When(_)));
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let ids = dedup(vec![
            Identity::from(3),
            Identity::from(1),
            Identity::from(3),
        ]);
        assert_eq!(ids, vec![Identity::from(3), Identity::from(1)]);
    }

    #[test]
    fn test_update_payload_from_value() {
        assert!(matches!(Update::from(json!({"a": 1})), Update::Partial(_)));
    }
}

use std::collections::BTreeMap;

use serde_json::Value;

use super::{NormalizeContext, Normalizer};
use crate::database::Database;
use crate::errors::{Result, StoreError};
use crate::model::{Attribute, Field, Identity, ModelSchema, NormalizedData, Record};
use crate::relations::Relation;

/// Default normalizer driven by the registered model schemas
///
/// Walks nested relation fields, writes related records under their own
/// entity and links them by key:
/// - owner-side relations (`BelongsTo`, `HasManyBy`, `MorphTo`) are walked
///   first and set the foreign key on the record itself
/// - auto-increment attributes that are missing get the next free integer
/// - child-side relations set the foreign key (and morph type) on children
/// - `BelongsToMany` writes one pivot record per related record
///
/// Records without a primary key get a generated `_no_key_<n>` identity.
/// Records repeated within one payload are merged key by key.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaNormalizer;

impl Normalizer for SchemaNormalizer {
    fn normalize(&self, data: &Value, ctx: &NormalizeContext<'_>) -> Result<NormalizedData> {
        let mut walker = Walker {
            db: ctx.db,
            out: NormalizedData::new(),
            counters: BTreeMap::new(),
        };
        walker.walk_value(ctx.entity, data)?;

        tracing::debug!(
            entity = ctx.entity,
            entities = walker.out.len(),
            "normalized payload"
        );

        Ok(walker.out)
    }
}

struct Walker<'a> {
    db: &'a Database,
    out: NormalizedData,
    /// Last assigned value per (entity, increment field)
    counters: BTreeMap<(String, String), i64>,
}

fn invalid(entity: &str, reason: &str) -> StoreError {
    StoreError::InvalidInput {
        entity: entity.to_string(),
        reason: reason.to_string(),
    }
}

/// Objects carried by a relation value: null, one object, or an array of them
fn objects<'v>(entity: &str, value: &'v Value) -> Result<Vec<&'v Record>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(record) => Ok(vec![record]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_object()
                    .ok_or_else(|| invalid(entity, "expected an array of objects"))
            })
            .collect(),
        _ => Err(invalid(entity, "expected an object, an array of objects or null")),
    }
}

fn non_null<'v>(record: &'v Record, key: &str) -> Option<&'v Value> {
    record.get(key).filter(|value| !value.is_null())
}

impl<'a> Walker<'a> {
    fn walk_value(&mut self, entity: &str, value: &Value) -> Result<Vec<Record>> {
        objects(entity, value)?
            .into_iter()
            .map(|raw| self.walk_record(entity, raw))
            .collect()
    }

    fn walk_record(&mut self, entity: &str, raw: &Record) -> Result<Record> {
        let db = self.db;
        let schema = db.model(entity)?;
        let mut record = raw.clone();

        let nested: Vec<(&str, &Relation, Value)> = schema
            .fields()
            .relations()
            .filter_map(|(name, relation)| record.remove(name).map(|v| (name, relation, v)))
            .collect();

        for (_, relation, value) in nested.iter().filter(|(_, r, _)| r.is_owner_side()) {
            self.link_owner(&mut record, relation, value)?;
        }

        self.assign_increments(entity, schema, &mut record);

        let identity = schema
            .identity(&record)
            .unwrap_or_else(|| Identity::new(format!("_no_key_{}", db.next_key_seq())));

        for (name, relation, value) in nested.iter().filter(|(_, r, _)| !r.is_owner_side()) {
            self.link_children(entity, name, &record, relation, value)?;
        }

        let partition = self.out.entry(entity.to_string()).or_default();
        match partition.get_mut(&identity) {
            Some(existing) => existing.extend(record.clone()),
            None => {
                partition.insert(identity, record.clone());
            }
        }

        Ok(record)
    }

    /// Walk a parent given inline and copy its key onto `record`
    fn link_owner(&mut self, record: &mut Record, relation: &Relation, value: &Value) -> Result<()> {
        match relation {
            Relation::BelongsTo {
                parent,
                foreign_key,
                owner_key,
            } => {
                let parents = self.walk_value(parent, value)?;
                if let Some(key) = parents.first().and_then(|p| non_null(p, owner_key)) {
                    record.insert(foreign_key.clone(), key.clone());
                }
            }
            Relation::HasManyBy {
                parent,
                foreign_key,
                owner_key,
            } => {
                let parents = self.walk_value(parent, value)?;
                if value.is_array() {
                    let keys: Vec<Value> = parents
                        .iter()
                        .filter_map(|p| non_null(p, owner_key))
                        .cloned()
                        .collect();
                    record.insert(foreign_key.clone(), Value::Array(keys));
                }
            }
            Relation::MorphTo { id, kind } => {
                let Some(owner) = record.get(kind).and_then(Value::as_str).map(str::to_string)
                else {
                    return Ok(());
                };
                let owners = self.walk_value(&owner, value)?;
                let owner_schema = self.db.model(&owner)?;
                if let Some(key) = owners.first().and_then(|o| owner_schema.id(o)) {
                    record.insert(id.clone(), key);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Walk children given inline, pointing their keys back at `record`
    fn link_children(
        &mut self,
        entity: &str,
        name: &str,
        record: &Record,
        relation: &Relation,
        value: &Value,
    ) -> Result<()> {
        match relation {
            Relation::HasOne {
                related,
                foreign_key,
                local_key,
            }
            | Relation::HasMany {
                related,
                foreign_key,
                local_key,
            } => {
                let local = non_null(record, local_key).cloned();
                for child in objects(related, value)? {
                    let mut child = child.clone();
                    if let Some(local) = &local {
                        child.insert(foreign_key.clone(), local.clone());
                    }
                    self.walk_record(related, &child)?;
                }
            }
            Relation::MorphOne {
                related,
                id,
                kind,
                local_key,
            }
            | Relation::MorphMany {
                related,
                id,
                kind,
                local_key,
            } => {
                let local = non_null(record, local_key).cloned();
                for child in objects(related, value)? {
                    let mut child = child.clone();
                    if let Some(local) = &local {
                        child.insert(id.clone(), local.clone());
                    }
                    child.insert(kind.clone(), Value::from(entity));
                    self.walk_record(related, &child)?;
                }
            }
            Relation::BelongsToMany {
                related,
                pivot,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            } => {
                if !self.db.has_model(pivot) {
                    return Err(StoreError::MissingPivot {
                        entity: entity.to_string(),
                        relation: name.to_string(),
                    });
                }

                let local = non_null(record, parent_key).cloned();
                for target in self.walk_value(related, value)? {
                    let (Some(local), Some(key)) = (&local, non_null(&target, related_key)) else {
                        continue;
                    };
                    let mut link = Record::new();
                    link.insert(foreign_pivot_key.clone(), local.clone());
                    link.insert(related_pivot_key.clone(), key.clone());
                    self.walk_record(pivot, &link)?;
                }
            }
            Relation::BelongsTo { .. } | Relation::HasManyBy { .. } | Relation::MorphTo { .. } => {}
        }
        Ok(())
    }

    fn assign_increments(&mut self, entity: &str, schema: &ModelSchema, record: &mut Record) {
        for (key, field) in schema.fields().iter() {
            if field != &Field::Attr(Attribute::Increment) {
                continue;
            }

            let slot = (entity.to_string(), key.to_string());
            let current = match self.counters.get(&slot) {
                Some(current) => *current,
                None => self.stored_max(entity, key),
            };

            let next = match record.get(key) {
                None | Some(Value::Null) => {
                    let next = current + 1;
                    record.insert(key.to_string(), Value::from(next));
                    next
                }
                Some(value) => value.as_i64().map_or(current, |explicit| current.max(explicit)),
            };
            self.counters.insert(slot, next);
        }
    }

    fn stored_max(&self, entity: &str, key: &str) -> i64 {
        let stored = self
            .db
            .state()
            .partition(entity)
            .and_then(|p| p.data.values().filter_map(|r| r.get(key)?.as_i64()).max())
            .unwrap_or(0);
        let pending = self
            .out
            .get(entity)
            .and_then(|records| records.values().filter_map(|r| r.get(key)?.as_i64()).max())
            .unwrap_or(0);
        stored.max(pending)
    }
}

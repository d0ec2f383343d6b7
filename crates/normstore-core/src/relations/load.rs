use std::collections::BTreeMap;

use serde_json::Value;

use super::Relation;
use crate::errors::Result;
use crate::model::{Identity, Record, ID_FIELD};
use crate::query::{Load, Repo, WhereValue};

/// Materializes a relation onto a collection of records
pub trait RelationResolver {
    /// Attach the related value under the load's field on every record
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` when a related model is not registered.
    fn resolve(&self, repo: &Repo<'_>, collection: Vec<Record>, load: &Load) -> Result<Vec<Record>>;
}

/// Index key of a join value: strings as-is, integral numbers without a fraction
///
/// Related records are narrowed with strict field equality before they are
/// indexed, so `"1"` never joins `1`.
fn value_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => Some(i.to_string()),
            (_, Some(u), _) => Some(u.to_string()),
            (_, _, Some(f)) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Some((f as i64).to_string())
            }
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}

/// Non-null values of `field` across the collection
fn keys_of(collection: &[Record], field: &str) -> Vec<Value> {
    collection
        .iter()
        .filter_map(|record| record.get(field))
        .filter(|value| !value.is_null())
        .cloned()
        .collect()
}

/// Sub-query on `entity` with the load's nested path or constraint applied
///
/// A dotted path forwards its remainder as nested loads: `a.b.c` loads
/// `b.c`, `a.*` loads everything, and `a.b|c` loads `b` and `c`. Otherwise
/// the constraint runs against the sub-query; a boolean result keeps or
/// empties it.
fn constrained_query<'db>(repo: &Repo<'db>, entity: &str, load: &Load) -> Result<Repo<'db>> {
    let mut query = repo.new_plain_query(entity)?;
    let rest: Vec<&str> = load.name.split('.').skip(1).collect();

    if !rest.is_empty() {
        if rest.len() > 1 {
            query.with(rest.join("."));
        } else if rest[0] == "*" {
            query.with_all();
        } else {
            for name in rest[0].split('|') {
                query.with(name);
            }
        }
        return Ok(query);
    }

    if let Some(constraint) = &load.constraint {
        if let Some(result) = constraint.apply(&mut query) {
            query.where_query(move |_, _| Some(result));
        }
    }

    Ok(query)
}

fn index_one(records: Vec<Record>, field: &str) -> BTreeMap<String, Record> {
    records
        .into_iter()
        .filter_map(|record| {
            let key = record.get(field).and_then(value_key)?;
            Some((key, record))
        })
        .collect()
}

fn index_many(records: Vec<Record>, field: &str) -> BTreeMap<String, Vec<Value>> {
    let mut index: BTreeMap<String, Vec<Value>> = BTreeMap::new();
    for record in records {
        if let Some(key) = record.get(field).and_then(value_key) {
            index.entry(key).or_default().push(Value::Object(record));
        }
    }
    index
}

fn attach_one(
    mut collection: Vec<Record>,
    name: &str,
    local: &str,
    index: &BTreeMap<String, Record>,
) -> Vec<Record> {
    for record in &mut collection {
        let related = record
            .get(local)
            .and_then(value_key)
            .and_then(|key| index.get(&key))
            .map_or(Value::Null, |r| Value::Object(r.clone()));
        record.insert(name.to_string(), related);
    }
    collection
}

fn attach_many(
    mut collection: Vec<Record>,
    name: &str,
    local: &str,
    index: &BTreeMap<String, Vec<Value>>,
) -> Vec<Record> {
    for record in &mut collection {
        let related = record
            .get(local)
            .and_then(value_key)
            .and_then(|key| index.get(&key))
            .cloned()
            .unwrap_or_default();
        record.insert(name.to_string(), Value::Array(related));
    }
    collection
}

impl RelationResolver for Relation {
    fn resolve(&self, repo: &Repo<'_>, collection: Vec<Record>, load: &Load) -> Result<Vec<Record>> {
        let name = load.field();

        tracing::debug!(
            entity = repo.entity(),
            relation = name,
            kind = self.kind_name(),
            count = collection.len(),
            "loading relation"
        );

        match self {
            Relation::HasOne {
                related,
                foreign_key,
                local_key,
            } => {
                let mut query = constrained_query(repo, related, load)?;
                query.where_(foreign_key.as_str(), WhereValue::OneOf(keys_of(&collection, local_key)));
                let index = index_one(query.records()?, foreign_key);
                Ok(attach_one(collection, name, local_key, &index))
            }

            Relation::BelongsTo {
                parent,
                foreign_key,
                owner_key,
            } => {
                let mut query = constrained_query(repo, parent, load)?;
                query.where_(owner_key.as_str(), WhereValue::OneOf(keys_of(&collection, foreign_key)));
                let index = index_one(query.records()?, owner_key);
                Ok(attach_one(collection, name, foreign_key, &index))
            }

            Relation::HasMany {
                related,
                foreign_key,
                local_key,
            } => {
                let mut query = constrained_query(repo, related, load)?;
                query.where_(foreign_key.as_str(), WhereValue::OneOf(keys_of(&collection, local_key)));
                let index = index_many(query.records()?, foreign_key);
                Ok(attach_many(collection, name, local_key, &index))
            }

            Relation::HasManyBy {
                parent,
                foreign_key,
                owner_key,
            } => {
                let keys: Vec<Value> = collection
                    .iter()
                    .filter_map(|record| record.get(foreign_key).and_then(Value::as_array))
                    .flatten()
                    .filter(|value| !value.is_null())
                    .cloned()
                    .collect();

                let mut query = constrained_query(repo, parent, load)?;
                query.where_(owner_key.as_str(), WhereValue::OneOf(keys));
                let index = index_one(query.records()?, owner_key);

                let mut collection = collection;
                for record in &mut collection {
                    let related: Vec<Value> = record
                        .get(foreign_key)
                        .and_then(Value::as_array)
                        .map(|ids| {
                            ids.iter()
                                .filter_map(value_key)
                                .filter_map(|key| index.get(&key))
                                .map(|r| Value::Object(r.clone()))
                                .collect()
                        })
                        .unwrap_or_default();
                    record.insert(name.to_string(), Value::Array(related));
                }
                Ok(collection)
            }

            Relation::BelongsToMany {
                related,
                pivot,
                foreign_pivot_key,
                related_pivot_key,
                parent_key,
                related_key,
            } => {
                let mut pivots = repo.new_plain_query(pivot)?;
                pivots.where_(
                    foreign_pivot_key.as_str(),
                    WhereValue::OneOf(keys_of(&collection, parent_key)),
                );
                let pivots = pivots.process();

                let mut query = constrained_query(repo, related, load)?;
                query.where_(
                    related_key.as_str(),
                    WhereValue::OneOf(keys_of(&pivots, related_pivot_key)),
                );
                let index = index_one(query.records()?, related_key);

                let mut by_parent: BTreeMap<String, Vec<Value>> = BTreeMap::new();
                for entry in &pivots {
                    let parent = entry.get(foreign_pivot_key).and_then(value_key);
                    let target = entry
                        .get(related_pivot_key)
                        .and_then(value_key)
                        .and_then(|key| index.get(&key));
                    if let (Some(parent), Some(target)) = (parent, target) {
                        by_parent
                            .entry(parent)
                            .or_default()
                            .push(Value::Object(target.clone()));
                    }
                }

                Ok(attach_many(collection, name, parent_key, &by_parent))
            }

            Relation::MorphTo { id, kind } => {
                let mut wanted: BTreeMap<String, Vec<Value>> = BTreeMap::new();
                for record in &collection {
                    let owner = record.get(kind).and_then(Value::as_str);
                    let key = record.get(id).and_then(Identity::from_key);
                    if let (Some(owner), Some(key)) = (owner, key) {
                        wanted.entry(owner.to_string()).or_default().push(key.to_value());
                    }
                }

                let mut owners: BTreeMap<(String, String), Record> = BTreeMap::new();
                for (owner, ids) in wanted {
                    let mut query = constrained_query(repo, &owner, load)?;
                    query.where_(ID_FIELD, WhereValue::OneOf(ids));
                    for record in query.records()? {
                        if let Some(key) = Identity::of(&record) {
                            owners.insert((owner.clone(), key.as_str().to_string()), record);
                        }
                    }
                }

                let mut collection = collection;
                for record in &mut collection {
                    let owner = record.get(kind).and_then(Value::as_str).map(str::to_string);
                    let key = record.get(id).and_then(Identity::from_key);
                    let related = match (owner, key) {
                        (Some(owner), Some(key)) => owners
                            .get(&(owner, key.as_str().to_string()))
                            .map_or(Value::Null, |r| Value::Object(r.clone())),
                        _ => Value::Null,
                    };
                    record.insert(name.to_string(), related);
                }
                Ok(collection)
            }

            Relation::MorphOne {
                related,
                id,
                kind,
                local_key,
            } => {
                let mut query = constrained_query(repo, related, load)?;
                query
                    .where_(id.as_str(), WhereValue::OneOf(keys_of(&collection, local_key)))
                    .where_(kind.as_str(), repo.entity());
                let index = index_one(query.records()?, id);
                Ok(attach_one(collection, name, local_key, &index))
            }

            Relation::MorphMany {
                related,
                id,
                kind,
                local_key,
            } => {
                let mut query = constrained_query(repo, related, load)?;
                query
                    .where_(id.as_str(), WhereValue::OneOf(keys_of(&collection, local_key)))
                    .where_(kind.as_str(), repo.entity());
                let index = index_many(query.records()?, id);
                Ok(attach_many(collection, name, local_key, &index))
            }
        }
    }
}

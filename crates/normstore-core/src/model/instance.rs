use serde::Serialize;
use serde_json::Value;

use super::{Attribute, Field, Fields, Identity, ModelSchema, Record, ID_FIELD};

/// A record adapted to its entity's model shape
///
/// Every declared field is present: attributes fall back to their default,
/// to-one relations to `null` and to-many relations to an empty array when
/// not loaded. Undeclared keys other than `$id` are dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelInstance {
    #[serde(skip)]
    entity: String,
    #[serde(flatten)]
    record: Record,
}

impl ModelInstance {
    pub fn new(schema: &ModelSchema, record: Record) -> Self {
        let mut shaped = Record::new();
        if let Some(id) = record.get(ID_FIELD) {
            shaped.insert(ID_FIELD.to_string(), id.clone());
        }
        shaped.extend(shape_fields(schema.fields(), &record));

        Self {
            entity: schema.entity().to_string(),
            record: shaped,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn id(&self) -> Option<Identity> {
        Identity::of(&self.record)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record.get(field)
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn into_record(self) -> Record {
        self.record
    }

    /// Loaded to-one relation, if present
    pub fn related(&self, relation: &str) -> Option<&Record> {
        self.record.get(relation).and_then(Value::as_object)
    }

    /// Loaded to-many relation; empty when not loaded
    pub fn related_many(&self, relation: &str) -> Vec<&Record> {
        self.record
            .get(relation)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default()
    }
}

fn shape_fields(fields: &Fields, record: &Record) -> Record {
    let mut shaped = Record::new();

    for (key, field) in fields.iter() {
        let value = match field {
            Field::Attr(Attribute::Attr { default }) => {
                record.get(key).cloned().unwrap_or_else(|| default.clone())
            }
            Field::Attr(Attribute::Increment) => record.get(key).cloned().unwrap_or(Value::Null),
            Field::Relation(relation) => match record.get(key) {
                Some(value) => value.clone(),
                None if relation.is_many() => Value::Array(Vec::new()),
                None => Value::Null,
            },
            Field::Group(sub) => {
                let nested = record
                    .get(key)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Value::Object(shape_fields(sub, &nested))
            }
        };
        shaped.insert(key.to_string(), value);
    }

    shaped
}

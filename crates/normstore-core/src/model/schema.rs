use serde_json::Value;

use super::{Identity, Record, ID_FIELD};
use crate::errors::{Result, StoreError};
use crate::relations::Relation;

/// Leaf attribute of a schema tree
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    /// Plain value with a default used when the input omits the field
    Attr { default: Value },
    /// Auto-increment integer assigned during normalization when absent
    Increment,
}

/// Node of a schema tree
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Attr(Attribute),
    Relation(Relation),
    /// Embedded (non-relational) group of fields
    Group(Fields),
}

/// Ordered list of named schema nodes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    entries: Vec<(String, Field)>,
}

impl Fields {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Builder-style insert; a repeated name replaces the earlier node in place
    pub fn with(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    pub fn attr(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.with(
            name,
            Field::Attr(Attribute::Attr {
                default: default.into(),
            }),
        )
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = field,
            None => self.entries.push((name, field)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, field)| field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.entries.iter().map(|(key, field)| (key.as_str(), field))
    }

    /// Top-level relation fields, in declaration order
    pub fn relations(&self) -> impl Iterator<Item = (&str, &Relation)> {
        self.iter().filter_map(|(key, field)| match field {
            Field::Relation(relation) => Some((key, relation)),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Primary-key declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrimaryKey {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKey {
    pub fn fields(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(field) => vec![field.as_str()],
            PrimaryKey::Composite(fields) => fields.iter().map(String::as_str).collect(),
        }
    }
}

impl Default for PrimaryKey {
    fn default() -> Self {
        PrimaryKey::Single("id".to_string())
    }
}

/// Schema of one entity type
///
/// ```
/// use normstore_core::model::ModelSchema;
/// use normstore_core::relations::Relation;
///
/// let users = ModelSchema::new("users")
///     .increment("id")
///     .attr("name", "")
///     .relation("posts", Relation::has_many("posts", "user_id"));
/// assert_eq!(users.entity(), "users");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSchema {
    entity: String,
    primary_key: PrimaryKey,
    fields: Fields,
}

impl ModelSchema {
    /// New schema keyed by `id` with no fields
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            primary_key: PrimaryKey::default(),
            fields: Fields::new(),
        }
    }

    pub fn primary_key(mut self, field: impl Into<String>) -> Self {
        self.primary_key = PrimaryKey::Single(field.into());
        self
    }

    pub fn composite_key<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = PrimaryKey::Composite(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn attr(mut self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.fields.insert(
            name,
            Field::Attr(Attribute::Attr {
                default: default.into(),
            }),
        );
        self
    }

    pub fn increment(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name, Field::Attr(Attribute::Increment));
        self
    }

    pub fn relation(mut self, name: impl Into<String>, relation: Relation) -> Self {
        self.fields.insert(name, Field::Relation(relation));
        self
    }

    pub fn group(mut self, name: impl Into<String>, fields: Fields) -> Self {
        self.fields.insert(name, Field::Group(fields));
        self
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn key(&self) -> &PrimaryKey {
        &self.primary_key
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Primary-key value of a record: a scalar, or an ordered array for
    /// composite keys. `None` when any key field is missing or null.
    pub fn id(&self, record: &Record) -> Option<Value> {
        match &self.primary_key {
            PrimaryKey::Single(field) => record.get(field).filter(|v| !v.is_null()).cloned(),
            PrimaryKey::Composite(fields) => fields
                .iter()
                .map(|field| record.get(field).filter(|v| !v.is_null()).cloned())
                .collect::<Option<Vec<Value>>>()
                .map(Value::Array),
        }
    }

    pub fn identity(&self, record: &Record) -> Option<Identity> {
        self.id(record).as_ref().and_then(Identity::from_key)
    }

    /// Build the stored shape of a normalized record
    ///
    /// Declared attributes keep their supplied value or fall back to the
    /// default, groups are filled recursively, relation fields and undeclared
    /// keys are dropped, and `$id` is stamped first.
    pub fn fill(&self, raw: &Record, identity: &Identity) -> Record {
        let mut record = Record::new();
        record.insert(ID_FIELD.to_string(), identity.to_value());
        record.extend(fill_fields(&self.fields, raw));
        record
    }

    /// Check that every primary-key field is a declared top-level attribute
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` for an empty composite key or a key field that
    /// is missing, a relation, or a group.
    pub fn validate(&self) -> Result<()> {
        let key_fields = self.primary_key.fields();
        if key_fields.is_empty() {
            return Err(StoreError::InvalidSchema {
                entity: self.entity.clone(),
                reason: "primary key must name at least one field".to_string(),
            });
        }

        for key in key_fields {
            match self.fields.get(key) {
                Some(Field::Attr(_)) => {}
                Some(_) => {
                    return Err(StoreError::InvalidSchema {
                        entity: self.entity.clone(),
                        reason: format!("primary key field {} must be an attribute", key),
                    })
                }
                None => {
                    return Err(StoreError::InvalidSchema {
                        entity: self.entity.clone(),
                        reason: format!("primary key field {} is not declared", key),
                    })
                }
            }
        }

        Ok(())
    }
}

fn fill_fields(fields: &Fields, raw: &Record) -> Record {
    let mut record = Record::new();

    for (key, field) in fields.iter() {
        match field {
            Field::Attr(Attribute::Attr { default }) => {
                let value = raw.get(key).cloned().unwrap_or_else(|| default.clone());
                record.insert(key.to_string(), value);
            }
            Field::Attr(Attribute::Increment) => {
                let value = raw.get(key).cloned().unwrap_or(Value::Null);
                record.insert(key.to_string(), value);
            }
            Field::Relation(_) => {}
            Field::Group(sub) => {
                let nested = raw
                    .get(key)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                record.insert(key.to_string(), Value::Object(fill_fields(sub, &nested)));
            }
        }
    }

    record
}

//! Record, identity and schema types

pub mod identity;
pub mod instance;
pub mod schema;

use std::collections::BTreeMap;

pub use identity::Identity;
pub use instance::ModelInstance;
pub use schema::{Attribute, Field, Fields, ModelSchema, PrimaryKey};
pub use serde_json::Value;

/// Reserved field holding the string form of a record's primary key
pub const ID_FIELD: &str = "$id";

/// Ordered mapping of field name to value
pub type Record = serde_json::Map<String, Value>;

/// Records of one entity type keyed by identity
pub type Records = BTreeMap<Identity, Record>;

/// Output of normalization: entity name to identity to record
pub type NormalizedData = BTreeMap<String, Records>;

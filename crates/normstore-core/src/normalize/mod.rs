//! Normalization of nested input into flat per-entity record maps

mod schema_normalizer;

pub use schema_normalizer::SchemaNormalizer;

use crate::database::Database;
use crate::errors::Result;
use crate::model::{NormalizedData, Value};

/// What a normalizer can see while flattening a payload
pub struct NormalizeContext<'a> {
    pub db: &'a Database,
    /// Entity the payload is addressed to
    pub entity: &'a str,
}

/// Turns a raw payload into `entity -> identity -> record`
///
/// Output records are raw: defaults are not filled and `$id` is not yet
/// stamped. Nested related records appear under their own entity with join
/// keys set, and relation fields are removed from their parents.
pub trait Normalizer {
    /// # Errors
    ///
    /// Implementations return `InvalidInput` for payloads they cannot
    /// flatten and `UnknownEntity`/`MissingPivot` for unregistered models.
    fn normalize(&self, data: &Value, ctx: &NormalizeContext<'_>) -> Result<NormalizedData>;
}

//! Seed files: bulk fixtures in YAML or JSON
//!
//! ```yaml
//! schema_version: 0
//! entities:
//!   users:
//!     - { id: 1, name: Ada }
//!   posts:
//!     - { id: 1, user_id: 1, title: Hello }
//! ```
//!
//! Entities are imported in file order with insert-or-update, so importing
//! the same seed twice leaves the store unchanged.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::apply::apply;
use crate::commands::Mutation;
use crate::database::Database;
use crate::errors::{Result, StoreError};
use crate::query::PersistOptions;

/// Parsed seed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    /// Must be 0
    pub schema_version: u32,

    /// Entity name to payload (object or array of objects)
    #[serde(default)]
    pub entities: Map<String, Value>,
}

/// Records written per entity, in import order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub entities: Vec<(String, usize)>,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.entities.iter().map(|(_, n)| n).sum()
    }
}

/// Parse a seed from YAML text (JSON is accepted as a YAML subset)
///
/// # Errors
///
/// Returns `Serialization` for malformed text and `InvalidInput` for an
/// unsupported schema version.
pub fn parse_seed(content: &str) -> Result<Seed> {
    let seed: Seed = serde_yaml::from_str(content)?;

    if seed.schema_version != 0 {
        return Err(StoreError::InvalidInput {
            entity: "seed".to_string(),
            reason: format!(
                "Unsupported schema_version: {}. Expected 0",
                seed.schema_version
            ),
        });
    }

    Ok(seed)
}

/// # Errors
///
/// Returns `Io` if the file cannot be read, or see [`parse_seed`].
pub fn parse_seed_file(path: impl AsRef<Path>) -> Result<Seed> {
    let content = std::fs::read_to_string(path)?;
    parse_seed(&content)
}

/// Import every entity of the seed with insert-or-update
///
/// # Errors
///
/// Stops at the first entity whose write fails; earlier entities stay
/// imported.
pub fn import_seed(db: &Database, seed: &Seed) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for (entity, data) in &seed.entities {
        let result = apply(
            db,
            Mutation::InsertOrUpdate {
                entity: entity.clone(),
                data: data.clone(),
                options: PersistOptions::default(),
            },
        )?;
        report.entities.push((entity.clone(), result.len()));
    }

    tracing::debug!(
        entities = report.entities.len(),
        count = report.total() as u64,
        "seed imported"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_yaml_keeps_entity_order() {
        let seed = parse_seed(
            r#"
schema_version: 0
entities:
  users:
    - { id: 1, name: Ada }
  posts:
    - { id: 1, user_id: 1 }
"#,
        )
        .unwrap();

        let names: Vec<&str> = seed.entities.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["users", "posts"]);
        assert_eq!(seed.entities["users"], json!([{"id": 1, "name": "Ada"}]));
    }

    #[test]
    fn test_parse_json() {
        let seed = parse_seed(r#"{"schema_version": 0, "entities": {"users": {"id": 1}}}"#).unwrap();
        assert_eq!(seed.entities["users"], json!({"id": 1}));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let err = parse_seed("schema_version: 2").unwrap_err();
        assert!(matches!(err, StoreError::InvalidInput { .. }));
    }

    #[test]
    fn test_malformed_yaml_is_serialization_error() {
        let err = parse_seed("schema_version: [").unwrap_err();
        assert!(matches!(err, StoreError::Serialization { .. }));
    }
}

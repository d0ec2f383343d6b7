//! Model registry, state container and hook registry behind one handle

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::config::DatabaseConfig;
use crate::errors::{Result, StoreError};
use crate::model::{Field, Fields, Identity, ModelSchema, NormalizedData, Record, Records};
use crate::normalize::{NormalizeContext, Normalizer, SchemaNormalizer};
use crate::ops::EntityStore;
use crate::query::{HookId, HookRegistry, Item, Phase, Repo};
use crate::relations::Relation;

/// An in-memory normalized database
///
/// Owns the registered models, the per-entity record partitions and the
/// hook pipeline. State lives behind `RefCell`s, so a `Database` is meant
/// for single-threaded use and is not `Sync`. Reads and writes copy records
/// out and never hold a borrow across user callbacks.
pub struct Database {
    models: BTreeMap<String, ModelSchema>,
    state: RefCell<EntityStore>,
    hooks: RefCell<HookRegistry>,
    normalizer: Box<dyn Normalizer>,
    config: DatabaseConfig,
    key_seq: Cell<u64>,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .field("hooks", &self.hooks.borrow().len())
            .finish()
    }
}

impl Database {
    pub fn new() -> Self {
        Self::with_config(DatabaseConfig::default())
    }

    pub fn with_config(config: DatabaseConfig) -> Self {
        Self {
            models: BTreeMap::new(),
            state: RefCell::new(EntityStore::new()),
            hooks: RefCell::new(HookRegistry::new()),
            normalizer: Box::new(SchemaNormalizer),
            config,
            key_seq: Cell::new(0),
        }
    }

    /// Replace the normalizer used by every write
    pub fn with_normalizer(mut self, normalizer: impl Normalizer + 'static) -> Self {
        self.normalizer = Box::new(normalizer);
        self
    }

    /// Register and cross-check a full set of models
    ///
    /// # Errors
    ///
    /// See [`Database::register`] and [`Database::validate`].
    pub fn from_models<I>(config: DatabaseConfig, models: I) -> Result<Self>
    where
        I: IntoIterator<Item = ModelSchema>,
    {
        let mut db = Self::with_config(config);
        for model in models {
            db.register(model)?;
        }
        db.validate()?;
        Ok(db)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    // ========== Models ==========

    /// Register a model under its entity name
    ///
    /// # Errors
    ///
    /// Returns `DuplicateModel` if the entity is already registered, or
    /// `InvalidSchema` if the model's primary key is not a declared attribute.
    pub fn register(&mut self, schema: ModelSchema) -> Result<()> {
        schema.validate()?;
        let entity = schema.entity().to_string();
        if self.models.contains_key(&entity) {
            return Err(StoreError::DuplicateModel { entity });
        }
        tracing::debug!(entity = entity.as_str(), "registered model");
        self.models.insert(entity, schema);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `UnknownEntity` if no model is registered under `entity`.
    pub fn model(&self, entity: &str) -> Result<&ModelSchema> {
        self.models
            .get(entity)
            .ok_or_else(|| StoreError::UnknownEntity {
                entity: entity.to_string(),
            })
    }

    pub fn has_model(&self, entity: &str) -> bool {
        self.models.contains_key(entity)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }

    /// Check that every relation points at registered models
    ///
    /// # Errors
    ///
    /// Returns `MissingPivot` for a many-to-many relation whose pivot is not
    /// registered and `UnknownEntity` for any other missing target.
    pub fn validate(&self) -> Result<()> {
        for schema in self.models.values() {
            self.validate_fields(schema.entity(), schema.fields())?;
        }
        Ok(())
    }

    fn validate_fields(&self, entity: &str, fields: &Fields) -> Result<()> {
        for (name, field) in fields.iter() {
            match field {
                Field::Relation(Relation::BelongsToMany { pivot, .. })
                    if !self.has_model(pivot) =>
                {
                    return Err(StoreError::MissingPivot {
                        entity: entity.to_string(),
                        relation: name.to_string(),
                    });
                }
                Field::Relation(relation) => {
                    for target in relation.targets() {
                        self.model(target)?;
                    }
                }
                Field::Group(sub) => self.validate_fields(entity, sub)?,
                Field::Attr(_) => {}
            }
        }
        Ok(())
    }

    // ========== Hooks ==========

    /// Register a hook on a read phase
    pub fn register_hook<F>(&self, phase: Phase, callback: F) -> HookId
    where
        F: Fn(Vec<Record>, &str) -> Vec<Record> + 'static,
    {
        self.hooks.borrow_mut().register(phase, callback)
    }

    pub fn remove_hook(&self, id: HookId) -> bool {
        self.hooks.borrow_mut().remove(id)
    }

    pub fn hooks(&self) -> Ref<'_, HookRegistry> {
        self.hooks.borrow()
    }

    pub fn hooks_mut(&self) -> RefMut<'_, HookRegistry> {
        self.hooks.borrow_mut()
    }

    // ========== Queries ==========

    /// Start a query using the configured wrap policy
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no model is registered under `entity`.
    pub fn query(&self, entity: &str) -> Result<Repo<'_>> {
        Repo::new(self, entity, self.config.wrap)
    }

    /// Start a query returning plain records
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no model is registered under `entity`.
    pub fn query_plain(&self, entity: &str) -> Result<Repo<'_>> {
        Repo::new(self, entity, false)
    }

    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn all(&self, entity: &str) -> Result<Vec<Item>> {
        self.query(entity)?.all()
    }

    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn find(&self, entity: &str, id: impl Into<Identity>) -> Result<Option<Item>> {
        self.query(entity)?.find(id)
    }

    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn find_in<I, T>(&self, entity: &str, ids: I) -> Result<Vec<Item>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Identity>,
    {
        self.query(entity)?.find_in(ids)
    }

    /// # Errors
    ///
    /// See [`Database::query`].
    pub fn count(&self, entity: &str) -> Result<usize> {
        Ok(self.query(entity)?.count())
    }

    // ========== State ==========

    pub fn state(&self) -> Ref<'_, EntityStore> {
        self.state.borrow()
    }

    pub(crate) fn state_mut(&self) -> RefMut<'_, EntityStore> {
        self.state.borrow_mut()
    }

    /// Copy of every partition, for export
    pub fn snapshot(&self) -> NormalizedData {
        let state = self.state.borrow();
        state
            .entities()
            .into_iter()
            .filter_map(|entity| {
                let data = state.partition(&entity)?.data.clone();
                Some((entity, data))
            })
            .collect()
    }

    /// Empty one partition, or every existing partition of a known model
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if `entity` names an unregistered model.
    pub fn delete_all(&self, entity: Option<&str>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        match entity {
            Some(entity) => {
                self.model(entity)?;
                state.clear(entity);
            }
            None => {
                for entity in self.models.keys() {
                    state.clear(entity);
                }
            }
        }
        Ok(())
    }

    pub(crate) fn next_key_seq(&self) -> u64 {
        let next = self.key_seq.get() + 1;
        self.key_seq.set(next);
        next
    }

    // ========== Normalization ==========

    /// # Errors
    ///
    /// See [`Normalizer::normalize`].
    pub fn normalize(&self, entity: &str, data: &Value) -> Result<NormalizedData> {
        let ctx = NormalizeContext { db: self, entity };
        self.normalizer.normalize(data, &ctx)
    }

    /// Fill every normalized record into its stored shape
    pub(crate) fn fill_all(&self, data: NormalizedData) -> Result<NormalizedData> {
        data.into_iter()
            .map(|(entity, records)| {
                let schema = self.model(&entity)?;
                let filled: Records = records
                    .into_iter()
                    .map(|(id, raw)| {
                        let record = schema.fill(&raw, &id);
                        (id, record)
                    })
                    .collect();
                Ok((entity, filled))
            })
            .collect()
    }
}

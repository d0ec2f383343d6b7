//! Fluent query builder bound to one entity

use std::rc::Rc;

use serde_json::Value;

use super::plan::{
    Boolean, Constraint, Direction, Load, Order, QueryPlan, Where, WhereClause, WhereValue,
};
use crate::database::Database;
use crate::errors::Result;
use crate::model::{Field, ModelInstance, ModelSchema, Record};

/// Query and persistence entry point for one entity type
///
/// Builder methods append to the query plan and return `&mut Self` so calls
/// chain; nothing is validated against the schema until execution. Terminal
/// reads take `&self` and can be repeated.
///
/// ```
/// use normstore_core::{Database, ModelSchema, Direction};
/// use serde_json::json;
///
/// let mut db = Database::new();
/// db.register(ModelSchema::new("users").attr("id", json!(null)).attr("age", 0)).unwrap();
///
/// let users = db.query("users").unwrap();
/// users.insert(&json!([{"id": 1, "age": 30}, {"id": 2, "age": 20}])).unwrap();
///
/// let youngest = db
///     .query("users")
///     .unwrap()
///     .order_by("age", Direction::Asc)
///     .first()
///     .unwrap();
/// assert_eq!(youngest.unwrap().get("id"), Some(&json!(2)));
/// ```
#[derive(Debug, Clone)]
pub struct Repo<'db> {
    pub(crate) db: &'db Database,
    pub(crate) schema: &'db ModelSchema,
    pub(crate) plan: QueryPlan,
    pub(crate) wrap: bool,
}

impl<'db> Repo<'db> {
    pub(crate) fn new(db: &'db Database, entity: &str, wrap: bool) -> Result<Self> {
        Ok(Self {
            db,
            schema: db.model(entity)?,
            plan: QueryPlan::default(),
            wrap,
        })
    }

    pub fn entity(&self) -> &'db str {
        self.schema.entity()
    }

    pub fn schema(&self) -> &'db ModelSchema {
        self.schema
    }

    pub fn database(&self) -> &'db Database {
        self.db
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn is_wrapped(&self) -> bool {
        self.wrap
    }

    /// Toggle adapting results into model instances
    pub fn wrap(&mut self, wrap: bool) -> &mut Self {
        self.wrap = wrap;
        self
    }

    /// Fresh query on another entity with the same wrap policy
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no model is registered for `entity`.
    pub fn new_query(&self, entity: &str) -> Result<Repo<'db>> {
        Repo::new(self.db, entity, self.wrap)
    }

    /// Fresh unwrapped query on another entity
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if no model is registered for `entity`.
    pub fn new_plain_query(&self, entity: &str) -> Result<Repo<'db>> {
        Repo::new(self.db, entity, false)
    }

    /// Same entity and wrap policy, empty plan
    pub(crate) fn fresh(&self) -> Repo<'db> {
        Repo {
            db: self.db,
            schema: self.schema,
            plan: QueryPlan::default(),
            wrap: self.wrap,
        }
    }

    fn push_where(&mut self, clause: WhereClause, boolean: Boolean) -> &mut Self {
        self.plan.wheres.push(Where { clause, boolean });
        self
    }

    // ========== Filters ==========

    /// AND filter on a field value
    pub fn where_(&mut self, field: impl Into<String>, value: impl Into<WhereValue>) -> &mut Self {
        let clause = WhereClause::Field {
            field: field.into(),
            value: value.into(),
        };
        self.push_where(clause, Boolean::And)
    }

    /// OR filter on a field value
    pub fn or_where(
        &mut self,
        field: impl Into<String>,
        value: impl Into<WhereValue>,
    ) -> &mut Self {
        let clause = WhereClause::Field {
            field: field.into(),
            value: value.into(),
        };
        self.push_where(clause, Boolean::Or)
    }

    pub fn where_fn<F>(&mut self, field: impl Into<String>, test: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.where_(field, WhereValue::test(test))
    }

    pub fn or_where_fn<F>(&mut self, field: impl Into<String>, test: F) -> &mut Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        self.or_where(field, WhereValue::test(test))
    }

    /// AND filter over the whole record
    ///
    /// The predicate gets a fresh sub-query on the same entity. Returning
    /// `None` makes the filter hold iff the record survives the constraints
    /// the predicate added to that sub-query.
    pub fn where_query<F>(&mut self, test: F) -> &mut Self
    where
        F: Fn(&Record, &mut Repo<'_>) -> Option<bool> + 'static,
    {
        self.push_where(WhereClause::Query(Rc::new(test)), Boolean::And)
    }

    pub fn or_where_query<F>(&mut self, test: F) -> &mut Self
    where
        F: Fn(&Record, &mut Repo<'_>) -> Option<bool> + 'static,
    {
        self.push_where(WhereClause::Query(Rc::new(test)), Boolean::Or)
    }

    /// Like [`Repo::where_query`], also handing over the record as a model instance
    pub fn where_model<F>(&mut self, test: F) -> &mut Self
    where
        F: Fn(&Record, &mut Repo<'_>, &ModelInstance) -> Option<bool> + 'static,
    {
        self.push_where(WhereClause::Model(Rc::new(test)), Boolean::And)
    }

    pub fn or_where_model<F>(&mut self, test: F) -> &mut Self
    where
        F: Fn(&Record, &mut Repo<'_>, &ModelInstance) -> Option<bool> + 'static,
    {
        self.push_where(WhereClause::Model(Rc::new(test)), Boolean::Or)
    }

    // ========== Ordering and pagination ==========

    /// Add a sort key; repeated calls sort by each key in turn
    pub fn order_by(&mut self, field: impl Into<String>, direction: Direction) -> &mut Self {
        self.plan.orders.push(Order {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn offset(&mut self, offset: usize) -> &mut Self {
        self.plan.offset = offset;
        self
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.plan.limit = limit;
        self
    }

    // ========== Relation loads ==========

    /// Load a relation path; `"*"` loads every top-level relation
    pub fn with(&mut self, name: impl Into<String>) -> &mut Self {
        let name = name.into();
        if name == "*" {
            return self.with_all();
        }
        self.plan.loads.push(Load {
            name,
            constraint: None,
        });
        self
    }

    /// Load a relation whose sub-query is narrowed by `constraint`
    pub fn with_constraint(&mut self, name: impl Into<String>, constraint: Constraint) -> &mut Self {
        self.plan.loads.push(Load {
            name: name.into(),
            constraint: Some(constraint),
        });
        self
    }

    /// Load every top-level relation of the entity
    pub fn with_all(&mut self) -> &mut Self {
        self.with_all_using(|_| None)
    }

    /// Load every top-level relation, asking `constraint_for` per relation
    pub fn with_all_using<F>(&mut self, constraint_for: F) -> &mut Self
    where
        F: Fn(&str) -> Option<Constraint>,
    {
        let schema = self.schema;
        for (name, field) in schema.fields().iter() {
            if let Field::Relation(_) = field {
                self.plan.loads.push(Load {
                    name: name.to_string(),
                    constraint: constraint_for(name),
                });
            }
        }
        self
    }

    /// Load every relation, and theirs, down to `depth` further levels
    pub fn with_all_recursive(&mut self, depth: usize) -> &mut Self {
        self.with_all_using(|_| {
            (depth > 0).then(|| {
                Constraint::new(move |query: &mut Repo<'_>| {
                    query.with_all_recursive(depth - 1);
                })
            })
        })
    }

    /// [`Repo::with_all_recursive`] with the configured default depth
    pub fn with_all_recursive_default(&mut self) -> &mut Self {
        let depth = self.db.config().recursive_depth;
        self.with_all_recursive(depth)
    }
}

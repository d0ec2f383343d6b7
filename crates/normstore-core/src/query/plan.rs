//! Query plan: accumulated filters, orders, pagination and relation loads

use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::Repo;
use crate::model::{ModelInstance, Record};

/// How a filter combines with the others
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Predicate over a single field value
pub type ValueTest = Rc<dyn Fn(&Value) -> bool>;

/// Record predicate with a sub-query to mutate
///
/// Returning `Some(b)` decides the filter; returning `None` means the
/// sub-query's own constraints decide it.
pub type QueryTest = Rc<dyn Fn(&Record, &mut Repo<'_>) -> Option<bool>>;

/// Like [`QueryTest`], also receiving the record as a model instance
pub type ModelTest = Rc<dyn Fn(&Record, &mut Repo<'_>, &ModelInstance) -> Option<bool>>;

/// Right-hand side of a field filter
#[derive(Clone)]
pub enum WhereValue {
    /// Strict equality
    Equals(Value),
    /// Membership
    OneOf(Vec<Value>),
    /// Called with the field value, `null` when missing
    Test(ValueTest),
}

impl WhereValue {
    pub fn test<F>(f: F) -> Self
    where
        F: Fn(&Value) -> bool + 'static,
    {
        WhereValue::Test(Rc::new(f))
    }
}

impl From<Value> for WhereValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => WhereValue::OneOf(items),
            other => WhereValue::Equals(other),
        }
    }
}

impl From<Vec<Value>> for WhereValue {
    fn from(values: Vec<Value>) -> Self {
        WhereValue::OneOf(values)
    }
}

impl From<&str> for WhereValue {
    fn from(value: &str) -> Self {
        WhereValue::Equals(Value::from(value))
    }
}

impl From<String> for WhereValue {
    fn from(value: String) -> Self {
        WhereValue::Equals(Value::from(value))
    }
}

impl From<bool> for WhereValue {
    fn from(value: bool) -> Self {
        WhereValue::Equals(Value::from(value))
    }
}

macro_rules! where_value_from_number {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for WhereValue {
                fn from(value: $ty) -> Self {
                    WhereValue::Equals(Value::from(value))
                }
            }
        )*
    };
}

where_value_from_number!(i32, i64, u32, u64, usize, f64);

impl fmt::Debug for WhereValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereValue::Equals(value) => f.debug_tuple("Equals").field(value).finish(),
            WhereValue::OneOf(values) => f.debug_tuple("OneOf").field(values).finish(),
            WhereValue::Test(_) => f.write_str("Test(..)"),
        }
    }
}

#[derive(Clone)]
pub enum WhereClause {
    Field { field: String, value: WhereValue },
    Query(QueryTest),
    Model(ModelTest),
}

impl fmt::Debug for WhereClause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WhereClause::Field { field, value } => f
                .debug_struct("Field")
                .field("field", field)
                .field("value", value)
                .finish(),
            WhereClause::Query(_) => f.write_str("Query(..)"),
            WhereClause::Model(_) => f.write_str("Model(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Where {
    pub clause: WhereClause,
    pub boolean: Boolean,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub field: String,
    pub direction: Direction,
}

/// Callback applied to a relation's sub-query
///
/// Works in two modes: returning `None` injects constraints into the
/// sub-query; returning `Some(b)` keeps (`true`) or empties (`false`) it.
#[derive(Clone)]
pub struct Constraint(Rc<dyn Fn(&mut Repo<'_>) -> Option<bool>>);

impl Constraint {
    /// Constraint that mutates the sub-query
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut Repo<'_>) + 'static,
    {
        Constraint(Rc::new(move |repo| {
            f(repo);
            None
        }))
    }

    /// Constraint in pure boolean mode
    pub fn test<F>(f: F) -> Self
    where
        F: Fn(&mut Repo<'_>) -> Option<bool> + 'static,
    {
        Constraint(Rc::new(f))
    }

    pub fn apply(&self, repo: &mut Repo<'_>) -> Option<bool> {
        (self.0)(repo)
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Constraint(..)")
    }
}

/// A relation to materialize on results
#[derive(Debug, Clone)]
pub struct Load {
    /// Relation path; only the first dotted segment names a field here
    pub name: String,
    pub constraint: Option<Constraint>,
}

impl Load {
    /// First segment of the path
    pub fn field(&self) -> &str {
        self.name.split('.').next().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub wheres: Vec<Where>,
    pub orders: Vec<Order>,
    pub offset: usize,
    pub limit: usize,
    pub loads: Vec<Load>,
}

impl Default for QueryPlan {
    fn default() -> Self {
        Self {
            wheres: Vec::new(),
            orders: Vec::new(),
            offset: 0,
            limit: usize::MAX,
            loads: Vec::new(),
        }
    }
}

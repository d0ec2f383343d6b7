//! Relation-existence filters

use std::str::FromStr;

use serde_json::Value;

use super::plan::{Constraint, Load, WhereValue};
use super::Repo;
use crate::errors::{Result, StoreError};
use crate::model::ID_FIELD;

/// Relation-count comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    Eq,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Comparator {
    pub fn holds(&self, count: usize, expected: usize) -> bool {
        match self {
            Comparator::Eq => count == expected,
            Comparator::Gt => count > expected,
            Comparator::Ge => count >= expected,
            Comparator::Lt => count < expected,
            Comparator::Le => count <= expected,
        }
    }
}

impl FromStr for Comparator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "=" => Ok(Comparator::Eq),
            ">" => Ok(Comparator::Gt),
            ">=" => Ok(Comparator::Ge),
            "<" => Ok(Comparator::Lt),
            "<=" => Ok(Comparator::Le),
            other => Err(StoreError::InvalidComparator {
                operator: other.to_string(),
            }),
        }
    }
}

/// Test applied to the size of a loaded relation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HasConstraint {
    /// At least one related record
    Exists,
    AtLeast(usize),
    Compare(Comparator, usize),
}

impl HasConstraint {
    fn holds(&self, count: usize) -> bool {
        match self {
            HasConstraint::Exists => count >= 1,
            HasConstraint::AtLeast(n) => count >= *n,
            HasConstraint::Compare(comparator, n) => comparator.holds(count, *n),
        }
    }
}

impl From<usize> for HasConstraint {
    fn from(n: usize) -> Self {
        HasConstraint::AtLeast(n)
    }
}

/// Size of a loaded relation value; `None` when nothing is related
fn related_count(value: Option<&Value>) -> Option<usize> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) if items.is_empty() => None,
        Some(Value::Array(items)) => Some(items.len()),
        Some(_) => Some(1),
    }
}

impl<'db> Repo<'db> {
    /// Keep records with at least one related record
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if the relation targets an unregistered model.
    pub fn has(&mut self, name: &str) -> Result<&mut Self> {
        self.has_count(name, HasConstraint::Exists)
    }

    /// Keep records whose related count satisfies `constraint`; a bare number
    /// means "at least"
    ///
    /// # Errors
    ///
    /// See [`Repo::has`].
    pub fn has_count(&mut self, name: &str, constraint: impl Into<HasConstraint>) -> Result<&mut Self> {
        self.add_has_constraint(name, constraint.into(), true)
    }

    /// Keep records whose related count compares to `count` by `operator`
    /// (`=`, `>`, `>=`, `<`, `<=`)
    ///
    /// # Errors
    ///
    /// Returns `InvalidComparator` for any other operator, or see [`Repo::has`].
    pub fn has_cmp(&mut self, name: &str, operator: &str, count: usize) -> Result<&mut Self> {
        let comparator: Comparator = operator.parse()?;
        self.add_has_constraint(name, HasConstraint::Compare(comparator, count), true)
    }

    /// Keep records with no related record
    ///
    /// # Errors
    ///
    /// See [`Repo::has`].
    pub fn has_not(&mut self, name: &str) -> Result<&mut Self> {
        self.has_not_count(name, HasConstraint::Exists)
    }

    /// # Errors
    ///
    /// See [`Repo::has`].
    pub fn has_not_count(
        &mut self,
        name: &str,
        constraint: impl Into<HasConstraint>,
    ) -> Result<&mut Self> {
        self.add_has_constraint(name, constraint.into(), false)
    }

    /// # Errors
    ///
    /// See [`Repo::has_cmp`].
    pub fn has_not_cmp(&mut self, name: &str, operator: &str, count: usize) -> Result<&mut Self> {
        let comparator: Comparator = operator.parse()?;
        self.add_has_constraint(name, HasConstraint::Compare(comparator, count), false)
    }

    /// Keep records with a related record surviving `constraint`
    ///
    /// # Errors
    ///
    /// See [`Repo::has`].
    pub fn where_has(&mut self, name: &str, constraint: Constraint) -> Result<&mut Self> {
        self.add_where_has_constraint(name, constraint, true)
    }

    /// Keep records with no related record surviving `constraint`
    ///
    /// # Errors
    ///
    /// See [`Repo::has`].
    pub fn where_has_not(&mut self, name: &str, constraint: Constraint) -> Result<&mut Self> {
        self.add_where_has_constraint(name, constraint, false)
    }

    fn add_has_constraint(
        &mut self,
        name: &str,
        constraint: HasConstraint,
        existence: bool,
    ) -> Result<&mut Self> {
        let load = Load {
            name: name.to_string(),
            constraint: None,
        };
        let ids = self.has_matching_ids(load, existence, |count| constraint.holds(count))?;
        Ok(self.where_(ID_FIELD, WhereValue::OneOf(ids)))
    }

    fn add_where_has_constraint(
        &mut self,
        name: &str,
        constraint: Constraint,
        existence: bool,
    ) -> Result<&mut Self> {
        let load = Load {
            name: name.to_string(),
            constraint: Some(constraint),
        };
        let ids = self.has_matching_ids(load, existence, |_| true)?;
        Ok(self.where_(ID_FIELD, WhereValue::OneOf(ids)))
    }

    /// Identities of every record of the entity, ignoring this query's own
    /// filters, whose loaded relation passes (or, without `existence`,
    /// fails) `test`
    fn has_matching_ids<F>(&self, load: Load, existence: bool, test: F) -> Result<Vec<Value>>
    where
        F: Fn(usize) -> bool,
    {
        let field = load.field().to_string();
        let mut query = self.fresh();
        query.wrap(false);
        query.plan.loads.push(load);

        let ids = query
            .records()?
            .into_iter()
            .filter(|record| {
                let passes = related_count(record.get(&field)).is_some_and(&test);
                passes == existence
            })
            .filter_map(|record| record.get(ID_FIELD).cloned())
            .collect();

        Ok(ids)
    }
}

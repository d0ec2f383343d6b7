//! Read pipeline and terminal reads

use std::cmp::Ordering;

use serde_json::Value;

use super::hooks::{run_phase, Phase};
use super::plan::{Boolean, Load, WhereClause, WhereValue};
use super::predicate::field_matches;
use super::shape::Item;
use super::sort::{compare_values, sort_records};
use super::Repo;
use crate::errors::Result;
use crate::model::{Field, Fields, Identity, ModelInstance, Record, ID_FIELD};
use crate::relations::RelationResolver;

impl<'db> Repo<'db> {
    fn run_hooks(&self, phase: Phase, records: Vec<Record>) -> Vec<Record> {
        let hooks = self.db.hooks().for_phase(phase);
        if hooks.is_empty() {
            return records;
        }
        run_phase(&hooks, records, self.entity())
    }

    /// Snapshot, filter and sort, without pagination
    fn select(&self) -> Vec<Record> {
        let records = self.db.state().records(self.entity());
        let records = self.run_hooks(Phase::BeforeProcess, records);

        let records = if self.plan.wheres.is_empty() {
            records
        } else {
            records
                .into_iter()
                .filter(|record| self.matches(record))
                .collect()
        };
        let mut records = self.run_hooks(Phase::AfterWhere, records);

        sort_records(&mut records, &self.plan.orders);
        self.run_hooks(Phase::AfterOrderBy, records)
    }

    /// Run the full pipeline; records come back plain and without relations
    pub(crate) fn process(&self) -> Vec<Record> {
        let records: Vec<Record> = self
            .select()
            .into_iter()
            .skip(self.plan.offset)
            .take(self.plan.limit)
            .collect();
        self.run_hooks(Phase::AfterLimit, records)
    }

    /// AND group and OR group are evaluated independently; a record matches
    /// when either group holds
    fn matches(&self, record: &Record) -> bool {
        let mut and_seen = false;
        let mut all_hold = true;
        let mut or_seen = false;
        let mut any_holds = false;

        for filter in &self.plan.wheres {
            match filter.boolean {
                Boolean::And => {
                    and_seen = true;
                    if all_hold {
                        all_hold = self.evaluate(&filter.clause, record);
                    }
                }
                Boolean::Or => {
                    or_seen = true;
                    if !any_holds {
                        any_holds = self.evaluate(&filter.clause, record);
                    }
                }
            }
        }

        (and_seen && all_hold) || (or_seen && any_holds)
    }

    fn evaluate(&self, clause: &WhereClause, record: &Record) -> bool {
        match clause {
            WhereClause::Field { field, value } => field_matches(record, field, value),
            WhereClause::Query(test) => {
                let mut sub = self.fresh();
                match test(record, &mut sub) {
                    Some(result) => result,
                    None => sub.contains_record(record),
                }
            }
            WhereClause::Model(test) => {
                let mut sub = self.fresh();
                let instance = ModelInstance::new(self.schema, record.clone());
                match test(record, &mut sub, &instance) {
                    Some(result) => result,
                    None => sub.contains_record(record),
                }
            }
        }
    }

    fn contains_record(&mut self, record: &Record) -> bool {
        match record.get(ID_FIELD) {
            Some(id) => {
                self.where_(ID_FIELD, WhereValue::Equals(id.clone()));
                !self.process().is_empty()
            }
            None => false,
        }
    }

    // ========== Relation loading ==========

    /// Resolve every declared load onto `records`
    pub(crate) fn load_relations(&self, records: Vec<Record>) -> Result<Vec<Record>> {
        self.plan
            .loads
            .iter()
            .try_fold(records, |records, load| {
                self.process_load(records, load, self.schema.fields())
            })
    }

    fn process_load(&self, records: Vec<Record>, load: &Load, fields: &Fields) -> Result<Vec<Record>> {
        let name = load.field();
        let mut records = records;

        for (key, field) in fields.iter() {
            if key == name {
                if let Field::Relation(relation) = field {
                    records = relation.resolve(self, records, load)?;
                }
                break;
            }
            if let Field::Group(sub) = field {
                records = self.process_load(records, load, sub)?;
            }
        }

        Ok(records)
    }

    /// Pipeline output with relations loaded, unwrapped
    pub(crate) fn records(&self) -> Result<Vec<Record>> {
        let records = self.process();
        if self.plan.loads.is_empty() {
            return Ok(records);
        }
        self.load_relations(records)
    }

    fn wrap_record(&self, record: Record) -> Item {
        if self.wrap {
            Item::Model(ModelInstance::new(self.schema, record))
        } else {
            Item::Plain(record)
        }
    }

    fn item(&self, record: Record) -> Result<Option<Item>> {
        Ok(self.collect(vec![record])?.pop())
    }

    fn collect(&self, records: Vec<Record>) -> Result<Vec<Item>> {
        let records = if self.plan.loads.is_empty() {
            records
        } else {
            self.load_relations(records)?
        };
        Ok(records
            .into_iter()
            .map(|record| self.wrap_record(record))
            .collect())
    }

    // ========== Terminal reads ==========

    /// Every record of the query result
    ///
    /// # Errors
    ///
    /// Returns `UnknownEntity` if a loaded relation targets an unregistered model.
    pub fn get(&self) -> Result<Vec<Item>> {
        self.collect(self.process())
    }

    /// Alias of [`Repo::get`]
    ///
    /// # Errors
    ///
    /// See [`Repo::get`].
    pub fn all(&self) -> Result<Vec<Item>> {
        self.get()
    }

    /// First record of the query result
    ///
    /// # Errors
    ///
    /// See [`Repo::get`].
    pub fn first(&self) -> Result<Option<Item>> {
        match self.process().into_iter().next() {
            Some(record) => self.item(record),
            None => Ok(None),
        }
    }

    /// Last record of the query result
    ///
    /// # Errors
    ///
    /// See [`Repo::get`].
    pub fn last(&self) -> Result<Option<Item>> {
        match self.process().pop() {
            Some(record) => self.item(record),
            None => Ok(None),
        }
    }

    /// Record with identity `id` among the filtered result, ignoring
    /// offset and limit
    ///
    /// # Errors
    ///
    /// See [`Repo::get`].
    pub fn find(&self, id: impl Into<Identity>) -> Result<Option<Item>> {
        let id = id.into();
        let found = self
            .select()
            .into_iter()
            .find(|record| Identity::of(record).as_ref() == Some(&id));

        match found {
            Some(record) => self.item(record),
            None => Ok(None),
        }
    }

    /// Records whose identity is in `ids`, in query order
    ///
    /// # Errors
    ///
    /// See [`Repo::get`].
    pub fn find_in<I, T>(&self, ids: I) -> Result<Vec<Item>>
    where
        I: IntoIterator<Item = T>,
        T: Into<Identity>,
    {
        let ids: Vec<Value> = ids.into_iter().map(|id| id.into().to_value()).collect();
        let mut query = self.clone();
        query.where_(ID_FIELD, WhereValue::OneOf(ids));
        query.get()
    }

    /// Number of records in the query result
    pub fn count(&self) -> usize {
        self.process().len()
    }

    /// Largest non-null value of `field`, or `0` when there is none
    pub fn max(&self, field: &str) -> Value {
        self.extremum(field, Ordering::Greater)
    }

    /// Smallest non-null value of `field`, or `0` when there is none
    pub fn min(&self, field: &str) -> Value {
        self.extremum(field, Ordering::Less)
    }

    fn extremum(&self, field: &str, wanted: Ordering) -> Value {
        self.process()
            .iter()
            .filter_map(|record| record.get(field))
            .filter(|value| !value.is_null())
            .fold(None::<&Value>, |best, value| match best {
                Some(current) if compare_values(Some(value), Some(current)) != wanted => {
                    Some(current)
                }
                _ => Some(value),
            })
            .cloned()
            .unwrap_or_else(|| Value::from(0))
    }
}

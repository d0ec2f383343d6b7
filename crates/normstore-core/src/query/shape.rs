//! Result shapes returned by reads and writes

use serde::Serialize;
use serde_json::Value;

use crate::model::{Identity, ModelInstance, Record};

/// One result record, wrapped into its model shape or left plain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Model(ModelInstance),
    Plain(Record),
}

impl Item {
    pub fn record(&self) -> &Record {
        match self {
            Item::Model(instance) => instance.record(),
            Item::Plain(record) => record,
        }
    }

    pub fn into_record(self) -> Record {
        match self {
            Item::Model(instance) => instance.into_record(),
            Item::Plain(record) => record,
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.record().get(field)
    }

    pub fn id(&self) -> Option<Identity> {
        Identity::of(self.record())
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Item::Model(_))
    }
}

/// What a write hands back after re-reading the affected records
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReturnData {
    /// Nothing was written, or nothing written is readable
    Empty,
    One(Item),
    Many(Vec<Item>),
}

impl ReturnData {
    pub fn is_empty(&self) -> bool {
        match self {
            ReturnData::Empty => true,
            ReturnData::One(_) => false,
            ReturnData::Many(items) => items.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ReturnData::Empty => 0,
            ReturnData::One(_) => 1,
            ReturnData::Many(items) => items.len(),
        }
    }

    pub fn items(&self) -> Vec<&Item> {
        match self {
            ReturnData::Empty => Vec::new(),
            ReturnData::One(item) => vec![item],
            ReturnData::Many(items) => items.iter().collect(),
        }
    }

    pub fn into_items(self) -> Vec<Item> {
        match self {
            ReturnData::Empty => Vec::new(),
            ReturnData::One(item) => vec![item],
            ReturnData::Many(items) => items,
        }
    }

    /// Identities of the returned records, in result order
    pub fn ids(&self) -> Vec<Identity> {
        self.items().into_iter().filter_map(Item::id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plain(id: &str) -> Item {
        Item::Plain(json!({"$id": id}).as_object().cloned().unwrap())
    }

    #[test]
    fn test_return_data_ids() {
        assert!(ReturnData::Empty.ids().is_empty());
        assert_eq!(ReturnData::One(plain("1")).ids(), vec![Identity::from(1)]);
        let many = ReturnData::Many(vec![plain("1"), plain("3")]);
        assert_eq!(many.len(), 2);
        assert_eq!(many.ids(), vec![Identity::from(1), Identity::from(3)]);
    }

    #[test]
    fn test_empty_many_is_empty() {
        assert!(ReturnData::Many(Vec::new()).is_empty());
        assert!(!ReturnData::One(plain("x")).is_empty());
    }
}

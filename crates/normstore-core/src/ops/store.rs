use std::collections::BTreeMap;

use crate::model::{Identity, Record, Records};

/// Records of one entity type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub data: Records,
}

/// In-memory state container: entity name to partition
///
/// Plain map-based storage. Not thread-safe (no Arc/RwLock); the owning
/// `Database` keeps it behind a `RefCell` for single-threaded use.
/// A partition only exists once something has been written to it.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    partitions: BTreeMap<String, Partition>,
}

impl EntityStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self {
            partitions: BTreeMap::new(),
        }
    }

    pub fn partition(&self, entity: &str) -> Option<&Partition> {
        self.partitions.get(entity)
    }

    pub fn has_partition(&self, entity: &str) -> bool {
        self.partitions.contains_key(entity)
    }

    /// Get a stored record by identity
    pub fn get(&self, entity: &str, id: &Identity) -> Option<&Record> {
        self.partitions.get(entity).and_then(|p| p.data.get(id))
    }

    pub fn contains(&self, entity: &str, id: &Identity) -> bool {
        self.get(entity, id).is_some()
    }

    /// Shallow copies of every record in partition order
    ///
    /// Callers never receive references into the store.
    pub fn records(&self, entity: &str) -> Vec<Record> {
        self.partitions
            .get(entity)
            .map(|p| p.data.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of records in a partition (0 when absent)
    pub fn len(&self, entity: &str) -> usize {
        self.partitions.get(entity).map_or(0, |p| p.data.len())
    }

    /// Replace a partition wholesale
    pub fn replace(&mut self, entity: &str, data: Records) {
        self.partitions
            .insert(entity.to_string(), Partition { data });
    }

    /// Merge records into a partition; existing identities are overwritten
    pub fn merge(&mut self, entity: &str, data: Records) {
        self.partitions
            .entry(entity.to_string())
            .or_default()
            .data
            .extend(data);
    }

    pub fn get_mut(&mut self, entity: &str, id: &Identity) -> Option<&mut Record> {
        self.partitions
            .get_mut(entity)
            .and_then(|p| p.data.get_mut(id))
    }

    pub fn remove(&mut self, entity: &str, id: &Identity) -> Option<Record> {
        self.partitions
            .get_mut(entity)
            .and_then(|p| p.data.remove(id))
    }

    /// Empty a partition if it exists; absent partitions stay absent
    pub fn clear(&mut self, entity: &str) {
        if let Some(partition) = self.partitions.get_mut(entity) {
            partition.data.clear();
        }
    }

    /// Names of entities that have a partition
    pub fn entities(&self) -> Vec<String> {
        self.partitions.keys().cloned().collect()
    }
}

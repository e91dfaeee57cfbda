//! In-memory state of one collection and its secondary indexes.

use crate::record::Record;
use std::collections::{BTreeMap, BTreeSet};

/// Records of one collection, keyed by id, with a timestamp index and a
/// flag index. Both indexes order by `(timestamp, id)`.
#[derive(Debug, Default)]
pub(crate) struct CollectionData {
    records: BTreeMap<String, Record>,
    by_timestamp: BTreeSet<(u64, String)>,
    by_flag: [BTreeSet<(u64, String)>; 2],
}

impl CollectionData {
    pub(crate) fn get(&self, id: &str) -> Option<&Record> {
        self.records.get(id)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    /// Inserts or replaces a record, returning the previous one.
    pub(crate) fn insert(&mut self, record: Record) -> Option<Record> {
        let previous = self.remove(&record.id);
        let key = (record.timestamp, record.id.clone());
        self.by_flag[usize::from(record.flag)].insert(key.clone());
        self.by_timestamp.insert(key);
        self.records.insert(record.id.clone(), record);
        previous
    }

    pub(crate) fn remove(&mut self, id: &str) -> Option<Record> {
        let record = self.records.remove(id)?;
        let key = (record.timestamp, record.id.clone());
        self.by_timestamp.remove(&key);
        self.by_flag[usize::from(record.flag)].remove(&key);
        Some(record)
    }

    /// Removes every record, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        self.by_timestamp.clear();
        self.by_flag.iter_mut().for_each(BTreeSet::clear);
        count
    }

    /// Records in key order.
    pub(crate) fn values(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Records in ascending timestamp order.
    pub(crate) fn iter_by_timestamp(&self) -> impl Iterator<Item = &Record> + '_ {
        self.by_timestamp
            .iter()
            .filter_map(|(_, id)| self.records.get(id))
    }

    /// Records with the given flag, in ascending timestamp order.
    pub(crate) fn iter_by_flag(&self, flag: bool) -> impl Iterator<Item = &Record> + '_ {
        self.by_flag[usize::from(flag)]
            .iter()
            .filter_map(|(_, id)| self.records.get(id))
    }
}

//! Ordered, id-unique collections of synced records.

use serde::{Deserialize, Serialize};

use crate::record::{SyncState, SyncedRecord, Timestamp};
use crate::task::{Task, TaskId};

/// An ordered collection of [`SyncedRecord`]s, unique by task id.
///
/// Insertion order is preserved for display. All operations are pure:
/// [`save`](Self::save), [`filter`](Self::filter), and [`map`](Self::map)
/// return new sets.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RecordSet {
    records: Vec<SyncedRecord>,
}

impl RecordSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Builds a set from records, folding duplicates through [`save`](Self::save)
    /// so the last record for an id wins and ids stay unique.
    #[must_use]
    pub fn from_records(records: impl IntoIterator<Item = SyncedRecord>) -> Self {
        records
            .into_iter()
            .fold(Self::new(), |set, record| set.save(record))
    }

    /// Converts a plain remote task list into a set of `InSync` records, all
    /// stamped with the same version.
    #[must_use]
    pub fn as_synced(tasks: impl IntoIterator<Item = Task>, version: Timestamp) -> Self {
        Self::from_records(
            tasks
                .into_iter()
                .map(|task| SyncedRecord::new(task, SyncState::InSync, version)),
        )
    }

    /// Full ordered list of records.
    #[must_use]
    pub fn all(&self) -> &[SyncedRecord] {
        &self.records
    }

    /// Iterates the records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SyncedRecord> {
        self.records.iter()
    }

    /// Looks up the record for a task id.
    #[must_use]
    pub fn get(&self, id: &TaskId) -> Option<&SyncedRecord> {
        self.records.iter().find(|record| record.task_id() == id)
    }

    /// Returns a new set with `record` replacing any record of the same id
    /// in place, or appended if the id is absent.
    #[must_use]
    pub fn save(&self, record: SyncedRecord) -> Self {
        let mut records = self.records.clone();
        match records
            .iter()
            .position(|existing| existing.task_id() == record.task_id())
        {
            Some(index) => records[index] = record,
            None => records.push(record),
        }
        Self { records }
    }

    /// Returns the ordered sublist of records matching the predicate.
    #[must_use]
    pub fn filter(&self, predicate: impl Fn(&SyncedRecord) -> bool) -> Self {
        Self {
            records: self
                .records
                .iter()
                .filter(|record| predicate(record))
                .cloned()
                .collect(),
        }
    }

    /// Returns a new set with every record transformed. The transform must
    /// not change task ids.
    #[must_use]
    pub fn map(&self, transform: impl Fn(&SyncedRecord) -> SyncedRecord) -> Self {
        Self {
            records: self.records.iter().map(transform).collect(),
        }
    }

    /// Number of records, including locally-deleted ones.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the set holds zero records. Presentation code should prefer
    /// an [`EmptinessPolicy`] over this raw check.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl IntoIterator for RecordSet {
    type Item = SyncedRecord;
    type IntoIter = std::vec::IntoIter<SyncedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordSet {
    type Item = &'a SyncedRecord;
    type IntoIter = std::slice::Iter<'a, SyncedRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Decides whether a record set should be presented as empty.
///
/// Injected per query so alternate UI policies can be substituted without
/// touching the engine.
pub trait EmptinessPolicy: Send + Sync {
    /// Returns `true` if the set holds nothing worth presenting.
    fn is_empty(&self, records: &RecordSet) -> bool;
}

/// Default emptiness policy: a record counts as present unless it is marked
/// [`SyncState::DeletedLocally`], so a list containing only pending deletions
/// is reported as empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct VisibleRecords;

impl EmptinessPolicy for VisibleRecords {
    fn is_empty(&self, records: &RecordSet) -> bool {
        records
            .iter()
            .all(|record| record.state() == SyncState::DeletedLocally)
    }
}

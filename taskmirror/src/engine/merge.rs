//! Pure reconciliation functions for converting remote snapshots.

use taskmirror_model::{RecordSet, SyncState, SyncedRecord, Task, Timestamp};

/// Converts a plain remote task list into a record set, preserving local
/// records that carry an in-flight write newer than the conversion time.
///
/// The higher version is authoritative: a local record whose `version` is
/// newer than `now` and whose state is not yet `InSync` stays in place of
/// the remote value. Everything else is adopted as `InSync` stamped `now`.
/// Display order follows the remote list; local-only records absent from it
/// are dropped (the remote owns membership).
pub fn from_remote(working: &RecordSet, remote: &[Task], now: Timestamp) -> RecordSet {
    RecordSet::from_records(remote.iter().map(|task| {
        match working.get(&task.id) {
            Some(existing)
                if existing.version() > now && existing.state() != SyncState::InSync =>
            {
                existing.clone()
            }
            _ => SyncedRecord::new(task.clone(), SyncState::InSync, now),
        }
    }))
}

/// Value equality over task fields and sync states, independent of version
/// stamps. Used for change suppression on refresh.
pub fn value_equal(a: &RecordSet, b: &RecordSet) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| x.data() == y.data() && x.state() == y.state())
}

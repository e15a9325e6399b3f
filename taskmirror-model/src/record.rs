//! Versioned sync records wrapping tasks with reconciliation metadata.

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

/// Logical write time in milliseconds since the Unix epoch.
///
/// Used for staleness checks and conflict arbitration between writes to the
/// same task id. Only ordering matters; wall-clock accuracy does not.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a timestamp from milliseconds since the Unix epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the timestamp as milliseconds since the Unix epoch.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Milliseconds elapsed from `earlier` to `self`, saturating at zero.
    #[must_use]
    pub const fn millis_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Per-record reconciliation lifecycle tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncState {
    /// Confirmed against the remote source.
    InSync,
    /// Written locally, remote confirmation pending.
    Ahead,
    /// Remote write failed; the local value stands but is flagged.
    SyncError,
    /// Marked for deletion locally, remote deletion pending.
    DeletedLocally,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InSync => write!(f, "in_sync"),
            Self::Ahead => write!(f, "ahead"),
            Self::SyncError => write!(f, "sync_error"),
            Self::DeletedLocally => write!(f, "deleted_locally"),
        }
    }
}

/// A task paired with its sync state and logical write time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncedRecord {
    data: Task,
    state: SyncState,
    version: Timestamp,
}

impl SyncedRecord {
    /// Creates a record from a task, a sync state, and a version stamp.
    #[must_use]
    pub const fn new(data: Task, state: SyncState, version: Timestamp) -> Self {
        Self {
            data,
            state,
            version,
        }
    }

    /// The wrapped task value.
    #[must_use]
    pub const fn data(&self) -> &Task {
        &self.data
    }

    /// The id of the wrapped task.
    #[must_use]
    pub const fn task_id(&self) -> &TaskId {
        &self.data.id
    }

    /// The reconciliation state.
    #[must_use]
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// The logical write time.
    #[must_use]
    pub const fn version(&self) -> Timestamp {
        self.version
    }

    /// Returns a copy with a different sync state, version unchanged.
    #[must_use]
    pub fn with_state(&self, state: SyncState) -> Self {
        Self {
            data: self.data.clone(),
            state,
            version: self.version,
        }
    }
}

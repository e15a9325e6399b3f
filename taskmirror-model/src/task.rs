//! Task values and identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier, stable across the local cache and the remote
/// source. Stored as a string so ids minted elsewhere round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(String);

impl TaskId {
    /// Creates an id from an existing string value.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Mints a new time-ordered identifier (UUID v7).
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for TaskId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable task value.
///
/// Two tasks are equal iff all fields match. State changes go through
/// [`complete`](Self::complete) / [`activate`](Self::activate), which return
/// derived copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier, shared between local and remote representations.
    pub id: TaskId,
    /// Short title shown in lists.
    pub title: String,
    /// Optional longer description.
    pub description: Option<String>,
    /// Whether the task has been completed.
    pub completed: bool,
}

impl Task {
    /// Creates a new active task with no description.
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            completed: false,
        }
    }

    /// Creates a new active task, minting a fresh time-ordered id.
    #[must_use]
    pub fn with_new_id(title: impl Into<String>) -> Self {
        Self::new(TaskId::random(), title)
    }

    /// Returns a copy of this task with the given description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns a completed copy of this task.
    #[must_use]
    pub fn complete(&self) -> Self {
        Self {
            completed: true,
            ..self.clone()
        }
    }

    /// Returns an active (not completed) copy of this task.
    #[must_use]
    pub fn activate(&self) -> Self {
        Self {
            completed: false,
            ..self.clone()
        }
    }
}

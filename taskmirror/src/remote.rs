//! The remote source of truth for the task list.
//!
//! Defines the [`RemoteSource`] trait plus [`InMemoryRemoteSource`], an
//! in-memory implementation with failure injection and call counters.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use taskmirror_model::{Task, TaskId};

/// Errors that can occur when talking to the remote source.
///
/// Retry and backoff policy belong to implementations of [`RemoteSource`];
/// the engine never retries on its own.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The remote endpoint could not be reached.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote rejected or failed the request.
    #[error("request failed: {0}")]
    RequestFailed(String),
}

/// The remote collaborator. Task lists are plain and unversioned; the engine
/// stamps them on conversion.
pub trait RemoteSource: Send + Sync + 'static {
    /// Fetch the full task list.
    fn load(&self) -> impl Future<Output = Result<Vec<Task>, RemoteError>> + Send;

    /// Write a single task, returning the stored value.
    fn save_task(&self, task: &Task) -> impl Future<Output = Result<Task, RemoteError>> + Send;

    /// Delete all completed tasks, returning the remaining list (not an ack).
    fn clear_completed(&self) -> impl Future<Output = Result<Vec<Task>, RemoteError>> + Send;
}

#[derive(Debug, Default)]
struct RemoteState {
    tasks: Vec<Task>,
    load_error: Option<String>,
    write_error: Option<String>,
    save_task_calls: u64,
    clear_completed_calls: u64,
}

/// In-memory [`RemoteSource`] with shared state and failure injection.
///
/// Clones share the same underlying state, so a test can adjust the remote
/// while the engine owns a handle to it.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRemoteSource {
    state: Arc<RwLock<RemoteState>>,
}

impl InMemoryRemoteSource {
    /// Creates an empty remote.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a remote holding the given tasks.
    #[must_use]
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let remote = Self::new();
        remote.state.write().tasks = tasks;
        remote
    }

    /// Replaces the remote task list.
    pub fn set_tasks(&self, tasks: Vec<Task>) {
        self.state.write().tasks = tasks;
    }

    /// Makes every subsequent `load` fail, or clears the injected failure.
    pub fn set_load_error(&self, message: Option<&str>) {
        self.state.write().load_error = message.map(str::to_string);
    }

    /// Makes every subsequent write (`save_task`, `clear_completed`) fail,
    /// or clears the injected failure.
    pub fn set_write_error(&self, message: Option<&str>) {
        self.state.write().write_error = message.map(str::to_string);
    }

    /// Number of `save_task` calls observed.
    #[must_use]
    pub fn save_task_calls(&self) -> u64 {
        self.state.read().save_task_calls
    }

    /// Number of `clear_completed` calls observed.
    #[must_use]
    pub fn clear_completed_calls(&self) -> u64 {
        self.state.read().clear_completed_calls
    }

    /// Current remote task list.
    #[must_use]
    pub fn tasks(&self) -> Vec<Task> {
        self.state.read().tasks.clone()
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.state
            .read()
            .tasks
            .iter()
            .find(|task| &task.id == id)
            .cloned()
    }
}

impl RemoteSource for InMemoryRemoteSource {
    async fn load(&self) -> Result<Vec<Task>, RemoteError> {
        let state = self.state.read();
        if let Some(message) = &state.load_error {
            return Err(RemoteError::Unavailable(message.clone()));
        }
        Ok(state.tasks.clone())
    }

    async fn save_task(&self, task: &Task) -> Result<Task, RemoteError> {
        let mut state = self.state.write();
        state.save_task_calls += 1;
        if let Some(message) = &state.write_error {
            return Err(RemoteError::RequestFailed(message.clone()));
        }
        match state.tasks.iter().position(|t| t.id == task.id) {
            Some(index) => state.tasks[index] = task.clone(),
            None => state.tasks.push(task.clone()),
        }
        Ok(task.clone())
    }

    async fn clear_completed(&self) -> Result<Vec<Task>, RemoteError> {
        let mut state = self.state.write();
        state.clear_completed_calls += 1;
        if let Some(message) = &state.write_error {
            return Err(RemoteError::RequestFailed(message.clone()));
        }
        state.tasks.retain(|task| !task.completed);
        Ok(state.tasks.clone())
    }
}

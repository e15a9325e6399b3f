//! Local cache storage for synced records.
//!
//! Defines the [`LocalStore`] trait the engine reads and writes through,
//! plus [`InMemoryLocalStore`], an in-memory implementation with failure
//! injection used in tests and as an offline default.

use std::future::Future;
use std::sync::Arc;

use parking_lot::RwLock;

use taskmirror_model::{RecordSet, SyncedRecord};

/// Errors that can occur during local store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage is unavailable.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A read operation failed.
    #[error("read failed: {0}")]
    ReadFailed(String),

    /// A write operation failed.
    #[error("write failed: {0}")]
    WriteFailed(String),
}

/// The local persistence collaborator.
///
/// `load` may yield an empty set; a read failure is query-fatal (the engine
/// emits a dataless error and ignores any remote outcome). Write failures
/// after a confirmed remote operation are logged, not surfaced.
pub trait LocalStore: Send + Sync + 'static {
    /// Load the full cached record set.
    fn load(&self) -> impl Future<Output = Result<RecordSet, StoreError>> + Send;

    /// Replace the cached record set wholesale.
    fn save_all(&self, records: &RecordSet) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Upsert a single record.
    fn save_record(
        &self,
        record: &SyncedRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

#[derive(Debug, Default)]
struct InMemoryState {
    records: RecordSet,
    load_error: Option<String>,
    write_error: Option<String>,
    save_all_calls: u64,
    save_record_calls: u64,
}

/// In-memory [`LocalStore`] with shared state and failure injection.
///
/// Clones share the same underlying state, so a test can hold a handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLocalStore {
    state: Arc<RwLock<InMemoryState>>,
}

impl InMemoryLocalStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given records.
    #[must_use]
    pub fn with_records(records: RecordSet) -> Self {
        let store = Self::new();
        store.state.write().records = records;
        store
    }

    /// Makes every subsequent `load` fail with the given message, or clears
    /// the injected failure when `None`.
    pub fn set_load_error(&self, message: Option<&str>) {
        self.state.write().load_error = message.map(str::to_string);
    }

    /// Makes every subsequent write fail with the given message, or clears
    /// the injected failure when `None`.
    pub fn set_write_error(&self, message: Option<&str>) {
        self.state.write().write_error = message.map(str::to_string);
    }

    /// The currently cached record set.
    #[must_use]
    pub fn records(&self) -> RecordSet {
        self.state.read().records.clone()
    }

    /// Number of `save_all` calls observed.
    #[must_use]
    pub fn save_all_calls(&self) -> u64 {
        self.state.read().save_all_calls
    }

    /// Number of `save_record` calls observed.
    #[must_use]
    pub fn save_record_calls(&self) -> u64 {
        self.state.read().save_record_calls
    }
}

impl LocalStore for InMemoryLocalStore {
    async fn load(&self) -> Result<RecordSet, StoreError> {
        let state = self.state.read();
        if let Some(message) = &state.load_error {
            return Err(StoreError::ReadFailed(message.clone()));
        }
        Ok(state.records.clone())
    }

    async fn save_all(&self, records: &RecordSet) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.save_all_calls += 1;
        if let Some(message) = &state.write_error {
            return Err(StoreError::WriteFailed(message.clone()));
        }
        state.records = records.clone();
        Ok(())
    }

    async fn save_record(&self, record: &SyncedRecord) -> Result<(), StoreError> {
        let mut state = self.state.write();
        state.save_record_calls += 1;
        if let Some(message) = &state.write_error {
            return Err(StoreError::WriteFailed(message.clone()));
        }
        state.records = state.records.save(record.clone());
        Ok(())
    }
}

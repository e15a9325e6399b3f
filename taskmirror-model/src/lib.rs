//! Data model for the `Taskmirror` synchronization engine.
//!
//! Everything here is a pure value: tasks, versioned sync records, ordered
//! record sets, and the tri-state status event envelope. Transformations
//! return new values; nothing mutates in place.

pub mod event;
pub mod record;
pub mod set;
pub mod task;

pub use event::{StatusEvent, SyncFailure};
pub use record::{SyncState, SyncedRecord, Timestamp};
pub use set::{EmptinessPolicy, RecordSet, VisibleRecords};
pub use task::{Task, TaskId};

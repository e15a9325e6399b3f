//! `Taskmirror` — local-first task list synchronization engine.
//!
//! Reconciles a local cache of a task list with a remote source of truth,
//! exposes the reconciled result as a continuous stream of status events,
//! and applies user mutations optimistically against the cache while
//! confirming them against the remote source in the background.

pub mod clock;
pub mod config;
pub mod engine;
pub mod freshness;
pub mod remote;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SyncConfig;
pub use engine::{EventStream, QueryFilter, SyncEngine};
pub use freshness::{FreshnessPolicy, MaxAgeFreshness, StaticFreshness};
pub use remote::{InMemoryRemoteSource, RemoteError, RemoteSource};
pub use store::{InMemoryLocalStore, LocalStore, StoreError};

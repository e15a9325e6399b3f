//! The reconciliation engine.
//!
//! [`SyncEngine`] merges the local cache and the remote source into one
//! never-terminating event stream per query, applies mutations optimistically
//! against its working record set, and confirms them against the remote
//! source in the background.
//!
//! Concurrency model: the working set lives behind a `tokio::sync::Mutex`
//! (single-writer discipline — every read-modify-write of the working set is
//! serialized), while the subscriber hub lives behind a `parking_lot::Mutex`
//! that is never held across an await. Subscribers receive events over
//! bounded mpsc channels and are pruned when they disconnect.

pub mod merge;
pub mod stream;

pub use stream::{EventStream, QueryFilter};

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};

use taskmirror_model::{
    EmptinessPolicy, RecordSet, StatusEvent, SyncFailure, SyncState, SyncedRecord, Task, Timestamp,
    VisibleRecords,
};

use crate::clock::{Clock, SystemClock};
use crate::config::SyncConfig;
use crate::freshness::{FreshnessPolicy, MaxAgeFreshness};
use crate::remote::RemoteSource;
use crate::store::LocalStore;

/// Working state owned by the engine's session: the last known record set
/// and the last remote-derived snapshot (for refresh change suppression).
#[derive(Default)]
struct SessionState {
    working: RecordSet,
    last_remote: Option<RecordSet>,
}

/// Subscriber bookkeeping: open channels, the last emitted event for replay
/// to late subscribers, and whether the initial load has been started.
#[derive(Default)]
struct EventHub {
    subscribers: Vec<mpsc::Sender<StatusEvent>>,
    last_event: Option<StatusEvent>,
    activated: bool,
}

struct Inner<L, R> {
    local: L,
    remote: R,
    clock: Arc<dyn Clock>,
    freshness: Arc<dyn FreshnessPolicy>,
    emptiness: Arc<dyn EmptinessPolicy>,
    event_buffer: usize,
    session: Mutex<SessionState>,
    hub: parking_lot::Mutex<EventHub>,
}

/// The local-first synchronization engine.
///
/// Cheap to clone; clones share one session. Query streams are obtained
/// with [`events`](Self::events) and friends; all mutating operations are
/// lazy futures whose effects are observed only through those streams.
pub struct SyncEngine<L, R> {
    inner: Arc<Inner<L, R>>,
}

impl<L, R> Clone for SyncEngine<L, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: LocalStore, R: RemoteSource> SyncEngine<L, R> {
    /// Creates an engine with system collaborators: [`SystemClock`],
    /// [`MaxAgeFreshness`] from the config, and [`VisibleRecords`].
    #[must_use]
    pub fn new(local: L, remote: R, config: SyncConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let freshness = Arc::new(MaxAgeFreshness::new(
            config.freshness_max_age,
            Arc::clone(&clock),
        ));
        Self::with_collaborators(
            local,
            remote,
            clock,
            freshness,
            Arc::new(VisibleRecords),
            config,
        )
    }

    /// Creates an engine with explicit collaborators.
    #[must_use]
    pub fn with_collaborators(
        local: L,
        remote: R,
        clock: Arc<dyn Clock>,
        freshness: Arc<dyn FreshnessPolicy>,
        emptiness: Arc<dyn EmptinessPolicy>,
        config: SyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                local,
                remote,
                clock,
                freshness,
                emptiness,
                // Replaying the last event to a new subscriber needs one
                // free slot, so a zero capacity is never accepted.
                event_buffer: config.event_buffer.max(1),
                session: Mutex::new(SessionState::default()),
                hub: parking_lot::Mutex::new(EventHub::default()),
            }),
        }
    }

    /// Subscribes to status events for the full task list.
    ///
    /// The first subscription on a session starts the initial load; later
    /// subscriptions replay the last emitted event and then follow along.
    /// Must be called within a Tokio runtime.
    #[must_use]
    pub fn events(&self) -> EventStream {
        self.events_filtered(QueryFilter::All, Arc::clone(&self.inner.emptiness))
    }

    /// Subscribes to status events for active (not completed) tasks.
    #[must_use]
    pub fn active_events(&self) -> EventStream {
        self.events_filtered(QueryFilter::Active, Arc::clone(&self.inner.emptiness))
    }

    /// Subscribes to status events for completed tasks.
    #[must_use]
    pub fn completed_events(&self) -> EventStream {
        self.events_filtered(QueryFilter::Completed, Arc::clone(&self.inner.emptiness))
    }

    /// Subscribes with an explicit filter and emptiness policy.
    #[must_use]
    pub fn events_filtered(
        &self,
        filter: QueryFilter,
        emptiness: Arc<dyn EmptinessPolicy>,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(self.inner.event_buffer);
        let activate = {
            let mut hub = self.inner.hub.lock();
            if let Some(last) = &hub.last_event {
                // Freshly created channel, capacity >= 1: cannot be full.
                let _ = tx.try_send(last.clone());
            }
            hub.subscribers.push(tx);
            !std::mem::replace(&mut hub.activated, true)
        };
        if activate {
            tracing::debug!("first subscriber, starting initial load");
            tokio::spawn(Inner::initial_load(Arc::clone(&self.inner)));
        }
        EventStream::new(rx, filter, emptiness)
    }

    /// Completes a task: optimistic local write, then remote confirmation.
    pub async fn complete(&self, task: Task) {
        self.inner.mutate(task, Task::complete).await;
    }

    /// Re-activates a completed task.
    pub async fn activate(&self, task: Task) {
        self.inner.mutate(task, Task::activate).await;
    }

    /// Saves an edited task as-is.
    pub async fn save(&self, task: Task) {
        self.inner.mutate(task, Clone::clone).await;
    }

    /// Refetches from the remote source, suppressing events when the data
    /// has not changed since the last remote-derived snapshot.
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    /// Deletes all completed tasks: local intent markers first, then the
    /// remote bulk clear.
    pub async fn clear_completed(&self) {
        self.inner.clear_completed().await;
    }
}

impl<L: LocalStore, R: RemoteSource> Inner<L, R> {
    /// Fans an event out to every subscriber and retains it for replay.
    fn emit(&self, event: StatusEvent) {
        let mut hub = self.hub.lock();
        hub.last_event = Some(event.clone());
        hub.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!("subscriber channel full, dropping event");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
    }

    /// Wraps a snapshot for an event payload, presenting policy-empty sets
    /// as absent data.
    fn data_or_none(&self, records: &RecordSet) -> Option<RecordSet> {
        if self.emptiness.is_empty(records) {
            None
        } else {
            Some(records.clone())
        }
    }

    /// The query path: local read and remote read in parallel, local served
    /// when fresh, remote adopted otherwise.
    async fn initial_load(inner: Arc<Self>) {
        inner.emit(StatusEvent::loading(None));

        let remote_read = {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move { inner.remote.load().await })
        };

        let local_snapshot = match inner.local.load().await {
            Ok(records) => records,
            Err(e) => {
                // Local failure is fatal to the query; a later remote
                // success must not override it.
                tracing::warn!(error = %e, "local read failed");
                remote_read.abort();
                inner.emit(StatusEvent::error(None, SyncFailure::LocalRead(e.to_string())));
                return;
            }
        };

        let have_local = !inner.emptiness.is_empty(&local_snapshot);
        if have_local {
            let mut session = inner.session.lock().await;
            session.working = local_snapshot.clone();
            inner.emit(StatusEvent::loading(Some(local_snapshot.clone())));
            if inner.freshness.is_fresh(&local_snapshot) {
                inner.emit(StatusEvent::idle(Some(local_snapshot)));
                remote_read.abort();
                return;
            }
        }

        let remote_result = match remote_read.await {
            Ok(result) => result,
            Err(e) => {
                // Join failure (panic or external abort) degrades to a
                // remote read failure.
                inner.emit(StatusEvent::error(
                    have_local.then(|| local_snapshot.clone()),
                    SyncFailure::RemoteRead(e.to_string()),
                ));
                return;
            }
        };

        match remote_result {
            Ok(tasks) => inner.adopt_remote_snapshot(tasks).await,
            Err(e) => {
                tracing::warn!(error = %e, "remote read failed");
                inner.emit(StatusEvent::error(
                    have_local.then_some(local_snapshot),
                    SyncFailure::RemoteRead(e.to_string()),
                ));
            }
        }
    }

    /// Converts and adopts a remote snapshot: persist, update the working
    /// set, then emit a loading/idle pair (or a bare idle when empty).
    async fn adopt_remote_snapshot(&self, tasks: Vec<Task>) {
        let now = self.clock.now();
        let mut session = self.session.lock().await;
        let converted = merge::from_remote(&session.working, &tasks, now);

        if let Err(e) = self.local.save_all(&converted).await {
            tracing::warn!(error = %e, "failed to persist remote snapshot");
        }

        session.working = converted.clone();
        session.last_remote = Some(converted.clone());

        match self.data_or_none(&converted) {
            Some(data) => {
                self.emit(StatusEvent::loading(Some(data.clone())));
                self.emit(StatusEvent::idle(Some(data)));
            }
            None => self.emit(StatusEvent::idle(None)),
        }
    }

    /// The mutation path: stale-action guard, optimistic `Ahead` write,
    /// remote confirmation folding back `InSync` or `SyncError`.
    async fn mutate(&self, task: Task, transform: impl FnOnce(&Task) -> Task) {
        let now = self.clock.now();
        let optimistic = {
            let mut session = self.session.lock().await;
            if let Some(existing) = session.working.get(&task.id) {
                if existing.version() > now {
                    tracing::debug!(
                        task_id = %task.id,
                        version = %existing.version(),
                        now = %now,
                        "stale action suppressed"
                    );
                    return;
                }
            }
            let record = SyncedRecord::new(transform(&task), SyncState::Ahead, now);
            session.working = session.working.save(record.clone());
            self.emit(StatusEvent::idle(Some(session.working.clone())));
            record
        };

        match self.remote.save_task(optimistic.data()).await {
            Ok(saved) => {
                let confirmed = SyncedRecord::new(saved, SyncState::InSync, now);
                self.fold_confirmation(confirmed, now).await;
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "remote write failed");
                self.fold_confirmation(optimistic.with_state(SyncState::SyncError), now)
                    .await;
            }
        }
    }

    /// Folds a mutation outcome into the working set, unless a newer write
    /// for the same id landed while the remote call was in flight. A
    /// superseded confirmation is neither folded nor persisted, so a slow
    /// remote ack cannot overwrite the newer record in the cache.
    async fn fold_confirmation(&self, record: SyncedRecord, issued_at: Timestamp) {
        let mut session = self.session.lock().await;
        if session
            .working
            .get(record.task_id())
            .is_some_and(|existing| existing.version() > issued_at)
        {
            tracing::debug!(task_id = %record.task_id(), "confirmation superseded, discarding");
            return;
        }
        if record.state() == SyncState::InSync {
            if let Err(e) = self.local.save_record(&record).await {
                tracing::warn!(task_id = %record.task_id(), error = %e, "failed to persist confirmed record");
            }
        }
        session.working = session.working.save(record);
        self.emit(StatusEvent::idle(Some(session.working.clone())));
    }

    /// The refresh path, with change suppression against the last
    /// remote-derived snapshot.
    async fn refresh(&self) {
        {
            let session = self.session.lock().await;
            self.emit(StatusEvent::loading(self.data_or_none(&session.working)));
        }

        match self.remote.load().await {
            Ok(tasks) => {
                let now = self.clock.now();
                let mut session = self.session.lock().await;
                let converted = merge::from_remote(&session.working, &tasks, now);

                let unchanged = session
                    .last_remote
                    .as_ref()
                    .is_some_and(|previous| merge::value_equal(previous, &converted));
                if unchanged {
                    let data = self.data_or_none(&session.working);
                    self.emit(StatusEvent::idle(data));
                    return;
                }

                session.working = converted.clone();
                session.last_remote = Some(converted.clone());
                let data = self.data_or_none(&converted);
                self.emit(StatusEvent::loading(data.clone()));
                self.emit(StatusEvent::idle(data));

                if let Err(e) = self.local.save_all(&converted).await {
                    tracing::warn!(error = %e, "failed to persist refreshed snapshot");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed");
                let session = self.session.lock().await;
                self.emit(StatusEvent::error(
                    self.data_or_none(&session.working),
                    SyncFailure::RemoteRead(e.to_string()),
                ));
            }
        }
    }

    /// The bulk delete path: the whole set is one optimistic write —
    /// completed records become deletion intents, the rest go `Ahead` —
    /// then the remote's remaining list is adopted, or everything stamped
    /// in this pass degrades to `SyncError`.
    async fn clear_completed(&self) {
        let now = self.clock.now();
        {
            let mut session = self.session.lock().await;
            let marked = session.working.map(|record| {
                let state = if record.data().completed {
                    SyncState::DeletedLocally
                } else {
                    SyncState::Ahead
                };
                SyncedRecord::new(record.data().clone(), state, now)
            });
            session.working = marked.clone();
            self.emit(StatusEvent::loading(self.data_or_none(&marked)));
        }

        match self.remote.clear_completed().await {
            Ok(remaining) => {
                let mut session = self.session.lock().await;
                let converted = merge::from_remote(&session.working, &remaining, now);

                if let Err(e) = self.local.save_all(&converted).await {
                    tracing::warn!(error = %e, "failed to persist cleared snapshot");
                }

                session.working = converted.clone();
                session.last_remote = Some(converted.clone());
                let data = self.data_or_none(&converted);
                self.emit(StatusEvent::loading(data.clone()));
                self.emit(StatusEvent::idle(data));
            }
            Err(e) => {
                tracing::warn!(error = %e, "bulk clear failed");
                let mut session = self.session.lock().await;
                let failed = session.working.map(|record| {
                    if record.version() == now
                        && matches!(
                            record.state(),
                            SyncState::DeletedLocally | SyncState::Ahead
                        )
                    {
                        record.with_state(SyncState::SyncError)
                    } else {
                        record.clone()
                    }
                });
                session.working = failed.clone();
                self.emit(StatusEvent::error(
                    self.data_or_none(&failed),
                    SyncFailure::Sync(e.to_string()),
                ));
            }
        }
    }
}

//! Integration tests for the query path: local/remote reconciliation,
//! freshness, failure propagation, filtered projections, and replay.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use taskmirror::{
    Clock, EventStream, InMemoryLocalStore, InMemoryRemoteSource, ManualClock, StaticFreshness,
    SyncConfig, SyncEngine,
};
use taskmirror_model::{
    RecordSet, StatusEvent, SyncFailure, SyncState, SyncedRecord, Task, Timestamp, VisibleRecords,
};

const TEST_TIME: u64 = 123;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn build_engine(
    local: &InMemoryLocalStore,
    remote: &InMemoryRemoteSource,
    clock: &Arc<ManualClock>,
    fresh: bool,
) -> SyncEngine<InMemoryLocalStore, InMemoryRemoteSource> {
    let clock: Arc<dyn Clock> = Arc::clone(clock) as Arc<dyn Clock>;
    SyncEngine::with_collaborators(
        local.clone(),
        remote.clone(),
        clock,
        Arc::new(StaticFreshness(fresh)),
        Arc::new(VisibleRecords),
        SyncConfig::default(),
    )
}

async fn next_event(stream: &mut EventStream) -> StatusEvent {
    timeout(Duration::from_secs(1), stream.next())
        .await
        .expect("timed out waiting for event")
        .expect("stream closed")
}

async fn assert_no_event(stream: &mut EventStream) {
    assert!(
        timeout(Duration::from_millis(100), stream.next())
            .await
            .is_err(),
        "expected no further events"
    );
}

fn record(id: &str, title: &str, version: u64) -> SyncedRecord {
    SyncedRecord::new(
        Task::new(id, title),
        SyncState::InSync,
        Timestamp::from_millis(version),
    )
}

fn synced(tasks: Vec<Task>) -> RecordSet {
    RecordSet::as_synced(tasks, Timestamp::from_millis(TEST_TIME))
}

fn sample_remote_tasks() -> Vec<Task> {
    vec![Task::new("42", "Foo"), Task::new("24", "Bar")]
}

// ---------------------------------------------------------------------------
// Query path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fresh_local_snapshot_is_served_without_the_remote() {
    // Example scenario: local has {24: Bar}, marked fresh; remote unused.
    let local_set = RecordSet::from_records([record("24", "Bar", TEST_TIME)]);
    let local = InMemoryLocalStore::with_records(local_set.clone());
    let remote = InMemoryRemoteSource::with_tasks(sample_remote_tasks());
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, true);

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(local_set.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(local_set))
    );
    assert_no_event(&mut stream).await;

    // The remote write path was never touched.
    assert_eq!(local.save_all_calls(), 0);
    assert_eq!(remote.save_task_calls(), 0);
}

#[tokio::test]
async fn stale_local_snapshot_is_followed_by_the_remote() {
    let local_set = RecordSet::from_records([record("24", "Bar", 100)]);
    let local = InMemoryLocalStore::with_records(local_set.clone());
    let remote = InMemoryRemoteSource::with_tasks(sample_remote_tasks());
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    let expected = synced(sample_remote_tasks());

    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(local_set))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(expected.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(expected.clone()))
    );

    // The converted snapshot was persisted to the local store.
    assert_eq!(local.save_all_calls(), 1);
    assert_eq!(local.records(), expected);
}

#[tokio::test]
async fn empty_local_is_filled_from_the_remote() {
    let local = InMemoryLocalStore::new();
    let remote = InMemoryRemoteSource::with_tasks(sample_remote_tasks());
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    let expected = synced(sample_remote_tasks());

    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(expected.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(expected))
    );
}

#[tokio::test]
async fn empty_local_and_empty_remote_settle_on_empty() {
    let local = InMemoryLocalStore::new();
    let remote = InMemoryRemoteSource::new();
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(next_event(&mut stream).await, StatusEvent::idle(None));
    assert_no_event(&mut stream).await;
}

// ---------------------------------------------------------------------------
// Failure propagation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn local_read_failure_is_fatal_even_when_remote_has_data() {
    let local = InMemoryLocalStore::new();
    local.set_load_error(Some("disk on fire"));
    let remote = InMemoryRemoteSource::with_tasks(sample_remote_tasks());
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    let event = next_event(&mut stream).await;
    assert!(event.is_error());
    assert!(event.data().is_none());
    assert!(matches!(event.cause(), Some(SyncFailure::LocalRead(_))));
    assert_no_event(&mut stream).await;
}

#[tokio::test]
async fn remote_read_failure_without_local_data_is_a_dataless_error() {
    let local = InMemoryLocalStore::new();
    let remote = InMemoryRemoteSource::new();
    remote.set_load_error(Some("offline"));
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    let event = next_event(&mut stream).await;
    assert!(event.is_error());
    assert!(event.data().is_none());
    assert!(matches!(event.cause(), Some(SyncFailure::RemoteRead(_))));
}

#[tokio::test]
async fn remote_read_failure_keeps_the_best_known_local_data() {
    let local_set = RecordSet::from_records([record("24", "Bar", 100)]);
    let local = InMemoryLocalStore::with_records(local_set.clone());
    let remote = InMemoryRemoteSource::new();
    remote.set_load_error(Some("offline"));
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, false);

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(local_set.clone()))
    );
    let event = next_event(&mut stream).await;
    assert!(event.is_error());
    assert_eq!(event.data(), Some(&local_set));
    assert!(matches!(event.cause(), Some(SyncFailure::RemoteRead(_))));
}

// ---------------------------------------------------------------------------
// Filtered projections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn active_view_of_all_completed_tasks_reports_empty() {
    let local_set = RecordSet::from_records([SyncedRecord::new(
        Task::new("42", "Foo").complete(),
        SyncState::InSync,
        Timestamp::from_millis(TEST_TIME),
    )]);
    let local = InMemoryLocalStore::with_records(local_set);
    let remote = InMemoryRemoteSource::new();
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, true);

    let mut stream = engine.active_events();
    // The loading/idle pair survives filtering, with data absent.
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(next_event(&mut stream).await, StatusEvent::idle(None));
}

#[tokio::test]
async fn completed_view_filters_out_active_tasks() {
    let completed = Task::new("42", "Foo").complete();
    let local_set = RecordSet::from_records([
        SyncedRecord::new(
            completed.clone(),
            SyncState::InSync,
            Timestamp::from_millis(TEST_TIME),
        ),
        record("24", "Bar", TEST_TIME),
    ]);
    let local = InMemoryLocalStore::with_records(local_set);
    let remote = InMemoryRemoteSource::new();
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, true);

    let expected = RecordSet::from_records([SyncedRecord::new(
        completed,
        SyncState::InSync,
        Timestamp::from_millis(TEST_TIME),
    )]);

    let mut stream = engine.completed_events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(expected.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(expected))
    );
}

// ---------------------------------------------------------------------------
// Configuration edges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_event_buffer_is_clamped_so_subscribing_works() {
    let local = InMemoryLocalStore::new();
    let remote = InMemoryRemoteSource::new();
    let clock = ManualClock::at(TEST_TIME);
    let engine = SyncEngine::with_collaborators(
        local,
        remote,
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(StaticFreshness(false)),
        Arc::new(VisibleRecords),
        SyncConfig {
            event_buffer: 0,
            ..SyncConfig::default()
        },
    );

    let mut stream = engine.events();
    assert_eq!(next_event(&mut stream).await, StatusEvent::loading(None));
}

// ---------------------------------------------------------------------------
// Replay for late subscribers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn late_subscriber_replays_the_last_event_without_reloading() {
    let local_set = RecordSet::from_records([record("24", "Bar", TEST_TIME)]);
    let local = InMemoryLocalStore::with_records(local_set.clone());
    let remote = InMemoryRemoteSource::new();
    let clock = ManualClock::at(TEST_TIME);
    let engine = build_engine(&local, &remote, &clock, true);

    let mut first = engine.events();
    for _ in 0..3 {
        next_event(&mut first).await;
    }

    // The second subscription starts from the settled state, not a fresh
    // loading sequence.
    let mut second = engine.events();
    assert_eq!(
        next_event(&mut second).await,
        StatusEvent::idle(Some(local_set))
    );
    assert_no_event(&mut second).await;
}

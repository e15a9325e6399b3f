//! Integration tests for refresh: re-fetching from the remote source and
//! suppressing the update when nothing actually changed.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use taskmirror::{
    Clock, EventStream, InMemoryLocalStore, InMemoryRemoteSource, ManualClock, StaticFreshness,
    SyncConfig, SyncEngine,
};
use taskmirror_model::{RecordSet, StatusEvent, SyncFailure, Task, Timestamp, VisibleRecords};

const TEST_TIME: u64 = 123;
const REFRESH_TIME: u64 = 321;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

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

fn sample_tasks() -> Vec<Task> {
    vec![Task::new("42", "Foo"), Task::new("24", "Bar")]
}

fn synced(tasks: Vec<Task>, millis: u64) -> RecordSet {
    RecordSet::as_synced(tasks, Timestamp::from_millis(millis))
}

/// Builds an engine over an empty local store so the session adopts the
/// remote snapshot, and drains the settling sequence.
async fn settled_engine(
    tasks: Vec<Task>,
) -> (
    SyncEngine<InMemoryLocalStore, InMemoryRemoteSource>,
    EventStream,
    InMemoryLocalStore,
    InMemoryRemoteSource,
    Arc<ManualClock>,
) {
    let local = InMemoryLocalStore::new();
    let remote = InMemoryRemoteSource::with_tasks(tasks.clone());
    let clock = ManualClock::at(TEST_TIME);
    let engine = SyncEngine::with_collaborators(
        local.clone(),
        remote.clone(),
        Arc::clone(&clock) as Arc<dyn Clock>,
        Arc::new(StaticFreshness(false)),
        Arc::new(VisibleRecords),
        SyncConfig::default(),
    );

    let mut stream = engine.events();
    next_event(&mut stream).await; // loading, no data
    if !tasks.is_empty() {
        next_event(&mut stream).await; // loading with the adopted snapshot
    }
    next_event(&mut stream).await; // idle
    (engine, stream, local, remote, clock)
}

// ---------------------------------------------------------------------------
// Refresh
// ---------------------------------------------------------------------------

#[tokio::test]
async fn changed_remote_data_is_adopted_and_persisted() {
    let (engine, mut stream, local, remote, clock) = settled_engine(sample_tasks()).await;
    let old = synced(sample_tasks(), TEST_TIME);

    let mut updated = sample_tasks();
    updated.push(Task::new("424", "New"));
    remote.set_tasks(updated.clone());
    clock.set(REFRESH_TIME);
    engine.refresh().await;

    let expected = synced(updated, REFRESH_TIME);
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(old))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(expected.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(expected.clone()))
    );

    // Initial adoption plus the refresh.
    assert_eq!(local.save_all_calls(), 2);
    assert_eq!(local.records(), expected);
}

#[tokio::test]
async fn unchanged_remote_data_settles_without_an_update() {
    let (engine, mut stream, local, _remote, _clock) = settled_engine(sample_tasks()).await;
    let snapshot = synced(sample_tasks(), TEST_TIME);

    engine.refresh().await;

    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(snapshot.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(snapshot))
    );
    assert_no_event(&mut stream).await;

    // No second persistence pass for an unchanged snapshot.
    assert_eq!(local.save_all_calls(), 1);
}

#[tokio::test]
async fn suppression_compares_values_not_version_stamps() {
    let (engine, mut stream, _local, _remote, clock) = settled_engine(sample_tasks()).await;
    let snapshot = synced(sample_tasks(), TEST_TIME);

    // Same remote data at a later clock reading: still suppressed.
    clock.set(REFRESH_TIME);
    engine.refresh().await;

    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(snapshot.clone()))
    );
    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::idle(Some(snapshot))
    );
    assert_no_event(&mut stream).await;
}

#[tokio::test]
async fn failed_refresh_reports_an_error_with_the_working_data() {
    let (engine, mut stream, _local, remote, _clock) = settled_engine(sample_tasks()).await;
    let snapshot = synced(sample_tasks(), TEST_TIME);

    remote.set_load_error(Some("offline"));
    engine.refresh().await;

    assert_eq!(
        next_event(&mut stream).await,
        StatusEvent::loading(Some(snapshot.clone()))
    );
    let event = next_event(&mut stream).await;
    assert!(event.is_error());
    assert_eq!(event.data(), Some(&snapshot));
    assert!(matches!(event.cause(), Some(SyncFailure::RemoteRead(_))));
    assert_no_event(&mut stream).await;
}

#[tokio::test]
async fn refresh_of_an_empty_session_adopts_new_remote_data() {
    let (engine, mut stream, _local, remote, clock) = settled_engine(Vec::new()).await;

    remote.set_tasks(sample_tasks());
    clock.set(REFRESH_TIME);
    engine.refresh().await;

    let expected = synced(sample_tasks(), REFRESH_TIME);
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

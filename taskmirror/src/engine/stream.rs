//! Query projections and the subscriber-facing event stream.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::sync::mpsc;

use taskmirror_model::{EmptinessPolicy, RecordSet, StatusEvent, SyncState};

/// Which slice of the reconciled task list a query observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryFilter {
    /// Every record.
    #[default]
    All,
    /// Records whose task is not completed.
    Active,
    /// Records whose task is completed.
    Completed,
}

impl QueryFilter {
    /// Applies the projection to a snapshot. `All` additionally excludes
    /// nothing; deletions pending locally are handled by the emptiness
    /// policy, not here.
    #[must_use]
    pub fn project(self, records: &RecordSet) -> RecordSet {
        match self {
            Self::All => records.clone(),
            Self::Active => records.filter(|record| {
                !record.data().completed && record.state() != SyncState::DeletedLocally
            }),
            Self::Completed => records.filter(|record| {
                record.data().completed && record.state() != SyncState::DeletedLocally
            }),
        }
    }
}

/// A never-terminating stream of [`StatusEvent`]s for one query.
///
/// Each event's snapshot is projected through the query's filter and checked
/// against the emptiness policy: a projection that comes out empty is
/// presented with absent data, but the event itself is still delivered so
/// loading/idle pairs survive filtering.
pub struct EventStream {
    rx: mpsc::Receiver<StatusEvent>,
    filter: QueryFilter,
    emptiness: Arc<dyn EmptinessPolicy>,
}

impl EventStream {
    pub(crate) fn new(
        rx: mpsc::Receiver<StatusEvent>,
        filter: QueryFilter,
        emptiness: Arc<dyn EmptinessPolicy>,
    ) -> Self {
        Self {
            rx,
            filter,
            emptiness,
        }
    }

    /// Receives the next event.
    ///
    /// Returns `None` only after the engine has been dropped; an open query
    /// stream never completes on its own.
    pub async fn next(&mut self) -> Option<StatusEvent> {
        let event = self.rx.recv().await?;
        Some(project(self.filter, &self.emptiness, event))
    }
}

fn project(
    filter: QueryFilter,
    emptiness: &Arc<dyn EmptinessPolicy>,
    event: StatusEvent,
) -> StatusEvent {
    event.map_data(|records| {
        let projected = filter.project(&records);
        if emptiness.is_empty(&projected) {
            None
        } else {
            Some(projected)
        }
    })
}

impl futures_util::Stream for EventStream {
    type Item = StatusEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                Poll::Ready(Some(project(self.filter, &self.emptiness, event)))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

//! The tri-state status event envelope emitted by query streams.

use thiserror::Error;

use crate::set::RecordSet;

/// Why a sync step failed, carried by [`StatusEvent::Error`].
///
/// Causes hold display strings rather than source errors so events stay
/// cheaply cloneable across subscriber channels.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncFailure {
    /// The local store read failed. Fatal to the query: no later remote
    /// success recovers it.
    #[error("local read failed: {0}")]
    LocalRead(String),

    /// The remote read failed. Degrades to an error carrying the best-known
    /// local data when any exists.
    #[error("remote read failed: {0}")]
    RemoteRead(String),

    /// A remote write of a single task failed. The affected record degrades
    /// to `SyncError`; the stream keeps flowing.
    #[error("remote write failed: {0}")]
    RemoteWrite(String),

    /// The remote bulk clear failed; the event carries the partially-applied
    /// working set.
    #[error("sync failed: {0}")]
    Sync(String),
}

/// Loading / idle / error envelope over an optional record set snapshot.
///
/// `data` may be absent (nothing known yet) or present — possibly from a
/// previous snapshot, enabling stale-but-present UI states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    /// A load or refresh is in flight.
    Loading {
        /// Best-known snapshot, if any.
        data: Option<RecordSet>,
    },
    /// No operation in flight; `data` is the settled snapshot.
    Idle {
        /// Best-known snapshot, if any.
        data: Option<RecordSet>,
    },
    /// Something failed; `data` is still the best-known snapshot.
    Error {
        /// Best-known snapshot, if any.
        data: Option<RecordSet>,
        /// What failed.
        cause: SyncFailure,
    },
}

impl StatusEvent {
    /// A loading event with an optional snapshot.
    #[must_use]
    pub const fn loading(data: Option<RecordSet>) -> Self {
        Self::Loading { data }
    }

    /// An idle event with an optional snapshot.
    #[must_use]
    pub const fn idle(data: Option<RecordSet>) -> Self {
        Self::Idle { data }
    }

    /// An error event carrying the best-known snapshot and its cause.
    #[must_use]
    pub const fn error(data: Option<RecordSet>, cause: SyncFailure) -> Self {
        Self::Error { data, cause }
    }

    /// The snapshot carried by this event, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&RecordSet> {
        match self {
            Self::Loading { data } | Self::Idle { data } | Self::Error { data, .. } => data.as_ref(),
        }
    }

    /// The failure cause, for error events.
    #[must_use]
    pub const fn cause(&self) -> Option<&SyncFailure> {
        match self {
            Self::Error { cause, .. } => Some(cause),
            _ => None,
        }
    }

    /// Whether this is a loading event.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading { .. })
    }

    /// Whether this is an idle event.
    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self, Self::Idle { .. })
    }

    /// Whether this is an error event.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Transforms the carried snapshot while preserving the event kind.
    /// The transform may drop the snapshot entirely (e.g. when a filtered
    /// projection comes out empty).
    #[must_use]
    pub fn map_data(self, transform: impl FnOnce(RecordSet) -> Option<RecordSet>) -> Self {
        match self {
            Self::Loading { data } => Self::Loading {
                data: data.and_then(transform),
            },
            Self::Idle { data } => Self::Idle {
                data: data.and_then(transform),
            },
            Self::Error { data, cause } => Self::Error {
                data: data.and_then(transform),
                cause,
            },
        }
    }
}

//! Freshness policies deciding whether a cached snapshot can be served
//! without a remote refetch.

use std::sync::Arc;
use std::time::Duration;

use taskmirror_model::{RecordSet, SyncedRecord};

use crate::clock::Clock;

/// Decides whether a versioned snapshot is still usable without refetching.
pub trait FreshnessPolicy: Send + Sync {
    /// Returns `true` if the snapshot can be served as-is.
    fn is_fresh(&self, records: &RecordSet) -> bool;
}

/// Fresh iff the set's oldest version is within `max_age` of the clock's
/// current reading. An empty set is never fresh.
pub struct MaxAgeFreshness {
    max_age: Duration,
    clock: Arc<dyn Clock>,
}

impl MaxAgeFreshness {
    /// Creates a policy with the given age threshold and clock.
    #[must_use]
    pub fn new(max_age: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { max_age, clock }
    }
}

impl FreshnessPolicy for MaxAgeFreshness {
    fn is_fresh(&self, records: &RecordSet) -> bool {
        let Some(oldest) = records.iter().map(SyncedRecord::version).min() else {
            return false;
        };
        let age = self.clock.now().millis_since(oldest);
        u128::from(age) <= self.max_age.as_millis()
    }
}

/// Constant-answer policy, mainly for harnesses that pin the query path.
#[derive(Debug, Clone, Copy)]
pub struct StaticFreshness(pub bool);

impl FreshnessPolicy for StaticFreshness {
    fn is_fresh(&self, _records: &RecordSet) -> bool {
        self.0
    }
}

//! Single-slot cache for the last successfully parsed upstream payload.
//!
//! The slot holds an `Arc<CachedSnapshot>` that is swapped whole on every
//! successful refresh, so readers never observe a half-written record. An
//! expired entry is never evicted: TTL only decides whether it may be served
//! as a first choice or only as a fallback after a failed refresh.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;

use super::payload::RawMonitorPayload;

#[derive(Debug, Clone)]
pub struct CachedSnapshot {
    pub data: Arc<RawMonitorPayload>,
    pub fetched_at: Instant,
    pub fetched_at_utc: DateTime<Utc>,
    pub ttl: Duration,
}

impl CachedSnapshot {
    pub fn age(&self) -> Duration {
        self.fetched_at.elapsed()
    }

    pub fn is_fresh(&self) -> bool {
        self.age() < self.ttl
    }
}

#[derive(Debug)]
pub struct MonitorCache {
    slot: RwLock<Option<Arc<CachedSnapshot>>>,
    ttl: Duration,
}

impl MonitorCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            slot: RwLock::new(None),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current entry, fresh or stale.
    pub fn get(&self) -> Option<Arc<CachedSnapshot>> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the slot with a freshly timestamped entry and returns it.
    pub fn put(&self, data: RawMonitorPayload) -> Arc<CachedSnapshot> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        let fetched_at = match slot.as_ref() {
            Some(previous) if previous.fetched_at > now => previous.fetched_at,
            _ => now,
        };
        let entry = Arc::new(CachedSnapshot {
            data: Arc::new(data),
            fetched_at,
            fetched_at_utc: Utc::now(),
            ttl: self.ttl,
        });
        *slot = Some(entry.clone());
        entry
    }

    pub fn is_fresh(&self) -> bool {
        self.get().is_some_and(|entry| entry.is_fresh())
    }
}

//! Status resolution: cache lookup, lazy upstream refresh, stale fallback
//! and classification.
//!
//! Concurrent resolutions that find the cache stale share a single refresh.
//! The refresh runs in its own task so a caller that goes away does not
//! cancel it; whatever it fetches still lands in the cache for the next
//! request.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::cache::{CachedSnapshot, MonitorCache};
use super::classify::{Classification, StatusKind, classify};
use super::error::{FetchError, ResolveError};
use super::fetcher::StatusFetcher;
use crate::metrics::MetricsSink;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_millis(15_000);

type RefreshFuture = Shared<BoxFuture<'static, Result<Arc<CachedSnapshot>, FetchError>>>;

/// Where the data behind a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSource {
    /// Served from a cache entry still within its TTL.
    Cache,
    /// Fetched from upstream during this request.
    Upstream,
    /// Upstream refresh failed; an expired cache entry was served instead.
    Stale,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Cache => "cache",
            SnapshotSource::Upstream => "upstream",
            SnapshotSource::Stale => "stale",
        }
    }
}

/// Normalized status for one request. Regenerated per request so that
/// `timestamp` and `response_time` describe the request, not the cache write.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub status: StatusKind,
    pub status_text: String,
    pub timestamp: DateTime<Utc>,
    pub response_time: Duration,
    pub monitor_count: u64,
    pub uptime_percentage: Option<f64>,
    pub source: SnapshotSource,
    pub entry: Arc<CachedSnapshot>,
}

impl StatusSnapshot {
    fn from_entry(entry: Arc<CachedSnapshot>, source: SnapshotSource, started: Instant) -> Self {
        let Classification {
            kind,
            status_text,
            monitor_count,
            uptime_percentage,
        } = classify(&entry.data);
        Self {
            status: kind,
            status_text,
            timestamp: Utc::now(),
            response_time: started.elapsed(),
            monitor_count,
            uptime_percentage,
            source,
            entry,
        }
    }

    pub fn is_green(&self) -> bool {
        self.status.is_green()
    }

    pub fn is_degraded(&self) -> bool {
        self.status.is_degraded()
    }

    pub fn is_outage(&self) -> bool {
        self.status.is_outage()
    }

    pub fn is_maintenance(&self) -> bool {
        self.status.is_maintenance()
    }

    pub fn cache_hit(&self) -> bool {
        self.source == SnapshotSource::Cache
    }
}

/// Upstream collaborators shared with the spawned refresh task.
struct Upstream {
    fetcher: Arc<dyn StatusFetcher>,
    cache: MonitorCache,
    metrics: Arc<dyn MetricsSink>,
    url: String,
    timeout: Duration,
}

impl Upstream {
    async fn refresh(&self) -> Result<Arc<CachedSnapshot>, FetchError> {
        info!(url = %self.url, "Fetching monitor status from upstream.");
        let started = Instant::now();
        let result = self.fetcher.fetch(&self.url, self.timeout).await;
        let elapsed = started.elapsed();
        self.metrics.record_fetch_duration(elapsed);

        match result {
            Ok(payload) => {
                self.metrics.set_operational(true);
                debug!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    stat = ?payload.stat,
                    "Upstream fetch succeeded."
                );
                Ok(self.cache.put(payload))
            }
            Err(e) => {
                self.metrics.set_operational(false);
                self.metrics.record_upstream_error();
                warn!(
                    error = %e,
                    kind = e.kind(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Upstream fetch failed."
                );
                Err(e)
            }
        }
    }
}

/// Empties the in-flight slot when the refresh task ends, panics included.
struct ClearInFlight(Arc<Mutex<Option<RefreshFuture>>>);

impl Drop for ClearInFlight {
    fn drop(&mut self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

pub struct StatusResolver {
    upstream: Arc<Upstream>,
    in_flight: Arc<Mutex<Option<RefreshFuture>>>,
}

impl StatusResolver {
    pub fn new(
        fetcher: Arc<dyn StatusFetcher>,
        metrics: Arc<dyn MetricsSink>,
        url: impl Into<String>,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            upstream: Arc::new(Upstream {
                fetcher,
                cache: MonitorCache::new(ttl),
                metrics,
                url: url.into(),
                timeout,
            }),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn upstream_url(&self) -> &str {
        &self.upstream.url
    }

    pub fn cache(&self) -> &MonitorCache {
        &self.upstream.cache
    }

    pub async fn resolve(&self) -> Result<StatusSnapshot, ResolveError> {
        let started = Instant::now();

        if let Some(entry) = self.upstream.cache.get().filter(|entry| entry.is_fresh()) {
            self.upstream.metrics.record_cache_hit();
            debug!(age_ms = entry.age().as_millis() as u64, "Returning cached monitor status.");
            return Ok(StatusSnapshot::from_entry(entry, SnapshotSource::Cache, started));
        }

        self.upstream.metrics.record_cache_miss();
        match self.refresh().await {
            Ok(entry) => Ok(StatusSnapshot::from_entry(entry, SnapshotSource::Upstream, started)),
            Err(e) => match self.upstream.cache.get() {
                Some(entry) => {
                    warn!(
                        error = %e,
                        age_ms = entry.age().as_millis() as u64,
                        "Using expired cache due to upstream error."
                    );
                    Ok(StatusSnapshot::from_entry(entry, SnapshotSource::Stale, started))
                }
                None => Err(ResolveError::Unavailable(e)),
            },
        }
    }

    /// Joins the refresh already in flight, or starts one.
    fn refresh(&self) -> RefreshFuture {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pending) = slot.as_ref() {
            debug!("Joining in-flight upstream refresh.");
            return pending.clone();
        }

        let upstream = self.upstream.clone();
        let in_flight = self.in_flight.clone();
        // The slot lock is held until the shared future is stored, so the
        // task cannot clear the slot before it is filled.
        let handle = tokio::spawn(async move {
            let _clear = ClearInFlight(in_flight);
            upstream.refresh().await
        });

        let shared = async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => Err(FetchError::Aborted(e.to_string())),
            }
        }
        .boxed()
        .shared();
        *slot = Some(shared.clone());
        shared
    }
}

//! The status-resolution pipeline: fetch with timeout, parse, cache with
//! stale fallback, classify.

pub mod cache;
pub mod classify;
pub mod error;
pub mod fetcher;
pub mod payload;
pub mod resolver;

pub use cache::{CachedSnapshot, MonitorCache};
pub use classify::{Classification, StatusKind, classify};
pub use error::{FetchError, ResolveError};
pub use fetcher::{HttpFetcher, StatusFetcher};
pub use payload::RawMonitorPayload;
pub use resolver::{SnapshotSource, StatusResolver, StatusSnapshot};

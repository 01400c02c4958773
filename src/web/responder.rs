//! Maps resolved snapshots (or resolution failures) onto the JSON contract
//! served to badges and the embedded widget.
//!
//! Every outcome is answered with HTTP 200 and a schema-conformant body; a
//! failure is expressed through `status: "error"` rather than the status
//! code so that consumers reading only JSON fields never see a hard error.

use axum::{
    Json,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::time::Duration;

use crate::status::payload::Statistics;
use crate::status::{ResolveError, StatusKind, StatusSnapshot};

pub const STATUS_CACHE_CONTROL: &str =
    "public, max-age=60, s-maxage=300, stale-while-revalidate=300";
/// Failures must not be pinned in edge caches.
pub const ERROR_CACHE_CONTROL: &str = "no-cache";
pub const ERROR_STATUS_TEXT: &str = "Unable to fetch status";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusBody {
    pub status: StatusKind,
    pub is_green: bool,
    pub is_degraded: bool,
    pub is_outage: bool,
    pub is_maintenance: bool,
    pub status_text: String,
    pub timestamp: String,
    pub response_time: String,
    pub monitors: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_percentage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<DebugInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub stats: Option<Statistics>,
    pub monitors: usize,
    pub uptime_percentage: Option<f64>,
    pub cache_hit: bool,
    pub source: &'static str,
    pub cache_age_ms: u64,
    pub fetched_at: String,
}

fn iso8601(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn format_response_time(elapsed: Duration) -> String {
    format!("{:.2}ms", elapsed.as_secs_f64() * 1000.0)
}

impl StatusBody {
    pub fn from_snapshot(snapshot: &StatusSnapshot, include_debug: bool) -> Self {
        let debug = include_debug.then(|| DebugInfo {
            stats: snapshot.entry.data.statistics.clone(),
            monitors: snapshot.entry.data.listed_monitors(),
            uptime_percentage: snapshot.uptime_percentage,
            cache_hit: snapshot.cache_hit(),
            source: snapshot.source.as_str(),
            cache_age_ms: snapshot.entry.age().as_millis() as u64,
            fetched_at: iso8601(snapshot.entry.fetched_at_utc),
        });

        Self {
            status: snapshot.status,
            is_green: snapshot.is_green(),
            is_degraded: snapshot.is_degraded(),
            is_outage: snapshot.is_outage(),
            is_maintenance: snapshot.is_maintenance(),
            status_text: snapshot.status_text.clone(),
            timestamp: iso8601(snapshot.timestamp),
            response_time: format_response_time(snapshot.response_time),
            monitors: snapshot.monitor_count,
            uptime_percentage: snapshot.uptime_percentage,
            error: None,
            debug,
        }
    }

    pub fn from_error(err: &ResolveError, elapsed: Duration) -> Self {
        let status = StatusKind::Error;
        Self {
            status,
            is_green: status.is_green(),
            is_degraded: status.is_degraded(),
            is_outage: status.is_outage(),
            is_maintenance: status.is_maintenance(),
            status_text: ERROR_STATUS_TEXT.to_string(),
            timestamp: iso8601(Utc::now()),
            response_time: format_response_time(elapsed),
            monitors: 0,
            uptime_percentage: None,
            error: Some(err.to_string()),
            debug: None,
        }
    }
}

const NOSNIFF: (HeaderName, &str) = (header::X_CONTENT_TYPE_OPTIONS, "nosniff");

pub fn status_response(
    result: &Result<StatusSnapshot, ResolveError>,
    elapsed: Duration,
    include_debug: bool,
) -> Response {
    match result {
        Ok(snapshot) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, STATUS_CACHE_CONTROL), NOSNIFF],
            Json(StatusBody::from_snapshot(snapshot, include_debug)),
        )
            .into_response(),
        Err(err) => (
            StatusCode::OK,
            [(header::CACHE_CONTROL, ERROR_CACHE_CONTROL), NOSNIFF],
            Json(StatusBody::from_error(err, elapsed)),
        )
            .into_response(),
    }
}

use axum::{
    Json, Router,
    extract::State,
    http::{Method, header},
    routing::get,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::sync::Arc;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use crate::version::VERSION;
use crate::web::AppState;

#[derive(Serialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_memory: u64,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub uptime: f64,
    pub version: &'static str,
    pub platform: &'static str,
    pub arch: &'static str,
    pub memory_usage: MemoryUsage,
    /// Human-readable copy of `memory_usage`.
    pub memory: MemoryReadable,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReadable {
    pub rss: String,
    pub virtual_memory: String,
}

#[derive(Serialize, Debug)]
pub struct VersionResponse {
    pub version: &'static str,
    pub timestamp: String,
    pub message: &'static str,
}

fn megabytes(bytes: u64) -> String {
    format!("{} MB", (bytes as f64 / 1024.0 / 1024.0).round() as u64)
}

fn process_memory() -> MemoryUsage {
    let pid = match sysinfo::get_current_pid() {
        Ok(pid) => pid,
        Err(e) => {
            warn!(error = e, "Could not determine own pid for memory stats.");
            return MemoryUsage::default();
        }
    };

    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_memory(),
    );
    sys.process(pid)
        .map(|process| MemoryUsage {
            rss: process.memory(),
            virtual_memory: process.virtual_memory(),
        })
        .unwrap_or_default()
}

async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let memory_usage = process_memory();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        uptime: app_state.started_at.elapsed().as_secs_f64(),
        version: VERSION,
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
        memory: MemoryReadable {
            rss: megabytes(memory_usage.rss),
            virtual_memory: megabytes(memory_usage.virtual_memory),
        },
        memory_usage,
    })
}

async fn version_handler() -> Json<VersionResponse> {
    let response = VersionResponse {
        version: VERSION,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        message: "Server is running",
    };
    debug!(version = VERSION, "Version endpoint hit.");
    Json(response)
}

/// Liveness probe. Never touches the monitor cache.
pub fn health_router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_handler))
}

pub fn version_router() -> Router<Arc<AppState>> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    Router::new().route("/api/version", get(version_handler).layer(cors))
}

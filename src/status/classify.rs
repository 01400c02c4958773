use serde::Serialize;
use std::fmt;

use super::payload::RawMonitorPayload;

/// Overall status exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Operational,
    Degraded,
    Outage,
    Maintenance,
    Unknown,
    Error,
}

impl StatusKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusKind::Operational => "operational",
            StatusKind::Degraded => "degraded",
            StatusKind::Outage => "outage",
            StatusKind::Maintenance => "maintenance",
            StatusKind::Unknown => "unknown",
            StatusKind::Error => "error",
        }
    }

    pub fn is_green(&self) -> bool {
        matches!(self, StatusKind::Operational)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, StatusKind::Degraded)
    }

    /// `Error` also reports as an outage.
    pub fn is_outage(&self) -> bool {
        matches!(self, StatusKind::Outage | StatusKind::Error)
    }

    pub fn is_maintenance(&self) -> bool {
        matches!(self, StatusKind::Maintenance)
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one provider payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub kind: StatusKind,
    pub status_text: String,
    pub monitor_count: u64,
    pub uptime_percentage: Option<f64>,
}

fn services(n: u64) -> &'static str {
    if n == 1 { "service" } else { "services" }
}

/// Classifies a payload. Branches are checked in priority order and the
/// first match wins: down, warning, up, paused.
pub fn classify(payload: &RawMonitorPayload) -> Classification {
    let counts = payload.counts();

    let (kind, mut status_text) = if counts.down > 0 {
        (
            StatusKind::Outage,
            format!("{} {} down", counts.down, services(counts.down)),
        )
    } else if counts.warning > 0 {
        (
            StatusKind::Degraded,
            format!("{} {} with issues", counts.warning, services(counts.warning)),
        )
    } else if counts.up > 0 {
        (StatusKind::Operational, "All services operational".to_string())
    } else if counts.paused > 0 {
        (StatusKind::Maintenance, "Services under maintenance".to_string())
    } else {
        (StatusKind::Unknown, "Status unknown".to_string())
    };

    let uptime_percentage = payload.uptime_ratio();
    if let Some(ratio) = uptime_percentage {
        status_text.push_str(&format!(" ({ratio:.2}% uptime)"));
    }

    // warning monitors are not part of the total
    let monitor_count = counts
        .up
        .saturating_add(counts.down)
        .saturating_add(counts.paused);

    Classification {
        kind,
        status_text,
        monitor_count,
        uptime_percentage,
    }
}

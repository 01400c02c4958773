//! Shape of the provider's `getMonitorList` response.
//!
//! The schema belongs to the provider, so every field is optional and
//! numeric fields accept either JSON numbers or numeric strings. Anything
//! else is treated as absent rather than failing the whole document.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMonitorPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub stat: Option<String>,
    #[serde(default)]
    pub statistics: Option<Statistics>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Option::is_none"
    )]
    pub monitors: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub counts: Option<MonitorCounts>,
    #[serde(default)]
    pub uptime: Option<UptimeWindows>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorCounts {
    #[serde(default, deserialize_with = "lenient_count")]
    pub up: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub down: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub warning: Option<u64>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub paused: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeWindows {
    #[serde(default)]
    pub l1: Option<UptimeWindow>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UptimeWindow {
    #[serde(default, deserialize_with = "lenient_ratio")]
    pub ratio: Option<f64>,
}

/// Monitor counts with absent values read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub up: u64,
    pub down: u64,
    pub warning: u64,
    pub paused: u64,
}

impl RawMonitorPayload {
    pub fn counts(&self) -> Counts {
        let raw = self
            .statistics
            .as_ref()
            .and_then(|s| s.counts)
            .unwrap_or_default();
        Counts {
            up: raw.up.unwrap_or(0),
            down: raw.down.unwrap_or(0),
            warning: raw.warning.unwrap_or(0),
            paused: raw.paused.unwrap_or(0),
        }
    }

    /// Uptime ratio of the shortest window (`l1`), as a percentage.
    pub fn uptime_ratio(&self) -> Option<f64> {
        self.statistics
            .as_ref()?
            .uptime
            .as_ref()?
            .l1
            .as_ref()?
            .ratio
    }

    /// Number of entries in the provider's `monitors` array, if present.
    pub fn listed_monitors(&self) -> usize {
        self.monitors.as_ref().map_or(0, Vec::len)
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Option<Vec<Value>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Array(items)) => Some(items),
        _ => None,
    })
}

fn lenient_ratio<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|ratio| ratio.is_finite()))
}

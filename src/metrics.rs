//! Process-wide telemetry.
//!
//! The resolver only talks to the [`MetricsSink`] capability; the
//! Prometheus-backed [`PrometheusMetrics`] is what the binary wires in and
//! what `/metrics` renders.

use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::time::Duration;

pub const METRICS_PREFIX: &str = "uptime_status_proxy";

pub trait MetricsSink: Send + Sync {
    fn record_fetch_duration(&self, duration: Duration);
    fn record_cache_hit(&self);
    fn record_cache_miss(&self);
    fn record_upstream_error(&self);
    fn set_operational(&self, operational: bool);
}

#[derive(Clone)]
pub struct PrometheusMetrics {
    pub registry: Registry,
    pub upstream_duration_ms: Gauge,
    pub upstream_errors_total: IntCounter,
    pub service_status: IntGauge,
    pub cache_hits_total: IntCounter,
    pub cache_misses_total: IntCounter,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_ms: GaugeVec,
    pub process_uptime_seconds: Gauge,
}

impl PrometheusMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(METRICS_PREFIX.to_string()), None)?;

        let upstream_duration_ms = Gauge::new(
            "uptimerobot_api_duration_ms",
            "Duration of UptimeRobot API calls in milliseconds",
        )?;
        let upstream_errors_total = IntCounter::new(
            "uptimerobot_api_errors_total",
            "Total number of UptimeRobot API errors",
        )?;
        let service_status = IntGauge::new(
            "service_status",
            "Current service status (1 = operational, 0 = not operational)",
        )?;
        let cache_hits_total = IntCounter::new("cache_hits_total", "Total number of cache hits")?;
        let cache_misses_total =
            IntCounter::new("cache_misses_total", "Total number of cache misses")?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "code"],
        )?;
        let http_request_duration_ms = GaugeVec::new(
            Opts::new(
                "http_request_duration_ms",
                "Duration of HTTP requests in milliseconds",
            ),
            &["method", "route", "code"],
        )?;
        let process_uptime_seconds =
            Gauge::new("process_uptime_seconds", "Seconds since the proxy started")?;

        registry.register(Box::new(upstream_duration_ms.clone()))?;
        registry.register(Box::new(upstream_errors_total.clone()))?;
        registry.register(Box::new(service_status.clone()))?;
        registry.register(Box::new(cache_hits_total.clone()))?;
        registry.register(Box::new(cache_misses_total.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration_ms.clone()))?;
        registry.register(Box::new(process_uptime_seconds.clone()))?;

        // resident memory, cpu seconds, open fds, start time
        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            upstream_duration_ms,
            upstream_errors_total,
            service_status,
            cache_hits_total,
            cache_misses_total,
            http_requests_total,
            http_request_duration_ms,
            process_uptime_seconds,
        })
    }

    pub fn observe_http_request(&self, method: &str, route: &str, code: u16, duration: Duration) {
        let code = code.to_string();
        let labels = [method, route, code.as_str()];
        self.http_requests_total.with_label_values(&labels).inc();
        self.http_request_duration_ms
            .with_label_values(&labels)
            .set(duration.as_secs_f64() * 1000.0);
    }

    /// Content type of [`Self::encode`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Renders every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

impl MetricsSink for PrometheusMetrics {
    fn record_fetch_duration(&self, duration: Duration) {
        self.upstream_duration_ms
            .set(duration.as_secs_f64() * 1000.0);
    }

    fn record_cache_hit(&self) {
        self.cache_hits_total.inc();
    }

    fn record_cache_miss(&self) {
        self.cache_misses_total.inc();
    }

    fn record_upstream_error(&self) {
        self.upstream_errors_total.inc();
    }

    fn set_operational(&self, operational: bool) {
        self.service_status.set(i64::from(operational));
    }
}

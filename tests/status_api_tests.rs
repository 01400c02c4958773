use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use uptime_status_proxy::metrics::PrometheusMetrics;
use uptime_status_proxy::server::config::ServerConfig;
use uptime_status_proxy::status::{FetchError, RawMonitorPayload, StatusFetcher, StatusResolver};
use uptime_status_proxy::web::{AppState, create_axum_router};

const WIDGET_ORIGIN: &str = "https://youthful-vacation-500847.framer.app";

struct ScriptedFetcher {
    calls: AtomicUsize,
    delay: Duration,
    script: Mutex<VecDeque<Result<RawMonitorPayload, FetchError>>>,
}

impl ScriptedFetcher {
    fn new(script: Vec<Result<RawMonitorPayload, FetchError>>) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    fn with_delay(
        script: Vec<Result<RawMonitorPayload, FetchError>>,
        delay: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            script: Mutex::new(script.into()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusFetcher for ScriptedFetcher {
    async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<RawMonitorPayload, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(FetchError::Transport("script exhausted".to_string())))
    }
}

fn payload(value: Value) -> RawMonitorPayload {
    serde_json::from_value(value).unwrap()
}

fn healthy() -> RawMonitorPayload {
    payload(json!({
        "stat": "ok",
        "statistics": {
            "counts": { "up": 5, "down": 0, "warning": 0, "paused": 0 },
            "uptime": { "l1": { "ratio": "99.95" } }
        },
        "monitors": [{ "id": 1 }, { "id": 2 }]
    }))
}

struct TestApp {
    router: Router,
    fetcher: Arc<ScriptedFetcher>,
    metrics: Arc<PrometheusMetrics>,
}

impl TestApp {
    fn new(fetcher: Arc<ScriptedFetcher>) -> Self {
        Self::with_config(fetcher, ServerConfig::default())
    }

    fn with_config(fetcher: Arc<ScriptedFetcher>, config: ServerConfig) -> Self {
        let config = Arc::new(config);
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let resolver = Arc::new(StatusResolver::new(
            fetcher.clone(),
            metrics.clone(),
            config.upstream_url(),
            config.cache_ttl(),
            config.fetch_timeout(),
        ));
        let state = Arc::new(AppState::new(config, resolver, metrics.clone()));
        Self {
            router: create_axum_router(state),
            fetcher,
            metrics,
        }
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, origin: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(origin) = origin {
            builder = builder.header(header::ORIGIN, origin);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }
}

async fn body_json(response: Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_status_contract_and_headers() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let response = app.get("/api/status", Some("https://preview-7.framer.app")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header_str(&response, "cache-control"),
        Some("public, max-age=60, s-maxage=300, stale-while-revalidate=300")
    );
    assert_eq!(header_str(&response, "x-content-type-options"), Some("nosniff"));
    assert_eq!(
        header_str(&response, "access-control-allow-origin"),
        Some("https://preview-7.framer.app")
    );
    assert_eq!(header_str(&response, "access-control-allow-credentials"), Some("true"));
    assert!(
        header_str(&response, "vary")
            .unwrap()
            .to_ascii_lowercase()
            .contains("origin")
    );
    assert_eq!(header_str(&response, "ratelimit-limit"), Some("100"));
    assert_eq!(header_str(&response, "ratelimit-remaining"), Some("99"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "operational");
    assert_eq!(body["isGreen"], true);
    assert_eq!(body["isDegraded"], false);
    assert_eq!(body["isOutage"], false);
    assert_eq!(body["isMaintenance"], false);
    assert_eq!(body["statusText"], "All services operational (99.95% uptime)");
    assert_eq!(body["monitors"], 5);
    assert_eq!(body["uptimePercentage"], 99.95);
    assert!(body["responseTime"].as_str().unwrap().ends_with("ms"));
    assert_eq!(body["debug"]["monitors"], 2);
    assert_eq!(body["debug"]["cacheHit"], false);
    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_disallowed_origin_gets_no_cors_grant() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let response = app.get("/api/status", Some("https://evil.example")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_preflight_makes_no_upstream_call() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/status")
        .header(header::ORIGIN, WIDGET_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "access-control-allow-origin"), Some(WIDGET_ORIGIN));
    assert!(
        header_str(&response, "access-control-allow-methods")
            .unwrap()
            .contains("GET")
    );
    assert_eq!(app.fetcher.calls(), 0);

    // a bare OPTIONS without a preflight request header is answered directly too
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/simple-status")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);
    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_framer_route_only_grants_widget_origin() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let response = app.get("/api/framer-status", Some(WIDGET_ORIGIN)).await;
    assert_eq!(header_str(&response, "access-control-allow-origin"), Some(WIDGET_ORIGIN));
    assert_eq!(body_json(response).await["status"], "operational");

    let response = app.get("/api/framer-status", Some("https://other.framer.app")).await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_simple_route_is_public() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let response = app.get("/api/simple-status", Some("https://anywhere.example")).await;

    assert_eq!(header_str(&response, "access-control-allow-origin"), Some("*"));
    assert!(response.headers().get("access-control-allow-credentials").is_none());
    assert_eq!(body_json(response).await["isGreen"], true);
}

#[tokio::test]
async fn test_cold_failure_is_200_error_body() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Err(FetchError::UpstreamHttp {
        status: 502,
        url: "https://stats.uptimerobot.com/api/getMonitorList/H8lyexLCjy".to_string(),
    })]));

    let response = app.get("/api/status", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "cache-control"), Some("no-cache"));
    let body = body_json(response).await;
    assert_eq!(body["status"], "error");
    assert_eq!(body["isGreen"], false);
    assert_eq!(body["isOutage"], true);
    assert_eq!(body["statusText"], "Unable to fetch status");
    assert_eq!(body["monitors"], 0);
    assert!(body["error"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn test_second_request_is_served_from_cache() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let first = body_json(app.get("/api/status", None).await).await;
    let second = body_json(app.get("/api/simple-status", None).await).await;

    assert_eq!(app.fetcher.calls(), 1);
    assert_eq!(first["statusText"], second["statusText"]);
    assert_eq!(second["debug"]["cacheHit"], true);
    assert_eq!(second["debug"]["source"], "cache");
    assert_eq!(app.metrics.cache_hits_total.get(), 1);
    assert_eq!(app.metrics.cache_misses_total.get(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_fetch() {
    let app = TestApp::new(ScriptedFetcher::with_delay(
        vec![Ok(healthy()), Ok(healthy())],
        Duration::from_millis(100),
    ));

    let (a, b, c) = tokio::join!(
        app.get("/api/status", None),
        app.get("/api/framer-status", None),
        app.get("/api/simple-status", None),
    );

    assert_eq!(a.status(), StatusCode::OK);
    assert_eq!(b.status(), StatusCode::OK);
    assert_eq!(c.status(), StatusCode::OK);
    assert_eq!(app.fetcher.calls(), 1);
}

#[tokio::test]
async fn test_production_hides_debug_block() {
    let config = ServerConfig {
        environment: "production".to_string(),
        ..Default::default()
    };
    let app = TestApp::with_config(ScriptedFetcher::new(vec![Ok(healthy())]), config);

    let body = body_json(app.get("/api/status", None).await).await;

    assert_eq!(body["status"], "operational");
    assert!(body.get("debug").is_none());
}

#[tokio::test]
async fn test_health_does_not_touch_cache() {
    let app = TestApp::new(ScriptedFetcher::new(vec![]));

    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("ratelimit-limit").is_none());
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    assert_eq!(body["platform"], std::env::consts::OS);
    assert!(body["memory"]["rss"].as_str().unwrap().ends_with(" MB"));
    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_version_endpoint() {
    let app = TestApp::new(ScriptedFetcher::new(vec![]));

    let response = app.get("/api/version", Some("https://anywhere.example")).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "access-control-allow-origin"), Some("*"));
    let body = body_json(response).await;
    assert_eq!(body["version"], uptime_status_proxy::version::VERSION);
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_metrics_exposition() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));
    app.get("/api/status", None).await;

    let response = app.get("/metrics", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(header_str(&response, "content-type").unwrap().starts_with("text/plain"));
    let text = body_text(response).await;
    assert!(text.contains("uptime_status_proxy_cache_misses_total 1"));
    assert!(text.contains("uptime_status_proxy_service_status 1"));
    assert!(text.contains("uptime_status_proxy_uptimerobot_api_duration_ms"));
    assert!(text.contains("uptime_status_proxy_process_uptime_seconds"));
    if cfg!(target_os = "linux") {
        assert!(text.contains("uptime_status_proxy_process_resident_memory_bytes"));
    }
    assert!(text.contains(
        r#"uptime_status_proxy_http_requests_total{code="200",method="GET",route="/api/status"} 1"#
    ));
}

#[tokio::test]
async fn test_unknown_path_is_json_404() {
    let app = TestApp::new(ScriptedFetcher::new(vec![]));

    let response = app.get("/api/nope", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body, json!({ "error": "Not found", "path": "/api/nope" }));
    assert_eq!(
        app.metrics
            .http_requests_total
            .with_label_values(&["GET", "unmatched", "404"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_non_get_method_is_405() {
    let app = TestApp::new(ScriptedFetcher::new(vec![Ok(healthy())]));

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/status")
        .body(Body::empty())
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body_json(response).await, json!({ "error": "Method not allowed" }));
    assert_eq!(app.fetcher.calls(), 0);
}

#[tokio::test]
async fn test_rate_limit_applies_to_api_only() {
    let config = ServerConfig {
        rate_limit_max: 2,
        ..Default::default()
    };
    let app = TestApp::with_config(ScriptedFetcher::new(vec![]), config);

    for remaining in ["1", "0"] {
        let response = app.get("/api/version", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header_str(&response, "ratelimit-remaining"), Some(remaining));
    }

    let response = app.get("/api/version", None).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&response, "ratelimit-limit"), Some("2"));
    assert_eq!(header_str(&response, "ratelimit-remaining"), Some("0"));
    assert!(header_str(&response, "ratelimit-reset").is_some());
    assert_eq!(
        body_json(response).await,
        json!({ "error": "Too many requests, please try again later." })
    );

    // a different forwarded client has its own budget
    let request = Request::builder()
        .uri("/api/version")
        .header("x-forwarded-for", "198.51.100.4")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(request).await.status(), StatusCode::OK);

    assert_eq!(app.get("/health", None).await.status(), StatusCode::OK);
    assert_eq!(app.get("/metrics", None).await.status(), StatusCode::OK);
}

use axum::{Router, http::Uri, middleware as axum_middleware};
use std::sync::Arc;
use std::time::Instant;

use crate::metrics::PrometheusMetrics;
use crate::server::config::ServerConfig;
use crate::status::StatusResolver;
use crate::web::middleware::{rate_limit, request_metrics};
use crate::web::middleware::rate_limit::RateLimiter;
use crate::web::routes::*;

pub use error::AppError;

pub mod error;
pub mod middleware;
pub mod responder;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<StatusResolver>,
    pub metrics: Arc<PrometheusMetrics>,
    pub config: Arc<ServerConfig>,
    pub rate_limiter: Arc<RateLimiter>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        config: Arc<ServerConfig>,
        resolver: Arc<StatusResolver>,
        metrics: Arc<PrometheusMetrics>,
    ) -> Self {
        let rate_limiter = Arc::new(RateLimiter::new(
            config.rate_limit_max,
            config.rate_limit_window(),
        ));
        Self {
            resolver,
            metrics,
            config,
            rate_limiter,
            started_at: Instant::now(),
        }
    }
}

async fn not_found_handler(uri: Uri) -> AppError {
    AppError::NotFound(uri.path().to_string())
}

pub fn create_axum_router(app_state: Arc<AppState>) -> Router {
    // Everything under /api is rate limited; probes and scrapes are not.
    let api_router = status_routes::status_router(&app_state.config)
        .merge(health_routes::version_router())
        .route_layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            rate_limit::rate_limit,
        ));

    Router::new()
        .merge(api_router)
        .merge(health_routes::health_router())
        .merge(metrics_routes::metrics_router())
        .fallback(not_found_handler)
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            request_metrics::track_request_metrics,
        ))
        .with_state(app_state)
}

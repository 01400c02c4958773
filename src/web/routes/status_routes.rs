use axum::{
    Router,
    extract::State,
    http::{HeaderValue, Method, StatusCode, header, request::Parts},
    response::Response,
    routing::{MethodRouter, get},
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::error;

use crate::server::config::ServerConfig;
use crate::web::responder;
use crate::web::{AppError, AppState};

/// The three status routes share one contract and differ only in which
/// origins may read them cross-origin.
pub fn status_router(config: &ServerConfig) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/status", status_method_router().layer(allow_list_cors(config)))
        .route("/api/framer-status", status_method_router().layer(widget_cors(config)))
        .route("/api/simple-status", status_method_router().layer(public_cors()))
}

fn status_method_router() -> MethodRouter<Arc<AppState>> {
    get(get_status).options(preflight).fallback(method_not_allowed)
}

pub fn origin_allowed(origin: &str, origins: &[String], suffixes: &[String]) -> bool {
    origins.iter().any(|allowed| allowed == origin)
        || (origin.starts_with("https://")
            && suffixes.iter().any(|suffix| origin.ends_with(suffix.as_str())))
}

fn allow_list_cors(config: &ServerConfig) -> CorsLayer {
    let origins = config.allowed_origins.clone();
    let suffixes = config.allowed_origin_suffixes.clone();
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin
                    .to_str()
                    .is_ok_and(|origin| origin_allowed(origin, &origins, &suffixes))
            },
        ))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn widget_cors(config: &ServerConfig) -> CorsLayer {
    let widget = HeaderValue::from_str(&config.widget_origin).ok();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(widget))
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

fn public_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

async fn get_status(State(app_state): State<Arc<AppState>>) -> Response {
    let started = Instant::now();
    let result = app_state.resolver.resolve().await;
    if let Err(e) = &result {
        error!(error = %e, "No status available, serving error response.");
    }
    responder::status_response(
        &result,
        started.elapsed(),
        !app_state.config.is_production(),
    )
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> AppError {
    AppError::MethodNotAllowed
}

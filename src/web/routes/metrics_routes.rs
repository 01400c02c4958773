use axum::{
    Router,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;

use crate::web::{AppError, AppState};

async fn metrics_handler(State(app_state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let metrics = &app_state.metrics;
    metrics
        .process_uptime_seconds
        .set(app_state.started_at.elapsed().as_secs_f64());

    let body = metrics.encode()?;
    Ok(([(header::CONTENT_TYPE, metrics.content_type())], body).into_response())
}

pub fn metrics_router() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(metrics_handler))
}

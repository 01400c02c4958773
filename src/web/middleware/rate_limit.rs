use axum::{
    body::Body as AxumBody,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::web::{AppState, error::AppError};

const RATELIMIT_LIMIT: &str = "ratelimit-limit";
const RATELIMIT_REMAINING: &str = "ratelimit-remaining";
const RATELIMIT_RESET: &str = "ratelimit-reset";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32, reset: Duration },
    Limited { reset: Duration },
}

/// Fixed-window request counter per client address.
#[derive(Debug)]
pub struct RateLimiter {
    max: u32,
    window: Duration,
    clients: DashMap<IpAddr, Window>,
}

impl RateLimiter {
    pub fn new(max: u32, window: Duration) -> Self {
        Self {
            max,
            window,
            clients: DashMap::new(),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn check(&self, client: IpAddr) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        let reset = self.window.saturating_sub(now.duration_since(entry.started));
        if entry.count >= self.max {
            return RateDecision::Limited { reset };
        }
        entry.count += 1;
        RateDecision::Allowed {
            remaining: self.max - entry.count,
            reset,
        }
    }

    /// Drops windows that have fully elapsed.
    pub fn prune(&self) -> usize {
        let now = Instant::now();
        let before = self.clients.len();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
        before - self.clients.len()
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }
}

/// Client address: the last `X-Forwarded-For` hop (the one appended by the
/// fronting proxy), else the socket peer.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.rsplit(',').next())
        .and_then(|hop| hop.trim().parse().ok())
        .or_else(|| peer.map(|addr| addr.ip()))
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

fn insert_headers(headers: &mut HeaderMap, limit: u32, remaining: u32, reset: Duration) {
    // round up so clients never retry a fraction of a second too early
    let reset_secs = reset.as_secs() + u64::from(reset.subsec_nanos() > 0);
    headers.insert(RATELIMIT_LIMIT, HeaderValue::from(limit));
    headers.insert(RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(RATELIMIT_RESET, HeaderValue::from(reset_secs));
}

pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    req: Request<AxumBody>,
    next: Next,
) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = client_ip(req.headers(), peer);
    let limiter = &state.rate_limiter;

    match limiter.check(client) {
        RateDecision::Allowed { remaining, reset } => {
            debug!(client = %client, remaining, "Request admitted by rate limiter.");
            let mut response = next.run(req).await;
            insert_headers(response.headers_mut(), limiter.max(), remaining, reset);
            response
        }
        RateDecision::Limited { reset } => {
            warn!(client = %client, path = %req.uri().path(), "Rate limit exceeded.");
            let mut response = AppError::TooManyRequests.into_response();
            insert_headers(response.headers_mut(), limiter.max(), 0, reset);
            response
        }
    }
}

//! Per-client request rate limiting.
//!
//! Each client IP gets its own token bucket sized from
//! `api.rate_limit_per_minute`. Over-limit requests get 429 with a
//! `Retry-After` header.

use crate::rest::ErrorResponse;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use governor::clock::{Clock, DefaultClock};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use shopdash_core::config::ApiConfig;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use tracing::debug;

const RATE_LIMIT_LIMIT: &str = "x-ratelimit-limit";

#[derive(Clone)]
pub struct RateLimitState {
    enabled: bool,
    per_minute: NonZeroU32,
    limiters: Arc<DashMap<IpAddr, Arc<DefaultDirectRateLimiter>>>,
}

impl RateLimitState {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            enabled: config.rate_limit_enabled,
            per_minute: NonZeroU32::new(config.rate_limit_per_minute).unwrap_or(NonZeroU32::MIN),
            limiters: Arc::new(DashMap::new()),
        }
    }

    fn limiter_for(&self, ip: IpAddr) -> Arc<DefaultDirectRateLimiter> {
        self.limiters
            .entry(ip)
            .or_insert_with(|| Arc::new(RateLimiter::direct(Quota::per_minute(self.per_minute))))
            .clone()
    }
}

pub struct RateLimited {
    retry_after: u64,
}

impl IntoResponse for RateLimited {
    fn into_response(self) -> Response {
        metrics::counter!("api.rate_limited").increment(1);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse {
                error: "rate_limited".to_string(),
                message: "Too many requests, please try again later.".to_string(),
            }),
        )
            .into_response();
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(self.retry_after));
        response
    }
}

/// Client address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer. Requests without any of these share one bucket.
fn client_ip(request: &Request) -> IpAddr {
    let header_ip = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|h| h.to_str().ok())
            .and_then(|v| v.split(',').next())
            .and_then(|v| v.trim().parse::<IpAddr>().ok())
    };

    header_ip("x-forwarded-for")
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip())
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, RateLimited> {
    if !state.enabled {
        return Ok(next.run(request).await);
    }

    let ip = client_ip(&request);
    match state.limiter_for(ip).check() {
        Ok(()) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert(
                    HeaderName::from_static(RATE_LIMIT_LIMIT),
                    HeaderValue::from(state.per_minute.get()),
                );
            Ok(response)
        }
        Err(not_until) => {
            let retry_after = not_until
                .wait_time_from(DefaultClock::default().now())
                .as_secs()
                .max(1);
            debug!(client = %ip, retry_after = retry_after, "Rate limit exceeded");
            Err(RateLimited { retry_after })
        }
    }
}

//! Rate limiting middleware.

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::web::error::ApiError;

/// Rate limiter keyed by client IP.
pub type IpRateLimiter = RateLimiter<IpAddr, DefaultKeyedStateStore<IpAddr>, DefaultClock>;

/// Interval between sweeps of replenished limiter entries.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Key used when the peer address is not known.
const UNKNOWN_CLIENT: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

/// State for rate limiting.
pub struct RateLimitState {
    limiter: IpRateLimiter,
    /// Key on `X-Forwarded-For` / `X-Real-IP` instead of the socket peer.
    trust_proxy_headers: bool,
}

impl RateLimitState {
    /// Allow `max_requests` per client IP within every `window`.
    ///
    /// The full allowance is available as a burst and replenishes evenly over
    /// the window.
    pub fn new(window: Duration, max_requests: u32) -> Self {
        let burst = NonZeroU32::new(max_requests).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::with_period(window / burst.get())
            .unwrap_or_else(|| Quota::per_second(burst))
            .allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
            trust_proxy_headers: false,
        }
    }

    /// Identify clients by forwarding headers set by a reverse proxy.
    ///
    /// Only enable this behind a proxy that overwrites these headers.
    pub fn with_trusted_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    /// Check if a request from `ip` is allowed.
    pub fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Number of tracked client IPs.
    pub fn tracked_clients(&self) -> usize {
        self.limiter.len()
    }

    /// Drop entries whose quota has fully replenished.
    ///
    /// A client that is still limited keeps its entry.
    pub fn cleanup(&self) {
        self.limiter.retain_recent();
    }

    /// Start a background task that periodically cleans up old entries.
    pub fn start_cleanup_task(self: Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(CLEANUP_INTERVAL) => self.cleanup(),
                }
            }
        })
    }

    /// Resolve the key for a request.
    fn client_ip(&self, req: &Request<Body>) -> IpAddr {
        if self.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(req) {
                return ip;
            }
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
            .unwrap_or(UNKNOWN_CLIENT)
    }
}

/// Client IP announced by a reverse proxy, if it parses.
fn forwarded_ip(req: &Request<Body>) -> Option<IpAddr> {
    let header = |name: &str| req.headers().get(name).and_then(|v| v.to_str().ok());

    // First hop of the chain is the original client
    header("X-Forwarded-For")
        .and_then(|chain| chain.split(',').next())
        .and_then(|ip| ip.trim().parse().ok())
        .or_else(|| header("X-Real-IP").and_then(|ip| ip.trim().parse().ok()))
}

/// Rate limiting middleware.
pub async fn rate_limit(
    State(state): State<Arc<RateLimitState>>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let ip = state.client_ip(&req);

    if !state.check(ip) {
        tracing::warn!(ip = %ip, "Rate limit exceeded");
        return ApiError::too_many_requests("Too many requests. Please try again later.")
            .into_response();
    }

    next.run(req).await
}

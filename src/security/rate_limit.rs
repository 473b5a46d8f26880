//! Fixed-window rate limiting per client address.
//!
//! Each client gets `max_requests` admissions per window. The window starts at
//! the client's first request and the entry is dropped once it elapses, either
//! lazily on the client's next request or by the periodic sweep.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::broadcast;

use crate::config::RateLimitConfig;
use crate::error::ProxyError;
use crate::observability::metrics;

/// Time source for window bookkeeping.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Instant;
}

/// Wall clock backed by `Instant::now`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Admissions used by one client in its current window.
#[derive(Debug, Clone, Copy)]
struct ClientQuota {
    count: u32,
    expires_at: Instant,
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted { remaining: u32 },
    Denied,
}

/// Per-client quota table behind a single lock.
pub struct RateLimiter {
    clients: Mutex<HashMap<IpAddr, ClientQuota>>,
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_clock(config.max_requests, config.window(), Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            window,
            clock,
        }
    }

    fn clients(&self) -> MutexGuard<'_, HashMap<IpAddr, ClientQuota>> {
        // A panic elsewhere cannot leave a counter half-written.
        self.clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count one request from `client` against its window.
    pub fn check(&self, client: IpAddr) -> Admission {
        let now = self.clock.now();
        let mut clients = self.clients();

        if let Some(quota) = clients.get_mut(&client) {
            if quota.expires_at > now {
                if quota.count >= self.max_requests {
                    return Admission::Denied;
                }
                quota.count += 1;
                return Admission::Admitted {
                    remaining: self.max_requests - quota.count,
                };
            }
        }

        // First request, or the previous window has elapsed.
        clients.insert(
            client,
            ClientQuota {
                count: 1,
                expires_at: now + self.window,
            },
        );
        Admission::Admitted {
            remaining: self.max_requests.saturating_sub(1),
        }
    }

    /// Remove every entry whose window has elapsed. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut clients = self.clients();
        let before = clients.len();
        clients.retain(|_, quota| quota.expires_at > now);
        before - clients.len()
    }

    /// Number of clients currently holding a window.
    pub fn tracked_clients(&self) -> usize {
        self.clients().len()
    }

    /// Sweep expired entries every `interval` until shutdown.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval = ?interval, "Rate limit sweeper starting");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.sweep();
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.tracked_clients(), "Swept expired rate limit windows");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Rate limit sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}

/// Middleware applying the limiter to the peer IP of each request.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    match limiter.check(addr.ip()) {
        Admission::Admitted { remaining } => {
            tracing::trace!(client = %addr.ip(), remaining, "Request admitted");
            next.run(request).await
        }
        Admission::Denied => {
            tracing::warn!(client = %addr.ip(), "Rate limit exceeded");
            metrics::record_rate_limited();
            ProxyError::RateLimited.into_response()
        }
    }
}

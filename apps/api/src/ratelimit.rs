//! Process-wide fixed-window rate limiting, keyed by client IP and endpoint
//! class. Quotas mirror the endpoint tiers: a general quota for CRUD traffic
//! and tighter ones for the LLM-backed streaming endpoints.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};

use crate::errors::AppError;
use crate::state::AppState;

/// A quota bucket shared by all endpoints of one class.
#[derive(Debug, Clone, Copy)]
pub struct EndpointClass {
    pub name: &'static str,
    /// Requests allowed per window.
    pub quota: u32,
}

pub const DEFAULT: EndpointClass = EndpointClass {
    name: "default",
    quota: 30,
};

pub const GENERATION: EndpointClass = EndpointClass {
    name: "generation",
    quota: 5,
};

pub const CHAT: EndpointClass = EndpointClass {
    name: "chat",
    quota: 10,
};

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counter. The window resets lazily on the first request after
/// it elapses; stale buckets are overwritten rather than swept.
pub struct RateLimiter {
    window: Duration,
    buckets: Mutex<HashMap<(IpAddr, &'static str), Window>>,
}

impl RateLimiter {
    pub fn new(window: Duration) -> Self {
        RateLimiter {
            window,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// One-minute windows, matching the per-minute quotas above.
    pub fn per_minute() -> Self {
        RateLimiter::new(Duration::from_secs(60))
    }

    /// Returns true if the request is admitted.
    pub fn check(&self, addr: IpAddr, class: EndpointClass) -> bool {
        self.check_at(addr, class, Instant::now())
    }

    fn check_at(&self, addr: IpAddr, class: EndpointClass, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().expect("rate limiter lock poisoned");

        let bucket = buckets.entry((addr, class.name)).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(bucket.started) >= self.window {
            bucket.started = now;
            bucket.count = 0;
        }

        if bucket.count >= class.quota {
            return false;
        }

        bucket.count += 1;
        true
    }
}

/// Middleware rejecting over-quota callers with 429 before the handler runs.
/// Attach per route group with the group's `EndpointClass`.
pub async fn rate_limit(
    State((state, class)): State<(AppState, EndpointClass)>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.limiter.check(addr.ip(), class) {
        tracing::warn!(
            "Rate limit exceeded for {} on class {}",
            addr.ip(),
            class.name
        );
        return Err(AppError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn test_quota_enforced_within_window() {
        let limiter = RateLimiter::per_minute();
        let now = Instant::now();

        for _ in 0..GENERATION.quota {
            assert!(limiter.check_at(ip(1), GENERATION, now));
        }
        assert!(!limiter.check_at(ip(1), GENERATION, now));
    }

    #[test]
    fn test_window_reset_admits_again() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let now = Instant::now();

        for _ in 0..GENERATION.quota {
            assert!(limiter.check_at(ip(1), GENERATION, now));
        }
        assert!(!limiter.check_at(ip(1), GENERATION, now));

        let later = now + Duration::from_secs(61);
        assert!(limiter.check_at(ip(1), GENERATION, later));
    }

    #[test]
    fn test_clients_counted_independently() {
        let limiter = RateLimiter::per_minute();
        let now = Instant::now();

        for _ in 0..GENERATION.quota {
            assert!(limiter.check_at(ip(1), GENERATION, now));
        }
        assert!(!limiter.check_at(ip(1), GENERATION, now));
        assert!(limiter.check_at(ip(2), GENERATION, now));
    }

    #[test]
    fn test_classes_counted_independently() {
        let limiter = RateLimiter::per_minute();
        let now = Instant::now();

        for _ in 0..GENERATION.quota {
            assert!(limiter.check_at(ip(1), GENERATION, now));
        }
        assert!(!limiter.check_at(ip(1), GENERATION, now));
        assert!(limiter.check_at(ip(1), CHAT, now));
    }
}

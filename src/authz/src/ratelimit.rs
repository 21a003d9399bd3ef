//! Per-client fixed-window rate limiter
//!
//! Each client key owns one window. The window is replaced wholesale when it
//! expires or when its counter is incremented, inside a single map-entry
//! critical section, so concurrent requests from the same client cannot both
//! observe the same count.

use crate::clock::{Clock, SystemClock};
use dashmap::DashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Requests allowed per window
    pub limit: u32,

    /// Window length
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            window: Duration::from_secs(60),
        }
    }
}

/// Counter for one client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub window_start: Instant,
    pub request_count: u32,
}

impl RateLimitWindow {
    fn fresh(now: Instant) -> Self {
        Self {
            window_start: now,
            request_count: 0,
        }
    }

    fn is_expired(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.window_start) > window
    }
}

/// Admission decision for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed { limit: u32, remaining: u32 },
    Limited { limit: u32, retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }

    /// Retry-After value in whole seconds, at least 1
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            RateLimitDecision::Limited { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Some(secs.max(1))
            }
            RateLimitDecision::Allowed { .. } => None,
        }
    }
}

/// Key used to bucket requests
pub fn client_key(user_id: Option<Uuid>, ip: Option<IpAddr>) -> String {
    match (user_id, ip) {
        (Some(user_id), _) => format!("user:{}", user_id),
        (None, Some(ip)) => format!("ip:{}", ip),
        (None, None) => "ip:unknown".to_string(),
    }
}

/// Process-wide fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    windows: DashMap<String, RateLimitWindow>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: DashMap::new(),
            config,
            clock,
        }
    }

    pub fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Count a request against `client_key` and decide whether to admit it.
    ///
    /// Rejected requests do not increment the counter.
    pub fn check(&self, client_key: &str) -> RateLimitDecision {
        let now = self.clock.now();
        let limit = self.config.limit;

        // Shard write lock held until `slot` drops
        let mut slot = self
            .windows
            .entry(client_key.to_string())
            .or_insert_with(|| RateLimitWindow::fresh(now));

        let mut window = *slot;
        if window.is_expired(now, self.config.window) {
            window = RateLimitWindow::fresh(now);
        }

        if window.request_count >= limit {
            *slot = window;
            let elapsed = now.saturating_duration_since(window.window_start);
            let retry_after = self.config.window.saturating_sub(elapsed);
            warn!(
                client = client_key,
                limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );
            return RateLimitDecision::Limited { limit, retry_after };
        }

        let updated = RateLimitWindow {
            window_start: window.window_start,
            request_count: window.request_count + 1,
        };
        *slot = updated;

        RateLimitDecision::Allowed {
            limit,
            remaining: limit - updated.request_count,
        }
    }

    /// Current window for a client, if any
    pub fn window(&self, client_key: &str) -> Option<RateLimitWindow> {
        self.windows.get(client_key).map(|w| *w)
    }

    /// Drop windows that have expired. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.windows.len();
        self.windows.retain(|_, w| !w.is_expired(now, self.config.window));
        let removed = before.saturating_sub(self.windows.len());
        if removed > 0 {
            debug!(removed, "Purged expired rate limit windows");
        }
        removed
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

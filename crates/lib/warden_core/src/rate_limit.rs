//! Abuse guard: fixed-window rate limiting per client per action.
//!
//! Advisory protection in front of the session flows. Requests without a
//! resolvable client identity are let through.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::config::{RateLimitConfig, WindowLimit};

/// Interval of the stale-window sweep.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GuardedAction {
    Register,
    Login,
    Refresh,
}

impl GuardedAction {
    pub fn as_str(self) -> &'static str {
        match self {
            GuardedAction::Register => "register",
            GuardedAction::Login => "login",
            GuardedAction::Refresh => "refresh",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed {
        limit: u32,
        remaining: u32,
        reset_after: Duration,
    },
    Limited {
        limit: u32,
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per client within a fixed window.
#[derive(Debug)]
pub struct FixedWindowLimiter {
    limit: WindowLimit,
    windows: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(limit: WindowLimit) -> Self {
        Self {
            limit,
            windows: DashMap::new(),
        }
    }

    pub fn check(&self, client: &str) -> RateLimitDecision {
        self.check_at(client, Instant::now())
    }

    /// Count one request from `client` at `now`.
    ///
    /// Increment-and-compare happens under the entry's shard lock, so a burst
    /// from one client cannot undercount.
    pub fn check_at(&self, client: &str, now: Instant) -> RateLimitDecision {
        let WindowLimit {
            max_requests,
            window,
        } = self.limit;

        let mut entry = self.windows.entry(client.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(entry.started) >= window {
            entry.started = now;
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);

        let reset_after = window.saturating_sub(now.saturating_duration_since(entry.started));
        if entry.count > max_requests {
            RateLimitDecision::Limited {
                limit: max_requests,
                retry_after: reset_after,
            }
        } else {
            RateLimitDecision::Allowed {
                limit: max_requests,
                remaining: max_requests - entry.count,
                reset_after,
            }
        }
    }

    /// Drop windows that have rolled over.
    pub fn cleanup(&self) {
        self.cleanup_at(Instant::now());
    }

    fn cleanup_at(&self, now: Instant) {
        let window = self.limit.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }
}

/// One limiter per guarded action, owned by the composition root.
#[derive(Debug)]
pub struct AbuseGuard {
    register: FixedWindowLimiter,
    login: FixedWindowLimiter,
    refresh: FixedWindowLimiter,
}

impl AbuseGuard {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            register: FixedWindowLimiter::new(config.register),
            login: FixedWindowLimiter::new(config.login),
            refresh: FixedWindowLimiter::new(config.refresh),
        }
    }

    pub fn limiter(&self, action: GuardedAction) -> &FixedWindowLimiter {
        match action {
            GuardedAction::Register => &self.register,
            GuardedAction::Login => &self.login,
            GuardedAction::Refresh => &self.refresh,
        }
    }

    /// Decide whether `client` may perform `action` now.
    pub fn check(&self, action: GuardedAction, client: Option<&str>) -> RateLimitDecision {
        let limiter = self.limiter(action);
        let Some(client) = client else {
            debug!(action = action.as_str(), "no client identity, rate limit skipped");
            return RateLimitDecision::Allowed {
                limit: limiter.limit.max_requests,
                remaining: limiter.limit.max_requests,
                reset_after: limiter.limit.window,
            };
        };
        let decision = limiter.check(client);
        if !decision.is_allowed() {
            debug!(action = action.as_str(), client, "rate limit exceeded");
        }
        decision
    }

    pub fn cleanup(&self) {
        self.register.cleanup();
        self.login.cleanup();
        self.refresh.cleanup();
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let guard = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                guard.cleanup();
            }
        })
    }
}

impl Default for AbuseGuard {
    fn default() -> Self {
        Self::new(&RateLimitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixth_login_in_a_minute_is_limited() {
        let guard = AbuseGuard::default();
        let limiter = guard.limiter(GuardedAction::Login);
        let start = Instant::now();

        for i in 0..5 {
            let decision = limiter.check_at("10.0.0.1", start + Duration::from_secs(i));
            assert!(decision.is_allowed(), "request {i} should pass");
        }
        let sixth = limiter.check_at("10.0.0.1", start + Duration::from_secs(10));
        assert_eq!(
            sixth,
            RateLimitDecision::Limited {
                limit: 5,
                retry_after: Duration::from_secs(50),
            }
        );
    }

    #[test]
    fn next_window_starts_fresh() {
        let limiter = FixedWindowLimiter::new(WindowLimit::per_minute(1));
        let start = Instant::now();
        assert!(limiter.check_at("c", start).is_allowed());
        assert!(!limiter.check_at("c", start + Duration::from_secs(30)).is_allowed());
        assert!(limiter.check_at("c", start + Duration::from_secs(60)).is_allowed());
    }

    #[test]
    fn clients_and_actions_are_independent() {
        let guard = AbuseGuard::default();
        for _ in 0..3 {
            assert!(guard.check(GuardedAction::Register, Some("a")).is_allowed());
        }
        assert!(!guard.check(GuardedAction::Register, Some("a")).is_allowed());
        assert!(guard.check(GuardedAction::Register, Some("b")).is_allowed());
        assert!(guard.check(GuardedAction::Login, Some("a")).is_allowed());
    }

    #[test]
    fn remaining_counts_down() {
        let limiter = FixedWindowLimiter::new(WindowLimit::per_minute(2));
        let now = Instant::now();
        match limiter.check_at("c", now) {
            RateLimitDecision::Allowed { remaining, .. } => assert_eq!(remaining, 1),
            other => panic!("unexpected {other:?}"),
        }
        match limiter.check_at("c", now) {
            RateLimitDecision::Allowed { remaining, .. } => assert_eq!(remaining, 0),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_client_fails_open() {
        let guard = AbuseGuard::new(&RateLimitConfig {
            login: WindowLimit::per_minute(0),
            ..RateLimitConfig::default()
        });
        assert!(guard.check(GuardedAction::Login, None).is_allowed());
        assert!(!guard.check(GuardedAction::Login, Some("x")).is_allowed());
    }

    #[test]
    fn cleanup_drops_rolled_over_windows() {
        let limiter = FixedWindowLimiter::new(WindowLimit::per_minute(5));
        let start = Instant::now();
        limiter.check_at("old", start);
        limiter.check_at("new", start + Duration::from_secs(45));
        limiter.cleanup_at(start + Duration::from_secs(61));
        assert_eq!(limiter.tracked_clients(), 1);
    }

    #[test]
    fn concurrent_burst_is_counted_exactly() {
        let limiter = Arc::new(FixedWindowLimiter::new(WindowLimit::per_minute(50)));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = limiter.clone();
                std::thread::spawn(move || {
                    (0..25)
                        .filter(|_| limiter.check("burst").is_allowed())
                        .count()
                })
            })
            .collect();
        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }
}

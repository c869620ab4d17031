//! Per-node message throttling with a sliding window.
//!
//! Each node gets a deque of accept timestamps. On every check the window is
//! pruned, then the message is either recorded and allowed or rejected with a
//! retry hint. Uses the monotonic clock throughout; wall-clock adjustments
//! must not open or close the window.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::config::SecurityConfig;
use crate::logutil::escape_log;

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitResult {
    pub allowed: bool,
    /// How long until the next message would be accepted; `None` when allowed.
    pub retry_after: Option<Duration>,
}

impl RateLimitResult {
    fn allowed() -> Self {
        Self {
            allowed: true,
            retry_after: None,
        }
    }

    fn rejected(retry_after: Duration) -> Self {
        Self {
            allowed: false,
            retry_after: Some(retry_after),
        }
    }
}

/// Sliding-window rate limiter keyed by node id.
#[derive(Debug)]
pub struct RateLimiter {
    max_messages: usize,
    window: Duration,
    enabled: bool,
    node_timestamps: HashMap<String, VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_messages: usize, window: Duration, enabled: bool) -> Self {
        Self {
            max_messages,
            window,
            enabled,
            node_timestamps: HashMap::new(),
        }
    }

    pub fn from_config(security: &SecurityConfig) -> Self {
        Self::new(
            security.rate_limit_messages,
            Duration::from_secs(security.rate_limit_window_seconds),
            security.rate_limit_enabled,
        )
    }

    /// Check whether a message from `node_id` is allowed, recording it if so.
    pub fn check(&mut self, node_id: &str) -> RateLimitResult {
        if !self.enabled {
            return RateLimitResult::allowed();
        }

        let now = Instant::now();
        self.check_at(node_id, now)
    }

    // Split out for deterministic tests.
    fn check_at(&mut self, node_id: &str, now: Instant) -> RateLimitResult {
        let timestamps = self
            .node_timestamps
            .entry(node_id.to_string())
            .or_default();

        // Drop entries that have slid out of the window
        while let Some(oldest) = timestamps.front() {
            if now.duration_since(*oldest) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }

        if timestamps.len() < self.max_messages {
            timestamps.push_back(now);
            return RateLimitResult::allowed();
        }

        // Over limit: retry once the oldest in-window entry expires
        let retry_after = timestamps
            .front()
            .map(|oldest| self.window.saturating_sub(now.duration_since(*oldest)))
            .unwrap_or(self.window);

        warn!(
            "Rate limit exceeded for node {}: {}/{} in {:?}",
            escape_log(node_id),
            timestamps.len(),
            self.max_messages,
            self.window
        );

        RateLimitResult::rejected(retry_after)
    }

    /// Drop tracking for nodes silent longer than `inactive_for`.
    /// Returns the number of nodes removed.
    pub fn cleanup_inactive(&mut self, inactive_for: Duration) -> usize {
        let now = Instant::now();
        let before = self.node_timestamps.len();
        self.node_timestamps.retain(|_, timestamps| {
            match timestamps.back() {
                Some(newest) => now.duration_since(*newest) < inactive_for,
                None => false,
            }
        });
        let removed = before - self.node_timestamps.len();
        if removed > 0 {
            debug!("Cleaned up rate limit data for {} inactive nodes", removed);
        }
        removed
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn max_messages(&self) -> usize {
        self.max_messages
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_node_count(&self) -> usize {
        self.node_timestamps.len()
    }
}

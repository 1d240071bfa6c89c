//! Per-peer sliding-window request limiter.

use std::collections::VecDeque;

use dashmap::DashMap;

use crate::error::RateLimitError;

/// Default window length.
pub const DEFAULT_WINDOW_MS: i64 = 60_000;
/// Default requests allowed per window.
pub const DEFAULT_MAX_REQUESTS: usize = 600;
/// Default maximum number of distinct peer keys tracked before evicting the
/// least-recently-active one.
pub const DEFAULT_MAX_TRACKED_KEYS: usize = 10_000;

struct Window {
    timestamps: VecDeque<i64>,
    last_seen_ms: i64,
}

/// A sliding-window-log limiter: the (max+1)-th request inside any rolling
/// window is rejected with an exact wait time to when the oldest tracked
/// timestamp ages out.
pub struct RequestLimiter {
    windows: DashMap<String, Window>,
    window_ms: i64,
    max_requests: usize,
    max_tracked_keys: usize,
}

impl RequestLimiter {
    /// A limiter with explicit window length, request cap, and tracked-key cap.
    pub fn new(window_ms: i64, max_requests: usize, max_tracked_keys: usize) -> Self {
        Self { windows: DashMap::new(), window_ms, max_requests, max_tracked_keys }
    }

    /// A limiter with the default caps (600 requests / 60s, 10 000 tracked keys).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_WINDOW_MS, DEFAULT_MAX_REQUESTS, DEFAULT_MAX_TRACKED_KEYS)
    }

    /// Record one request for `key` at `now_ms`, admitting it if the window
    /// isn't full.
    pub fn check(&self, key: &str, now_ms: i64) -> Result<(), RateLimitError> {
        if !self.windows.contains_key(key) && self.windows.len() >= self.max_tracked_keys {
            self.evict_oldest();
        }

        let mut entry = self
            .windows
            .entry(key.to_string())
            .or_insert_with(|| Window { timestamps: VecDeque::new(), last_seen_ms: now_ms });

        let cutoff = now_ms - self.window_ms;
        while matches!(entry.timestamps.front(), Some(t) if *t <= cutoff) {
            entry.timestamps.pop_front();
        }

        if entry.timestamps.len() >= self.max_requests {
            let oldest = *entry.timestamps.front().expect("len >= max_requests > 0 implies non-empty");
            let wait_ms = (oldest + self.window_ms) - now_ms;
            return Err(RateLimitError::RequestsExceeded { wait_seconds: (wait_ms.max(0) as f64) / 1000.0 });
        }

        entry.timestamps.push_back(now_ms);
        entry.last_seen_ms = now_ms;
        Ok(())
    }

    fn evict_oldest(&self) {
        if let Some(victim) = self.windows.iter().min_by_key(|e| e.value().last_seen_ms).map(|e| e.key().clone()) {
            self.windows.remove(&victim);
        }
    }

    /// Number of distinct keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_the_cap_then_rejects() {
        let limiter = RequestLimiter::new(1000, 3, 100);
        assert!(limiter.check("peer", 0).is_ok());
        assert!(limiter.check("peer", 10).is_ok());
        assert!(limiter.check("peer", 20).is_ok());
        let err = limiter.check("peer", 30).unwrap_err();
        match err {
            RateLimitError::RequestsExceeded { wait_seconds } => {
                // oldest ts=0, window=1000ms, now=30 -> wait = (0+1000-30)/1000
                assert!((wait_seconds - 0.97).abs() < 1e-9);
            }
            _ => panic!("expected RequestsExceeded"),
        }
    }

    #[test]
    fn window_slides_and_admits_again() {
        let limiter = RequestLimiter::new(1000, 1, 100);
        assert!(limiter.check("peer", 0).is_ok());
        assert!(limiter.check("peer", 500).is_err());
        assert!(limiter.check("peer", 1001).is_ok());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RequestLimiter::new(1000, 1, 100);
        assert!(limiter.check("a", 0).is_ok());
        assert!(limiter.check("b", 0).is_ok());
    }

    #[test]
    fn evicts_least_recently_active_key_over_cap() {
        let limiter = RequestLimiter::new(1000, 10, 2);
        limiter.check("a", 0).unwrap();
        limiter.check("b", 100).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);
        limiter.check("c", 200).unwrap();
        assert_eq!(limiter.tracked_keys(), 2);
    }
}

//! Per-IP concurrent connection cap.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::RateLimitError;

/// Default maximum concurrent connections accepted from one IP.
pub const DEFAULT_MAX_PER_IP: usize = 32;
/// Default maximum number of distinct IPs tracked before evicting the
/// least-recently-active one.
pub const DEFAULT_MAX_TRACKED_IPS: usize = 1_000;

/// Tracks live connection counts per source IP, bounded to a maximum number
/// of tracked IPs to prevent unbounded memory growth from address churn.
pub struct ConnectionLimiter {
    counts: DashMap<IpAddr, Arc<AtomicUsize>>,
    max_per_ip: usize,
    max_tracked_ips: usize,
}

/// RAII handle: dropping it releases the connection slot it reserved.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionLimiter {
    /// A limiter with the given per-IP and tracked-IP-count caps.
    pub fn new(max_per_ip: usize, max_tracked_ips: usize) -> Self {
        Self { counts: DashMap::new(), max_per_ip, max_tracked_ips }
    }

    /// A limiter with the default caps (32 per IP, 1000 tracked IPs).
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_MAX_PER_IP, DEFAULT_MAX_TRACKED_IPS)
    }

    /// Reserve one connection slot for `ip`, or fail if it's already at the
    /// per-IP cap. Evicts the entry for some other idle IP first if the
    /// tracked-IP cap would otherwise be exceeded.
    pub fn acquire(&self, ip: IpAddr) -> Result<ConnectionGuard, RateLimitError> {
        if !self.counts.contains_key(&ip) && self.counts.len() >= self.max_tracked_ips {
            if let Some(victim) = self.counts.iter().find(|e| e.value().load(Ordering::SeqCst) == 0).map(|e| *e.key())
            {
                self.counts.remove(&victim);
            }
        }

        let entry = self.counts.entry(ip).or_insert_with(|| Arc::new(AtomicUsize::new(0)));
        let count = entry.value().clone();
        drop(entry);

        loop {
            let current = count.load(Ordering::SeqCst);
            if current >= self.max_per_ip {
                return Err(RateLimitError::TooManyConnections);
            }
            if count
                .compare_exchange(current, current + 1, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(ConnectionGuard { count });
            }
        }
    }

    /// Current live connection count for `ip`, or 0 if untracked.
    pub fn current_count(&self, ip: IpAddr) -> usize {
        self.counts.get(&ip).map(|c| c.load(Ordering::SeqCst)).unwrap_or(0)
    }
}

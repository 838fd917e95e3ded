use std::collections::HashMap;
use std::collections::VecDeque;
use std::time::Duration;
use std::time::Instant;

use parking_lot::Mutex;

use crate::configuration::RateLimitSettings;

/// Bucket shared by every request that arrives without forwarding headers
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Where request timestamps live. `record_if_allowed` must do the whole
/// read-prune-append step atomically for a given key; a shared store (e.g.
/// redis) would have to provide the same guarantee across instances.
pub trait RateLimitStore: Send + Sync {
    fn record_if_allowed(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max_requests: usize,
    ) -> bool;
}

/// Process-local store. Keys are never evicted, so this grows with the number
/// of distinct clients seen since startup, and counts are lost on restart.
#[derive(Default)]
pub struct InMemoryStore {
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimitStore for InMemoryStore {
    fn record_if_allowed(
        &self,
        key: &str,
        now: Instant,
        window: Duration,
        max_requests: usize,
    ) -> bool {
        let mut requests = self.requests.lock();
        let timestamps = requests.entry(key.to_string()).or_default();

        // timestamps are appended in order, so everything stale is at the front.
        // `checked_sub` only fails if `now` is less than `window` after boot,
        // in which case nothing can be stale yet
        if let Some(window_start) = now.checked_sub(window) {
            while timestamps.front().is_some_and(|t| *t <= window_start) {
                timestamps.pop_front();
            }
        }

        if timestamps.len() >= max_requests {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

/// Sliding-window limiter: at most `max_requests` accepted requests per client
/// in any trailing `window`. Rejected requests are not recorded, so a client
/// that keeps hammering is let back in as soon as its oldest accepted request
/// leaves the window.
pub struct RateLimiter {
    store: Box<dyn RateLimitStore>,
    window: Duration,
    max_requests: usize,
}

impl Default for RateLimiter {
    /// 5 requests per minute, in memory
    fn default() -> Self { Self::new(Duration::from_secs(60), 5) }
}

impl RateLimiter {
    pub fn new(
        window: Duration,
        max_requests: usize,
    ) -> Self {
        Self::with_store(InMemoryStore::default(), window, max_requests)
    }

    pub fn with_store(
        store: impl RateLimitStore + 'static,
        window: Duration,
        max_requests: usize,
    ) -> Self {
        Self {
            store: Box::new(store),
            window,
            max_requests,
        }
    }

    pub fn from_settings(cfg: &RateLimitSettings) -> Self {
        Self::new(cfg.window(), cfg.max_requests)
    }

    pub fn allow(
        &self,
        client_id: &str,
    ) -> bool {
        self.allow_at(client_id, Instant::now())
    }

    pub fn allow_at(
        &self,
        client_id: &str,
        now: Instant,
    ) -> bool {
        self.store
            .record_if_allowed(client_id, now, self.window, self.max_requests)
    }
}

use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};

/// Per-key cooldown gate. Consecutive `block` calls for one key return at
/// least `delay` apart; distinct keys never wait on each other.
pub struct RateLimiter {
    delay: Duration,
    next_slot: Mutex<AHashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            next_slot: Mutex::new(AHashMap::new()),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Waits until this key's slot opens. First use of a key returns at once.
    pub async fn block(&self, key: &str) {
        if self.delay.is_zero() {
            return;
        }
        // The slot is reserved under the lock, the wait happens outside it.
        let ready_at = {
            let mut slots = self.next_slot.lock();
            let now = Instant::now();
            let ready_at = match slots.get(key) {
                Some(&last) if last + self.delay > now => last + self.delay,
                _ => now,
            };
            slots.insert(key.to_string(), ready_at);
            ready_at
        };
        if ready_at > Instant::now() {
            tracing::trace!(key, wait_ms = (ready_at - Instant::now()).as_millis() as u64, "rate limited");
            sleep_until(ready_at).await;
        }
    }
}

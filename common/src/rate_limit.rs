// Sliding-window rate limiter
// Gates calls to external or heavily-shared resources; callers block
// cooperatively until a slot frees up instead of failing immediately.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Allows at most `max_requests` acquisitions within any `window`.
pub struct SlidingWindowRateLimiter {
    max_requests: usize,
    window: Duration,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        assert!(max_requests > 0, "rate limiter needs at least one slot");
        Self {
            max_requests,
            window,
            timestamps: Mutex::new(VecDeque::with_capacity(max_requests)),
        }
    }

    /// Waits until a slot is available, then takes it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut stamps = self.timestamps.lock().await;
                let now = Instant::now();
                Self::evict_expired(&mut stamps, now, self.window);

                if stamps.len() < self.max_requests {
                    stamps.push_back(now);
                    return;
                }

                // Oldest in-window request decides how long until a slot opens
                let oldest = *stamps.front().expect("non-empty at capacity");
                self.window.saturating_sub(now.duration_since(oldest))
            };

            trace!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Takes a slot if one is free right now. Never exceeds the ceiling.
    pub async fn try_acquire(&self) -> bool {
        let mut stamps = self.timestamps.lock().await;
        let now = Instant::now();
        Self::evict_expired(&mut stamps, now, self.window);

        if stamps.len() < self.max_requests {
            stamps.push_back(now);
            true
        } else {
            false
        }
    }

    /// Number of slots currently in use.
    pub async fn in_flight(&self) -> usize {
        let mut stamps = self.timestamps.lock().await;
        let now = Instant::now();
        Self::evict_expired(&mut stamps, now, self.window);
        stamps.len()
    }

    fn evict_expired(stamps: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(front) = stamps.front() {
            if now.duration_since(*front) >= window {
                stamps.pop_front();
            } else {
                break;
            }
        }
    }
}

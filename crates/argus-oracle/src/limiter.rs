use argus_types::{ArgusError, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling-window rate limiter. Excess calls fail fast with a transient
/// error; the retry layer above decides whether to wait.
pub struct RateLimiter {
    window: Duration,
    max_calls: usize,
    calls: VecDeque<Instant>,
}

impl RateLimiter {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            window,
            max_calls,
            calls: VecDeque::with_capacity(max_calls),
        }
    }

    pub fn try_acquire(&mut self, upstream: &str) -> Result<()> {
        let now = Instant::now();
        while let Some(front) = self.calls.front() {
            if now.duration_since(*front) >= self.window {
                self.calls.pop_front();
            } else {
                break;
            }
        }

        if self.calls.len() >= self.max_calls {
            return Err(ArgusError::RateLimited(upstream.to_string()));
        }

        self.calls.push_back(now);
        Ok(())
    }

    pub fn in_flight_window(&self) -> usize {
        self.calls.len()
    }
}

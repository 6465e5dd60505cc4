use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Circuit breaker over the ground-truth upstream.
///
/// Closed: calls pass through. Reaching `threshold` failures within the
/// sliding `window` trips to Open. Open: calls are short-circuited until
/// `cooldown` elapses, then exactly one trial call is allowed (HalfOpen).
/// Trial success closes the circuit; trial failure reopens it and resets
/// the cooldown. A trial that never reports back (its task was cancelled)
/// forfeits the slot after one cooldown, so a new trial can run.
pub struct CircuitBreaker {
    state: BreakerState,
    failures: VecDeque<Instant>,
    threshold: usize,
    window: Duration,
    cooldown: Duration,
    opened_at: Option<Instant>,
    trial_started: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: usize, window: Duration, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            failures: VecDeque::new(),
            threshold,
            window,
            cooldown,
            opened_at: None,
            trial_started: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a call may go upstream right now. Transitions Open -> HalfOpen
    /// when the cooldown has elapsed and claims the single trial slot.
    pub fn allow_call(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::Open => {
                let cooled = self
                    .opened_at
                    .map(|t| t.elapsed() >= self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    self.state = BreakerState::HalfOpen;
                    self.trial_started = Some(Instant::now());
                    info!("Circuit breaker half-open, allowing trial call");
                    true
                } else {
                    false
                }
            }
            BreakerState::HalfOpen => match self.trial_started {
                Some(started) if started.elapsed() < self.cooldown => false,
                _ => {
                    warn!("Circuit breaker trial abandoned, allowing a new trial");
                    self.trial_started = Some(Instant::now());
                    true
                }
            },
        }
    }

    pub fn record_success(&mut self) {
        self.failures.clear();
        self.trial_started = None;
        if self.state != BreakerState::Closed {
            info!("Circuit breaker closed");
        }
        self.state = BreakerState::Closed;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        let now = Instant::now();
        self.trial_started = None;

        if self.state == BreakerState::HalfOpen {
            // Failed trial: reopen and restart the cooldown.
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
            warn!("Circuit breaker trial failed, reopening");
            return;
        }

        self.failures.push_back(now);
        while let Some(front) = self.failures.front() {
            if now.duration_since(*front) >= self.window {
                self.failures.pop_front();
            } else {
                break;
            }
        }

        if self.state == BreakerState::Closed && self.failures.len() >= self.threshold {
            self.state = BreakerState::Open;
            self.opened_at = Some(now);
            warn!(
                failures = self.failures.len(),
                "Circuit breaker opened for upstream"
            );
        }
    }
}

//! Per-caller sliding-window request limiter.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

pub struct RateLimiter {
    window: Duration,
    max_requests: usize,
    callers: DashMap<String, Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            window,
            max_requests,
            callers: DashMap::new(),
        }
    }

    /// Record a request from `caller`; false when it is over the limit.
    pub fn check(&self, caller: &str) -> bool {
        self.check_at(caller, Instant::now())
    }

    pub fn check_at(&self, caller: &str, now: Instant) -> bool {
        if let Some(entry) = self.callers.get(caller) {
            return self.admit(&mut entry.lock(), now);
        }
        let entry = self
            .callers
            .entry(caller.to_string())
            .or_insert_with(|| Mutex::new(VecDeque::with_capacity(self.max_requests)));
        let admitted = self.admit(&mut entry.lock(), now);
        admitted
    }

    fn admit(&self, stamps: &mut VecDeque<Instant>, now: Instant) -> bool {
        while let Some(&oldest) = stamps.front() {
            if now.saturating_duration_since(oldest) >= self.window {
                stamps.pop_front();
            } else {
                break;
            }
        }
        if stamps.len() >= self.max_requests {
            return false;
        }
        stamps.push_back(now);
        true
    }

    /// Forget callers with no request inside the window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    pub fn sweep_at(&self, now: Instant) -> usize {
        let before = self.callers.len();
        self.callers.retain(|_, stamps| {
            stamps
                .lock()
                .back()
                .is_some_and(|&last| now.saturating_duration_since(last) < self.window)
        });
        let dropped = before.saturating_sub(self.callers.len());
        if dropped > 0 {
            debug!(dropped, remaining = self.callers.len(), "rate limiter swept");
        }
        dropped
    }

    pub fn tracked_callers(&self) -> usize {
        self.callers.len()
    }

    pub fn window(&self) -> Duration {
        self.window
    }
}

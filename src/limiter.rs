// src/limiter.rs

//! Fixed-window request limits keyed by remote address.
//!
//! Every window is counted separately. A request is admitted only when all of
//! its address's windows have room, and only admitted requests are counted.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::config::RateLimitSettings;

/// Counters are swept for expiry once the map grows past this many entries.
const SWEEP_THRESHOLD: usize = 4096;

const HOUR: Duration = Duration::from_secs(60 * 60);
const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// At most `max` requests per `period`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitWindow {
    pub max: u32,
    pub period: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
struct Counter {
    started: Instant,
    count: u32,
}

#[derive(Debug)]
pub struct RateLimiter {
    windows: Vec<LimitWindow>,
    // Keyed by address and window index.
    counters: Mutex<HashMap<(IpAddr, usize), Counter>>,
}

impl RateLimiter {
    /// Windows with `max == 0` are treated as unlimited and dropped.
    pub fn new(windows: Vec<LimitWindow>) -> Self {
        Self {
            windows: windows.into_iter().filter(|w| w.max > 0).collect(),
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_settings(settings: &RateLimitSettings) -> Self {
        Self::new(vec![
            LimitWindow { max: settings.per_hour, period: HOUR },
            LimitWindow { max: settings.per_day, period: DAY },
        ])
    }

    /// Records one request from `addr` if every window still has room.
    pub fn check(&self, addr: IpAddr) -> RateDecision {
        self.check_at(addr, Instant::now())
    }

    fn check_at(&self, addr: IpAddr, now: Instant) -> RateDecision {
        if self.windows.is_empty() {
            return RateDecision::Allowed;
        }
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);

        if counters.len() > SWEEP_THRESHOLD {
            counters.retain(|(_, i), c| now.duration_since(c.started) < self.windows[*i].period);
        }

        let mut retry_after = None;
        for (i, window) in self.windows.iter().enumerate() {
            let counter = counters
                .entry((addr, i))
                .or_insert(Counter { started: now, count: 0 });
            let elapsed = now.duration_since(counter.started);
            if elapsed >= window.period {
                counter.started = now;
                counter.count = 0;
            } else if counter.count >= window.max {
                let wait = window.period - elapsed;
                retry_after = Some(retry_after.map_or(wait, |w: Duration| w.max(wait)));
            }
        }
        if let Some(retry_after) = retry_after {
            return RateDecision::Rejected { retry_after };
        }

        for i in 0..self.windows.len() {
            if let Some(counter) = counters.get_mut(&(addr, i)) {
                counter.count += 1;
            }
        }
        RateDecision::Allowed
    }
}

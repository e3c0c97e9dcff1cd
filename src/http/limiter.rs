//! Per-source request pacing
//!
//! Every source tag gets its own budget: the limiter remembers when the last
//! request for a tag was dispatched and suspends callers until the tag's
//! minimum interval has elapsed. Tags never share a budget.

use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Pacing state for one source tag
#[derive(Debug, Clone, Default)]
pub struct SourceState {
    /// Number of requests dispatched for this tag
    pub request_count: u32,

    /// When the last request for this tag was dispatched
    pub last_request_time: Option<Instant>,
}

impl SourceState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, min_interval: Duration, now: Instant) -> Option<Duration> {
        let last = self.last_request_time?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < min_interval {
            Some(min_interval - elapsed)
        } else {
            None
        }
    }

    /// Records that a request was dispatched at `now`
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_time = Some(now);
    }
}

/// Rate limiter partitioned by source tag
#[derive(Debug)]
pub struct RateLimiter {
    default_interval: Duration,
    intervals: HashMap<String, Duration>,
    states: Mutex<HashMap<String, SourceState>>,
}

impl RateLimiter {
    /// Creates a limiter where every tag uses `default_interval`
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            intervals: HashMap::new(),
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the interval for one tag
    pub fn with_interval(mut self, source: impl Into<String>, interval: Duration) -> Self {
        self.intervals.insert(source.into(), interval);
        self
    }

    pub fn interval_for(&self, source: &str) -> Duration {
        self.intervals
            .get(source)
            .copied()
            .unwrap_or(self.default_interval)
    }

    /// Waits until a request for `source` may be dispatched, then records it
    pub async fn acquire(&self, source: &str) {
        let interval = self.interval_for(source);
        loop {
            let wait = {
                let mut states = self.states.lock().await;
                let state = states.entry(source.to_string()).or_default();
                let now = Instant::now();
                match state.time_until_next_request(interval, now) {
                    None => {
                        state.record_request(now);
                        return;
                    }
                    Some(wait) => wait,
                }
            };

            tracing::trace!("Rate limiting {}: waiting {:?}", source, wait);
            tokio::time::sleep(wait).await;
        }
    }

    /// Number of requests dispatched for a tag so far
    pub async fn request_count(&self, source: &str) -> u32 {
        self.states
            .lock()
            .await
            .get(source)
            .map(|s| s.request_count)
            .unwrap_or(0)
    }

    /// Forgets all pacing state
    pub async fn reset(&self) {
        self.states.lock().await.clear();
    }
}

/// Fixed courtesy pause between successive calls of a single harvester
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    state: Mutex<SourceState>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(SourceState::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits out the remainder of the interval since the previous call
    pub async fn pause(&self) {
        let mut state = self.state.lock().await;
        if let Some(wait) = state.time_until_next_request(self.interval, Instant::now()) {
            tokio::time::sleep(wait).await;
        }
        state.record_request(Instant::now());
    }
}

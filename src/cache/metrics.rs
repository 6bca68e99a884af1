//! Hit/miss accounting for a cached client.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Point-in-time copy of cache performance counters.
///
/// `total_requests == hits + misses` and `hit_ratio == hits / total_requests`
/// (0 when no requests were recorded).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheMetricsSnapshot {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_ratio: f64,
    /// Running mean of provider latency over misses.
    pub avg_provider_time: Duration,
    /// Estimated provider time avoided: `hits * avg_provider_time`.
    pub saved_time: Duration,
    /// Time since creation or the last reset.
    pub window: Duration,
}

#[derive(Debug)]
struct State {
    hits: u64,
    misses: u64,
    avg_secs: f64,
    window_start: Instant,
}

impl State {
    fn new() -> Self {
        Self {
            hits: 0,
            misses: 0,
            avg_secs: 0.0,
            window_start: Instant::now(),
        }
    }
}

/// Lock-guarded cache counters.
///
/// Independent from any other lock in the crate; recording never blocks on
/// cache or provider I/O.
#[derive(Debug)]
pub struct CacheMetrics {
    state: Mutex<State>,
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::new()),
        }
    }

    pub fn record_hit(&self) {
        self.lock().hits += 1;
    }

    /// Record a miss and fold its provider latency into the running mean.
    pub fn record_miss(&self, latency: Duration) {
        let mut state = self.lock();
        state.misses += 1;
        let n = state.misses as f64;
        state.avg_secs = (state.avg_secs * (n - 1.0) + latency.as_secs_f64()) / n;
    }

    /// Zero all counters and restart the timing window.
    pub fn reset(&self) {
        *self.lock() = State::new();
    }

    pub fn snapshot(&self) -> CacheMetricsSnapshot {
        let state = self.lock();
        let total_requests = state.hits + state.misses;
        let hit_ratio = if total_requests == 0 {
            0.0
        } else {
            state.hits as f64 / total_requests as f64
        };
        let avg_provider_time = Duration::from_secs_f64(state.avg_secs);
        CacheMetricsSnapshot {
            hits: state.hits,
            misses: state.misses,
            total_requests,
            hit_ratio,
            avg_provider_time,
            saved_time: avg_provider_time.mul_f64(state.hits as f64),
            window: state.window_start.elapsed(),
        }
    }

    // Counters stay consistent even if a holder panicked mid-update.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_average_over_misses() {
        let metrics = CacheMetrics::new();
        metrics.record_miss(Duration::from_millis(100));
        metrics.record_miss(Duration::from_millis(300));
        metrics.record_hit();

        let snap = metrics.snapshot();
        assert_eq!(snap.avg_provider_time, Duration::from_millis(200));
        assert_eq!(snap.saved_time, Duration::from_millis(200));
        assert_eq!(snap.total_requests, 3);
    }

    #[test]
    fn empty_metrics_have_zero_ratio() {
        let snap = CacheMetrics::new().snapshot();
        assert_eq!(snap.total_requests, 0);
        assert_eq!(snap.hit_ratio, 0.0);
    }

    #[test]
    fn reset_zeroes_counters() {
        let metrics = CacheMetrics::new();
        metrics.record_hit();
        metrics.record_miss(Duration::from_millis(5));
        metrics.reset();
        let snap = metrics.snapshot();
        assert_eq!(snap.hits, 0);
        assert_eq!(snap.misses, 0);
        assert_eq!(snap.avg_provider_time, Duration::ZERO);
    }
}

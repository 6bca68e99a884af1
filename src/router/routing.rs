//! Provider preferences and latency tracking for the router.
//!
//! - [`RoutingConfig`]: ordered provider preferences per prompt complexity
//! - [`ProviderLatency`]: lock-free EWMA of request durations per provider
//!
//! ```toml
//! [routing]
//! simple = ["bedrock", "azure"]
//! complex = ["azure", "bedrock"]
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::complexity::TaskComplexity;

/// Provider preference lists by prompt complexity.
///
/// The router walks the list for a request's complexity and takes the first
/// provider that is registered. Medium prompts have no list and go to the
/// default provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Cheapest / fastest first. Default: bedrock, azure.
    pub simple: Vec<String>,
    /// Most capable first. Default: azure, bedrock.
    pub complex: Vec<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            simple: vec!["bedrock".to_string(), "azure".to_string()],
            complex: vec!["azure".to_string(), "bedrock".to_string()],
        }
    }
}

impl RoutingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preference order for simple prompts.
    pub fn simple<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.simple = providers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the preference order for complex prompts.
    pub fn complex<I, S>(mut self, providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.complex = providers.into_iter().map(Into::into).collect();
        self
    }

    /// Preference list for a complexity class (empty for medium).
    pub fn preferences(&self, complexity: TaskComplexity) -> &[String] {
        match complexity {
            TaskComplexity::Simple => &self.simple,
            TaskComplexity::Complex => &self.complex,
            TaskComplexity::Medium => &[],
        }
    }
}

/// Exponentially weighted moving average of one provider's latency.
///
/// Stored as f64 microseconds in an `AtomicU64`. The first observation
/// seeds the average; a racing first pair may both seed, which only skews
/// the estimate briefly.
pub struct ProviderLatency {
    ewma_micros: AtomicU64,
    count: AtomicU64,
    alpha: f64,
}

impl Default for ProviderLatency {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl ProviderLatency {
    /// `alpha` in `[0, 1]`: higher reacts faster to new observations.
    pub fn new(alpha: f64) -> Self {
        Self {
            ewma_micros: AtomicU64::new(0_f64.to_bits()),
            count: AtomicU64::new(0),
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn record(&self, duration: Duration) {
        let sample = duration.as_micros() as f64;
        let first = self.count.load(Ordering::Relaxed) == 0;
        let _ = self
            .ewma_micros
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
                let next = if first {
                    sample
                } else {
                    self.alpha * sample + (1.0 - self.alpha) * f64::from_bits(bits)
                };
                Some(next.to_bits())
            });
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Current estimate, `None` before the first observation.
    pub fn average(&self) -> Option<Duration> {
        if self.count.load(Ordering::Relaxed) == 0 {
            return None;
        }
        let micros = f64::from_bits(self.ewma_micros.load(Ordering::Relaxed));
        Some(Duration::from_micros(micros as u64))
    }

    pub fn observations(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for ProviderLatency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderLatency")
            .field("average", &self.average())
            .field("observations", &self.observations())
            .finish()
    }
}

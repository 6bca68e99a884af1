//! Response and usage types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Result of a generation call.
///
/// `cached == true` implies `duration == Duration::ZERO`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub content: String,
    pub model: String,
    pub provider: String,
    pub usage: Usage,
    #[serde(default)]
    pub cached: bool,
    /// Wall-clock time spent in the provider call.
    #[serde(default)]
    pub duration: Duration,
}

impl GenerateResponse {
    /// Mark this response as served from cache.
    pub fn into_cached(mut self) -> Self {
        self.cached = true;
        self.duration = Duration::ZERO;
        self
    }

    /// Mark this response as fresh from the provider.
    pub fn into_fresh(mut self, duration: Duration) -> Self {
        self.cached = false;
        self.duration = duration;
        self
    }
}

/// Token usage and cost of one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    /// Cost in USD.
    pub cost: f64,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32, cost: f64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens.saturating_add(completion_tokens),
            cost,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_is_sum_of_parts() {
        let usage = Usage::new(120, 30, 0.5);
        assert_eq!(usage.total_tokens, 150);
    }

    #[test]
    fn total_saturates_on_absurd_counts() {
        let usage = Usage::new(u32::MAX, 1, 0.0);
        assert_eq!(usage.total_tokens, u32::MAX);
        assert_eq!(usage.completion_tokens, 1);
    }
}

//! Monthly spend accounting and budget admission control.
//!
//! [`BudgetTracker`] keeps one [`MonthlyUsage`] bucket per calendar month
//! (UTC, keyed `YYYY-MM`), each aggregating cost, tokens and requests per
//! provider and per model. Buckets are created on the first tracked response
//! of a month and never removed; a new month starts from zero.
//!
//! Admission ([`check_budget`](BudgetTracker::check_budget)) runs before a
//! provider call and uses a rough estimate: a quarter token per prompt
//! character plus the request's output cap (1000 if unset). Tracking
//! ([`track_usage`](BudgetTracker::track_usage)) runs after the call and
//! uses the provider-reported counts. The two are not reconciled.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::pricing;
use crate::telemetry;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{HuginnError, Result};

/// Output tokens assumed when a request sets no `max_tokens`.
pub const DEFAULT_ESTIMATED_OUTPUT_TOKENS: u32 = 1000;

/// Clock used to pick the month bucket.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Monthly spend cap in USD. Default: 100.
    pub monthly_limit: f64,
    /// Utilization (0..=1) at which `should_alert` turns true. Default: 0.8.
    pub alert_threshold: f64,
    /// When false, admission always passes and nothing is tracked.
    pub tracking_enabled: bool,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            monthly_limit: 100.0,
            alert_threshold: 0.8,
            tracking_enabled: true,
        }
    }
}

impl BudgetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn monthly_limit(mut self, limit: f64) -> Self {
        self.monthly_limit = limit;
        self
    }

    pub fn alert_threshold(mut self, threshold: f64) -> Self {
        self.alert_threshold = threshold;
        self
    }

    pub fn tracking_enabled(mut self, enabled: bool) -> Self {
        self.tracking_enabled = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.monthly_limit.is_nan() || self.monthly_limit < 0.0 {
            return Err(HuginnError::Configuration(format!(
                "budget monthly_limit must be non-negative, got {}",
                self.monthly_limit
            )));
        }
        if !(0.0..=1.0).contains(&self.alert_threshold) {
            return Err(HuginnError::Configuration(format!(
                "budget alert_threshold must be within [0, 1], got {}",
                self.alert_threshold
            )));
        }
        Ok(())
    }
}

/// Spend on one model within a provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelUsage {
    pub cost: f64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub tokens: u64,
    pub requests: u64,
}

/// Spend on one provider, broken down by model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderUsage {
    pub cost: f64,
    pub tokens: u64,
    pub requests: u64,
    pub models: BTreeMap<String, ModelUsage>,
}

/// Spend for one calendar month.
///
/// Totals always equal the sum over providers, which equal the sum over
/// their models.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsage {
    pub month: String,
    pub total_cost: f64,
    pub total_tokens: u64,
    pub requests: u64,
    pub providers: BTreeMap<String, ProviderUsage>,
}

impl MonthlyUsage {
    fn new(month: String) -> Self {
        Self {
            month,
            ..Self::default()
        }
    }

    fn record(&mut self, response: &GenerateResponse) {
        let usage = &response.usage;
        let tokens = u64::from(usage.total_tokens);

        self.total_cost += usage.cost;
        self.total_tokens += tokens;
        self.requests += 1;

        let provider = self.providers.entry(response.provider.clone()).or_default();
        provider.cost += usage.cost;
        provider.tokens += tokens;
        provider.requests += 1;

        let model = provider.models.entry(response.model.clone()).or_default();
        model.cost += usage.cost;
        model.prompt_tokens += u64::from(usage.prompt_tokens);
        model.completion_tokens += u64::from(usage.completion_tokens);
        model.tokens += tokens;
        model.requests += 1;
    }
}

/// Derived view of the current month against the limit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetStatus {
    pub month: String,
    pub monthly_limit: f64,
    pub current_spend: f64,
    pub remaining: f64,
    /// `current_spend / monthly_limit`; 1 when the limit is zero.
    pub utilization: f64,
    pub should_alert: bool,
    pub over_budget: bool,
    pub requests: u64,
}

/// Month-bucketed spend tracker shared across requests.
pub struct BudgetTracker {
    config: BudgetConfig,
    months: RwLock<HashMap<String, MonthlyUsage>>,
    clock: Clock,
}

impl BudgetTracker {
    pub fn new(config: BudgetConfig) -> Self {
        Self::with_clock(config, Arc::new(Utc::now))
    }

    /// Create a tracker that reads time from `clock`.
    pub fn with_clock(config: BudgetConfig, clock: Clock) -> Self {
        Self {
            config,
            months: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    fn current_month(&self) -> String {
        month_key(&(self.clock)())
    }

    /// Admit or reject a request before it reaches `provider`.
    ///
    /// Rejections are `QuotaExceeded` and never retryable. A month with no
    /// tracked spend always admits.
    pub async fn check_budget(&self, provider: &str, request: &GenerateRequest) -> Result<()> {
        if !self.config.tracking_enabled {
            return Ok(());
        }

        let month = self.current_month();
        let spend = {
            let months = self.months.read().await;
            match months.get(&month) {
                Some(usage) => usage.total_cost,
                None => return Ok(()),
            }
        };
        let limit = self.config.monthly_limit;

        if spend >= limit {
            return Err(self.reject(
                provider,
                format!("monthly budget exhausted: spent ${spend:.4} of ${limit:.2} in {month}"),
            ));
        }

        let estimate = estimate_cost(provider, request);
        if spend + estimate > limit {
            return Err(self.reject(
                provider,
                format!(
                    "request would exceed monthly budget: ${spend:.4} spent + ${estimate:.4} \
                     estimated > ${limit:.2} in {month}"
                ),
            ));
        }
        Ok(())
    }

    fn reject(&self, provider: &str, message: String) -> HuginnError {
        warn!(provider, %message, "budget rejected request");
        metrics::counter!(telemetry::BUDGET_REJECTIONS_TOTAL, "provider" => provider.to_owned())
            .increment(1);
        HuginnError::quota_exceeded(provider, message)
    }

    /// Add a completed response to the current month.
    pub async fn track_usage(&self, response: &GenerateResponse) {
        if !self.config.tracking_enabled {
            return;
        }
        let month = self.current_month();
        let mut months = self.months.write().await;
        let bucket = months
            .entry(month.clone())
            .or_insert_with(|| MonthlyUsage::new(month));
        bucket.record(response);
        debug!(
            provider = %response.provider,
            cost = response.usage.cost,
            month_total = bucket.total_cost,
            "tracked usage"
        );
    }

    /// Copy of this month's usage (empty if nothing tracked yet).
    pub async fn current_usage(&self) -> MonthlyUsage {
        let month = self.current_month();
        let months = self.months.read().await;
        months
            .get(&month)
            .cloned()
            .unwrap_or_else(|| MonthlyUsage::new(month))
    }

    /// Copies of the `n` most recent month buckets, newest first.
    pub async fn usage_history(&self, n: usize) -> Vec<MonthlyUsage> {
        let months = self.months.read().await;
        let mut history: Vec<MonthlyUsage> = months.values().cloned().collect();
        history.sort_by(|a, b| b.month.cmp(&a.month));
        history.truncate(n);
        history
    }

    pub async fn budget_status(&self) -> BudgetStatus {
        let usage = self.current_usage().await;
        let limit = self.config.monthly_limit;
        let spend = usage.total_cost;
        let utilization = if limit > 0.0 { spend / limit } else { 1.0 };
        BudgetStatus {
            month: usage.month,
            monthly_limit: limit,
            current_spend: spend,
            remaining: (limit - spend).max(0.0),
            utilization,
            should_alert: utilization >= self.config.alert_threshold,
            over_budget: spend >= limit,
            requests: usage.requests,
        }
    }

    pub async fn is_over_budget(&self) -> bool {
        self.budget_status().await.over_budget
    }

    pub async fn should_alert(&self) -> bool {
        self.budget_status().await.should_alert
    }
}

/// `YYYY-MM` bucket key for a timestamp.
pub fn month_key(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Pre-flight cost estimate for a request on `provider`.
///
/// Tokens are `chars(prompt) / 4 + max_tokens` (1000 when unset), split
/// evenly between input and output.
pub fn estimate_cost(provider: &str, request: &GenerateRequest) -> f64 {
    let prompt_tokens = u32::try_from(request.prompt.chars().count() / 4).unwrap_or(u32::MAX);
    let tokens = prompt_tokens
        .saturating_add(request.max_tokens.unwrap_or(DEFAULT_ESTIMATED_OUTPUT_TOKENS));
    let input = tokens / 2;
    let output = tokens - input;
    pricing::calculate_cost(provider, &request.model, input, output)
}

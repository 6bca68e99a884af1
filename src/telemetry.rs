//! Telemetry metric name constants.
//!
//! Centralised metric names for huginn operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `huginn_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`, `_usd`).
//!
//! # Common labels
//!
//! - `provider`: provider name (e.g. "azure", "bedrock")
//! - `status`: outcome: "ok" or "error"
//! - `direction`: token direction: "prompt" or "completion"

/// Total requests dispatched through the router.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "huginn_requests_total";

/// Request duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "huginn_request_duration_seconds";

/// Total failover attempts (at most one per request).
///
/// Labels: `from`, `to`.
pub const FAILOVERS_TOTAL: &str = "huginn_failovers_total";

/// Total tokens consumed.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "huginn_tokens_total";

/// Cost of each tracked response in USD.
///
/// Labels: `provider`.
pub const REQUEST_COST_USD: &str = "huginn_request_cost_usd";

/// Total response cache hits.
pub const CACHE_HITS_TOTAL: &str = "huginn_cache_hits_total";

/// Total response cache misses.
pub const CACHE_MISSES_TOTAL: &str = "huginn_cache_misses_total";

/// Total requests rejected by budget admission control.
///
/// Labels: `provider`.
pub const BUDGET_REJECTIONS_TOTAL: &str = "huginn_budget_rejections_total";

/// Total batch flushes.
///
/// Labels: `trigger` ("size" | "timer" | "shutdown").
pub const BATCH_FLUSHES_TOTAL: &str = "huginn_batch_flushes_total";

/// Total submissions that bypassed batching because the admission queue was full.
pub const BATCH_BYPASS_TOTAL: &str = "huginn_batch_bypass_total";

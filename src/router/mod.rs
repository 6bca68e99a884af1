//! Provider selection, failover and shared cross-cutting state.
//!
//! [`ProviderRouter`] owns one [`ModelClient`] per provider, plus an optional
//! shared [`ResponseCache`] and [`BudgetTracker`].
//!
//! # Request flow
//!
//! ```text
//! generate(req)
//!     │
//!     ▼
//!  select provider ── metadata hint ─► complexity preference ─► default ─► any
//!     │
//!     ▼
//!  explicit cache key? ── hit ──► return (cached=true)
//!     │ miss
//!     ▼
//!  budget check ── reject ──► QuotaExceeded (terminal, no failover)
//!     │
//!     ▼
//!  provider call ── retryable error ──► one call to a different provider
//!     │                                      │
//!     ▼                                      ▼
//!  track usage ──► cache write (before returning) ──► return
//! ```
//!
//! Unlike [`CachedClient`](crate::CachedClient), the router persists to the
//! cache before returning, so a caller that gets a response can rely on the
//! next identical keyed request hitting.

mod builder;
mod comparison;
pub mod complexity;
pub mod routing;

pub use builder::RouterBuilder;
pub use comparison::ComparisonResult;
pub use complexity::{TaskComplexity, analyze_task_complexity};
pub use routing::{ProviderLatency, RoutingConfig};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tracing::{Span, debug, info, instrument, warn};

use crate::budget::BudgetTracker;
use crate::cache::ResponseCache;
use crate::providers::ModelClient;
use crate::telemetry;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{HuginnError, Result};

type ClientMap = BTreeMap<String, Arc<dyn ModelClient>>;

/// Routes requests across providers.
pub struct ProviderRouter {
    clients: RwLock<ClientMap>,
    cache: Option<Arc<ResponseCache>>,
    budget: Option<Arc<BudgetTracker>>,
    default_provider: Option<String>,
    routing: RoutingConfig,
    latency: RwLock<HashMap<String, Arc<ProviderLatency>>>,
}

impl ProviderRouter {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    // ========================================================================
    // Provider management
    // ========================================================================

    /// Registered provider names, sorted.
    pub fn providers(&self) -> Vec<String> {
        self.read_clients().keys().cloned().collect()
    }

    pub fn client(&self, provider: &str) -> Option<Arc<dyn ModelClient>> {
        self.read_clients().get(provider).cloned()
    }

    pub fn cache(&self) -> Option<&Arc<ResponseCache>> {
        self.cache.as_ref()
    }

    pub fn budget(&self) -> Option<&Arc<BudgetTracker>> {
        self.budget.as_ref()
    }

    /// Register a client under its provider name.
    ///
    /// Returns the client it replaced, if any. The replaced client is not
    /// closed.
    pub fn add_provider(&self, client: Arc<dyn ModelClient>) -> Option<Arc<dyn ModelClient>> {
        let name = client.provider().to_string();
        info!(provider = %name, "adding provider");
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, client)
    }

    /// Close a provider's client and stop routing to it.
    ///
    /// The client is removed even if closing it fails; the close error is
    /// returned.
    pub async fn remove_provider(&self, provider: &str) -> Result<()> {
        let client = self
            .client(provider)
            .ok_or_else(|| HuginnError::UnknownProvider(provider.to_string()))?;
        let closed = client.close().await;
        self.clients
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(provider);
        info!(provider, "removed provider");
        closed
    }

    /// Smoothed request latency observed for a provider.
    pub fn provider_latency(&self, provider: &str) -> Option<Duration> {
        self.latency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
            .and_then(|l| l.average())
    }

    // ========================================================================
    // Selection
    // ========================================================================

    /// Pick the provider for a request.
    ///
    /// An available metadata hint wins. Otherwise the prompt's complexity
    /// selects a preference list, then the default provider, then the first
    /// registered provider by name.
    pub fn select_provider(&self, request: &GenerateRequest) -> Result<String> {
        let clients = self.read_clients();
        self.choose(&clients, request, None)
            .ok_or(HuginnError::NoProvider)
    }

    fn choose(
        &self,
        clients: &ClientMap,
        request: &GenerateRequest,
        exclude: Option<&str>,
    ) -> Option<String> {
        let available = |name: &str| clients.contains_key(name) && Some(name) != exclude;

        if let Some(hint) = request.metadata.provider.as_deref() {
            if available(hint) {
                return Some(hint.to_string());
            }
            debug!(provider = hint, "requested provider unavailable, selecting another");
        }

        let complexity = analyze_task_complexity(&request.prompt);
        if let Some(name) = self
            .routing
            .preferences(complexity)
            .iter()
            .find(|name| available(name.as_str()))
        {
            return Some(name.clone());
        }

        if let Some(default) = self.default_provider.as_deref().filter(|d| available(*d)) {
            return Some(default.to_string());
        }

        clients.keys().find(|name| available(name.as_str())).cloned()
    }

    // ========================================================================
    // Generation
    // ========================================================================

    /// Generate through the selected provider with at most one failover.
    #[instrument(skip(self, request), fields(provider = tracing::field::Empty))]
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let provider = self.select_provider(request)?;
        Span::current().record("provider", provider.as_str());

        let cache_key = match (&self.cache, &request.cache_key) {
            (Some(cache), Some(_)) => Some((cache, cache.key_for(request))),
            _ => None,
        };
        if let Some((cache, key)) = &cache_key
            && let Some(hit) = cache.get(key).await
        {
            debug!(key = %key, "serving cached response");
            return Ok(hit.into_cached());
        }

        if let Some(budget) = &self.budget {
            budget.check_budget(&provider, request).await?;
        }

        let client = self
            .client(&provider)
            .ok_or_else(|| HuginnError::UnknownProvider(provider.clone()))?;
        let response = match self.call(&provider, client.as_ref(), request).await {
            Ok(response) => response,
            Err(e) if e.is_retryable() => self.failover(&provider, request, e).await?,
            Err(e) => return Err(e),
        };

        if let Some(budget) = &self.budget {
            budget.track_usage(&response).await;
        }
        if let Some((cache, key)) = &cache_key
            && let Err(e) = cache.set(key, &response).await
        {
            warn!(key = %key, error = %e, "failed to cache response");
        }
        Ok(response)
    }

    /// Retry once on a different provider. Surfaces `original` when there is
    /// no alternative, or the alternative's error when it fails too.
    async fn failover(
        &self,
        failed: &str,
        request: &GenerateRequest,
        original: HuginnError,
    ) -> Result<GenerateResponse> {
        let (alternative, client) = {
            let clients = self.read_clients();
            let Some(name) = self.choose(&clients, request, Some(failed)) else {
                return Err(original);
            };
            let client = Arc::clone(&clients[&name]);
            (name, client)
        };

        warn!(from = failed, to = %alternative, error = %original, "failing over");
        metrics::counter!(telemetry::FAILOVERS_TOTAL,
            "from" => failed.to_owned(),
            "to" => alternative.clone(),
        )
        .increment(1);

        let mut response = self.call(&alternative, client.as_ref(), request).await?;
        response.provider = alternative;
        Ok(response)
    }

    /// One provider call with telemetry.
    async fn call(
        &self,
        provider: &str,
        client: &dyn ModelClient,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse> {
        let start = Instant::now();
        let result = client.generate(request).await;
        let elapsed = start.elapsed();

        Self::record_request(provider, elapsed, result.is_ok());
        if let Ok(response) = &result {
            self.latency_for(provider).record(elapsed);
            Self::record_usage(provider, response);
        }
        result
    }

    /// Check every provider concurrently. `Ok(())` means healthy.
    pub async fn health_check(&self) -> HashMap<String, Result<()>> {
        let clients: Vec<(String, Arc<dyn ModelClient>)> = self
            .read_clients()
            .iter()
            .map(|(name, client)| (name.clone(), Arc::clone(client)))
            .collect();
        let checks = clients.into_iter().map(|(name, client)| async move {
            let result = client.health().await;
            (name, result)
        });
        join_all(checks).await.into_iter().collect()
    }

    /// Close every client and the shared cache.
    ///
    /// All are closed even if some fail; the last error is returned.
    pub async fn close(&self) -> Result<()> {
        let clients: Vec<Arc<dyn ModelClient>> = self.read_clients().values().cloned().collect();
        let mut last_err = None;
        for client in clients {
            if let Err(e) = client.close().await {
                warn!(provider = client.provider(), error = %e, "failed to close provider");
                last_err = Some(e);
            }
        }
        if let Some(cache) = &self.cache
            && let Err(e) = cache.close().await
        {
            warn!(error = %e, "failed to close cache");
            last_err = Some(e);
        }
        last_err.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn read_clients(&self) -> std::sync::RwLockReadGuard<'_, ClientMap> {
        self.clients.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn latency_for(&self, provider: &str) -> Arc<ProviderLatency> {
        if let Some(l) = self
            .latency
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(provider)
        {
            return Arc::clone(l);
        }
        let mut latency = self.latency.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(latency.entry(provider.to_string()).or_default())
    }

    fn record_request(provider: &str, elapsed: Duration, ok: bool) {
        let status = if ok { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "provider" => provider.to_owned(),
            "status" => status,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "provider" => provider.to_owned(),
        )
        .record(elapsed.as_secs_f64());
    }

    fn record_usage(provider: &str, response: &GenerateResponse) {
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "prompt",
        )
        .increment(u64::from(response.usage.prompt_tokens));
        metrics::counter!(telemetry::TOKENS_TOTAL,
            "provider" => provider.to_owned(),
            "direction" => "completion",
        )
        .increment(u64::from(response.usage.completion_tokens));
        metrics::histogram!(telemetry::REQUEST_COST_USD, "provider" => provider.to_owned())
            .record(response.usage.cost);
    }
}

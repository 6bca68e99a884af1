//! Cache-aside decorator over a [`ModelClient`].
//!
//! ```text
//! generate(req)
//!     │ key = cache.key_for(req)
//!     ▼
//!  cache.get(key) ── hit ──► cached=true, duration=0 ──► return
//!     │ miss
//!     ▼
//!  inner.generate(req) ──► cached=false, duration=elapsed ──► return
//!                              │
//!                              └─► (detached) cache.set(key, resp)
//! ```
//!
//! The write happens after the caller already has its response, so two
//! concurrent identical requests can both miss and both hit the provider.
//! Pending writes are tracked and awaited by [`CachedClient::close`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::metrics::{CacheMetrics, CacheMetricsSnapshot};
use super::response::{CacheStats, ResponseCache};
use crate::Result;
use crate::providers::ModelClient;
use crate::types::{ChunkStream, GenerateRequest, GenerateResponse};

/// Default pause between requests while warming.
pub const DEFAULT_WARM_PAUSE: Duration = Duration::from_millis(100);

/// Outcome of [`CachedClient::warm`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub warmed: usize,
    pub failed: usize,
}

/// A [`ModelClient`] that serves repeated requests from a [`ResponseCache`].
pub struct CachedClient {
    inner: Arc<dyn ModelClient>,
    cache: Arc<ResponseCache>,
    metrics: Arc<CacheMetrics>,
    enabled: bool,
    warm_pause: Duration,
    writes: TaskTracker,
}

impl CachedClient {
    pub fn new(inner: Arc<dyn ModelClient>, cache: Arc<ResponseCache>) -> Self {
        Self {
            inner,
            cache,
            metrics: Arc::new(CacheMetrics::new()),
            enabled: true,
            warm_pause: DEFAULT_WARM_PAUSE,
            writes: TaskTracker::new(),
        }
    }

    /// Turn caching on or off. Disabled clients pass every call through.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Share a metrics instance (e.g. across several cached clients).
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn warm_pause(mut self, pause: Duration) -> Self {
        self.warm_pause = pause;
        self
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn stats(&self) -> Result<CacheStats> {
        self.cache.stats().await
    }

    /// Remove every entry in the cache namespace.
    pub async fn clear(&self) -> Result<usize> {
        self.cache.clear().await
    }

    /// Drop the cached response for one request.
    pub async fn invalidate(&self, request: &GenerateRequest) -> Result<()> {
        self.cache.delete(&self.cache.key_for(request)).await
    }

    /// Populate the cache by running `requests` one at a time.
    ///
    /// Waits `warm_pause` between calls. Failures are logged and counted,
    /// never returned. Returns once every resulting cache write has landed.
    pub async fn warm(&self, requests: &[GenerateRequest]) -> WarmReport {
        let mut report = WarmReport::default();
        for (i, request) in requests.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.warm_pause).await;
            }
            match self.generate(request).await {
                Ok(_) => report.warmed += 1,
                Err(e) => {
                    warn!(provider = self.inner.provider(), error = %e, "cache warm request failed");
                    report.failed += 1;
                }
            }
        }
        self.drain_pending_writes().await;
        report
    }

    /// Wait for every detached cache write started so far.
    pub async fn drain_pending_writes(&self) {
        self.writes.close();
        self.writes.wait().await;
        self.writes.reopen();
    }

    fn persist(&self, key: String, response: GenerateResponse) {
        let cache = Arc::clone(&self.cache);
        self.writes.spawn(async move {
            if let Err(e) = cache.set(&key, &response).await {
                warn!(key = %key, error = %e, "failed to persist cached response");
            }
        });
    }
}

#[async_trait]
impl ModelClient for CachedClient {
    fn provider(&self) -> &str {
        self.inner.provider()
    }

    fn models(&self) -> Vec<String> {
        self.inner.models()
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        if !self.enabled {
            return self.inner.generate(request).await;
        }

        let key = self.cache.key_for(request);
        if let Some(hit) = self.cache.get(&key).await {
            self.metrics.record_hit();
            debug!(key = %key, "serving cached response");
            return Ok(hit.into_cached());
        }

        let start = Instant::now();
        let response = self.inner.generate(request).await?;
        let elapsed = start.elapsed();
        let response = response.into_fresh(elapsed);
        self.metrics.record_miss(elapsed);

        self.persist(key, response.clone());
        Ok(response)
    }

    /// Streams always go to the provider.
    async fn generate_stream(&self, request: &GenerateRequest) -> ChunkStream {
        self.inner.generate_stream(request).await
    }

    async fn health(&self) -> Result<()> {
        self.inner.health().await
    }

    /// Wait for pending cache writes, then close the inner client and cache.
    async fn close(&self) -> Result<()> {
        self.drain_pending_writes().await;
        let inner = self.inner.close().await;
        let cache = self.cache.close().await;
        inner.and(cache)
    }
}

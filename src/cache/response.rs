//! Response cache for generation results.
//!
//! [`ResponseCache`] stores serialized [`GenerateResponse`]s in a
//! [`ResponseStore`] under namespaced keys. It is an optimization layer:
//! every store operation is bounded by a short timeout, and a failed or
//! slow lookup is reported as a miss rather than an error.
//!
//! # Keys
//!
//! A key is `{namespace}:{sha256}` where the digest covers the fields that
//! change the output: prompt, system prompt, max tokens, temperature and
//! model. Metadata does not participate. A request carrying an explicit
//! `cache_key` uses `{namespace}:{cache_key}` instead. Sharing one prefix
//! lets [`stats`](ResponseCache::stats) and [`clear`](ResponseCache::clear)
//! enumerate exactly this cache's entries in a shared store.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::store::{MemoryStore, ResponseStore};
use crate::config::duration_secs;
use crate::telemetry;
use crate::types::{GenerateRequest, GenerateResponse};
use crate::{HuginnError, Result};

/// Number of entries read to estimate total cache size.
const STATS_SAMPLE_SIZE: usize = 100;

/// Configuration for the response cache.
///
/// ```rust
/// # use huginn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Whether caching is active. Default: true.
    pub enabled: bool,
    /// Maximum number of cached entries (in-memory store). Default: 10,000.
    pub max_entries: u64,
    /// Time-to-live for cached entries. Default: 1 hour.
    #[serde(rename = "ttl_secs", with = "duration_secs")]
    pub ttl: Duration,
    /// Store connection string. `None` or `memory://` selects the in-memory store.
    pub url: Option<String>,
    /// Key prefix shared by every entry. Default: "huginn".
    pub namespace: String,
    /// Upper bound on each store operation. Default: 5 seconds.
    #[serde(rename = "op_timeout_secs", with = "duration_secs")]
    pub op_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
            url: None,
            namespace: "huginn".to_string(),
            op_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: u64) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = timeout;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Reject connection strings no built-in store understands.
    pub fn validate(&self) -> Result<()> {
        match self.url.as_deref() {
            None | Some("") => Ok(()),
            Some(url) if url.starts_with("memory://") => Ok(()),
            Some(url) => Err(HuginnError::Configuration(format!(
                "unsupported cache url '{url}' (only memory:// is built in; \
                 use ResponseCache::with_store for external stores)"
            ))),
        }
    }
}

/// Inventory of the entries under this cache's namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub key_count: usize,
    /// Total size extrapolated from the sampled entries.
    pub estimated_size_bytes: u64,
    /// Number of entries actually read for the estimate.
    pub sampled: usize,
}

/// Namespaced, timeout-bounded cache of generation responses.
pub struct ResponseCache {
    store: Arc<dyn ResponseStore>,
    namespace: String,
    ttl: Duration,
    op_timeout: Duration,
}

impl ResponseCache {
    /// Create a cache on the store selected by `config.url`.
    pub fn new(config: &CacheConfig) -> Result<Self> {
        config.validate()?;
        let store: Arc<dyn ResponseStore> = Arc::new(MemoryStore::new(config.max_entries));
        Ok(Self::with_store(store, config))
    }

    /// Create a cache on a caller-supplied store.
    pub fn with_store(store: Arc<dyn ResponseStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            ttl: config.ttl,
            op_timeout: config.op_timeout,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The key `request` is stored under.
    pub fn key_for(&self, request: &GenerateRequest) -> String {
        cache_key(&self.namespace, request)
    }

    /// Look up a response. Store errors and timeouts count as a miss.
    pub async fn get(&self, key: &str) -> Option<GenerateResponse> {
        let found = match tokio::time::timeout(self.op_timeout, self.store.get(key)).await {
            Ok(Ok(Some(bytes))) => match serde_json::from_slice::<GenerateResponse>(&bytes) {
                Ok(response) => Some(response),
                Err(e) => {
                    warn!(key, error = %e, "discarding undecodable cache entry");
                    None
                }
            },
            Ok(Ok(None)) => None,
            Ok(Err(e)) => {
                warn!(key, error = %e, "cache lookup failed, treating as miss");
                None
            }
            Err(_) => {
                warn!(key, timeout = ?self.op_timeout, "cache lookup timed out, treating as miss");
                None
            }
        };

        if found.is_some() {
            metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
        } else {
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
        }
        found
    }

    /// Store a response under `key` with the configured TTL.
    pub async fn set(&self, key: &str, response: &GenerateResponse) -> Result<()> {
        let bytes = serde_json::to_vec(response)?;
        self.bounded(self.store.set(key, bytes, self.ttl)).await?;
        debug!(key, "cached response");
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.bounded(self.store.delete(key)).await
    }

    /// Count entries and estimate their size from a sample.
    pub async fn stats(&self) -> Result<CacheStats> {
        let keys = self.bounded(self.store.keys(&self.prefix())).await?;
        let mut sampled = 0;
        let mut sampled_bytes = 0u64;
        for key in keys.iter().take(STATS_SAMPLE_SIZE) {
            if let Some(bytes) = self.bounded(self.store.get(key)).await? {
                sampled += 1;
                sampled_bytes += bytes.len() as u64;
            }
        }
        let estimated_size_bytes = if sampled == 0 {
            0
        } else {
            sampled_bytes * keys.len() as u64 / sampled as u64
        };
        Ok(CacheStats {
            key_count: keys.len(),
            estimated_size_bytes,
            sampled,
        })
    }

    /// Delete every entry under the namespace. Returns the number removed.
    pub async fn clear(&self) -> Result<usize> {
        let keys = self.bounded(self.store.keys(&self.prefix())).await?;
        for key in &keys {
            self.bounded(self.store.delete(key)).await?;
        }
        debug!(namespace = %self.namespace, removed = keys.len(), "cleared cache");
        Ok(keys.len())
    }

    pub async fn close(&self) -> Result<()> {
        self.store.close().await
    }

    fn prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    async fn bounded<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.op_timeout, op)
            .await
            .map_err(|_| HuginnError::Cache(format!("operation timed out after {:?}", self.op_timeout)))?
    }
}

/// Derive the cache key for a request.
///
/// Fields are length-prefixed so no two distinct field tuples hash the
/// same input.
pub fn cache_key(namespace: &str, request: &GenerateRequest) -> String {
    if let Some(explicit) = request.cache_key.as_deref() {
        return format!("{namespace}:{explicit}");
    }

    let max_tokens = request.max_tokens.map_or_else(|| "none".to_string(), |n| n.to_string());
    let temperature = request
        .temperature
        .map_or_else(|| "none".to_string(), |t| t.to_bits().to_string());

    let mut hasher = Sha256::new();
    hash_field(&mut hasher, &request.prompt);
    hash_field(&mut hasher, request.system_prompt.as_deref().unwrap_or("\u{0}none"));
    hash_field(&mut hasher, &max_tokens);
    hash_field(&mut hasher, &temperature);
    hash_field(&mut hasher, &request.model);

    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{namespace}:{hex}")
}

fn hash_field(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u64).to_le_bytes());
    hasher.update(value.as_bytes());
}

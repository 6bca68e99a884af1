//! Response caching.
//!
//! - [`store`]: the [`ResponseStore`] TTL key-value contract and the
//!   moka-backed [`MemoryStore`].
//! - [`response`]: [`ResponseCache`], with key derivation, timeout-bounded
//!   operations, stats and bulk clear over a store.
//! - [`metrics`]: [`CacheMetrics`] hit/miss counters.
//! - [`client`]: [`CachedClient`], the cache-aside decorator over a
//!   [`ModelClient`](crate::ModelClient).
//!
//! The router also consults a shared [`ResponseCache`] directly for requests
//! carrying an explicit cache key; see [`ProviderRouter`](crate::ProviderRouter).

pub mod client;
pub mod metrics;
pub mod response;
pub mod store;

pub use client::{CachedClient, DEFAULT_WARM_PAUSE, WarmReport};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use response::{CacheConfig, CacheStats, ResponseCache, cache_key};
pub use store::{MemoryStore, ResponseStore};

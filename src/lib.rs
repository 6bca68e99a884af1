//! Huginn - request routing and resilience for LLM providers
//!
//! This crate sits between application code and hosted model APIs (Azure
//! OpenAI and AWS Bedrock). Every backend implements the [`ModelClient`]
//! trait; decorators and the [`ProviderRouter`] layer behaviour on top:
//!
//! - provider selection by metadata hint, prompt complexity and default
//! - one failover to a different provider on retryable errors
//! - response caching with TTL ([`ResponseCache`], [`CachedClient`])
//! - monthly spend tracking and admission control ([`BudgetTracker`])
//! - request coalescing ([`BatchClient`])
//!
//! # Example
//!
//! ```rust,no_run
//! use huginn::{Config, GenerateRequest, ProviderRouter};
//!
//! #[tokio::main]
//! async fn main() -> huginn::Result<()> {
//!     let config = Config::load(None)?;
//!     let router = ProviderRouter::from_config(&config)?;
//!
//!     let response = router
//!         .generate(&GenerateRequest::new("What is the capital of France?").max_tokens(64))
//!         .await?;
//!
//!     println!("{} ({}): {}", response.provider, response.model, response.content);
//!     router.close().await
//! }
//! ```
//!
//! # Caching a single client
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use huginn::{AzureClient, CacheConfig, CachedClient, ModelClient, ResponseCache};
//!
//! let azure = Arc::new(AzureClient::new(&azure_config)?);
//! let cache = Arc::new(ResponseCache::new(&CacheConfig::default())?);
//! let client = CachedClient::new(azure, cache);
//!
//! let first = client.generate(&request).await?; // provider call
//! let second = client.generate(&request).await?; // served from cache
//! assert!(second.cached);
//! ```

pub mod batch;
pub mod budget;
pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;
pub mod providers;
pub mod router;
pub mod telemetry;
pub mod types;

// Re-export main types at crate root
pub use batch::{BatchClient, BatchConfig};
pub use budget::{BudgetConfig, BudgetStatus, BudgetTracker, MonthlyUsage};
pub use cache::{CacheConfig, CacheMetrics, CachedClient, ResponseCache};
pub use config::Config;
pub use error::{ErrorCode, HuginnError, Result};
pub use providers::{AzureClient, BedrockClient, ModelClient};
pub use router::{
    ComparisonResult, ProviderRouter, RouterBuilder, RoutingConfig, TaskComplexity,
    analyze_task_complexity,
};
pub use types::{
    ChunkStream, GenerateRequest, GenerateResponse, RequestMetadata, StreamChunk, Usage,
};

//! Router construction, programmatic or from [`Config`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use super::{ProviderRouter, RoutingConfig};
use crate::batch::BatchClient;
use crate::budget::BudgetTracker;
use crate::cache::ResponseCache;
use crate::config::Config;
use crate::providers::{AzureClient, BedrockClient, ModelClient};
use crate::{HuginnError, Result};

/// Builder for [`ProviderRouter`].
///
/// ```rust,ignore
/// let router = ProviderRouter::builder()
///     .client(Arc::new(AzureClient::new(&azure)?))
///     .client(Arc::new(BedrockClient::new(&bedrock)?))
///     .default_provider("azure")
///     .budget(Arc::new(BudgetTracker::new(BudgetConfig::default())))
///     .build()?;
/// ```
#[derive(Default)]
pub struct RouterBuilder {
    clients: Vec<Arc<dyn ModelClient>>,
    cache: Option<Arc<ResponseCache>>,
    budget: Option<Arc<BudgetTracker>>,
    default_provider: Option<String>,
    routing: RoutingConfig,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. A later client with the same provider name
    /// replaces an earlier one.
    pub fn client(mut self, client: Arc<dyn ModelClient>) -> Self {
        self.clients.push(client);
        self
    }

    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn budget(mut self, budget: Arc<BudgetTracker>) -> Self {
        self.budget = Some(budget);
        self
    }

    pub fn default_provider(mut self, provider: impl Into<String>) -> Self {
        self.default_provider = Some(provider.into());
        self
    }

    pub fn routing(mut self, routing: RoutingConfig) -> Self {
        self.routing = routing;
        self
    }

    /// Build the router. Fails with `NoProvider` when no client was added.
    pub fn build(self) -> Result<ProviderRouter> {
        if self.clients.is_empty() {
            return Err(HuginnError::NoProvider);
        }
        let clients: BTreeMap<String, Arc<dyn ModelClient>> = self
            .clients
            .into_iter()
            .map(|c| (c.provider().to_string(), c))
            .collect();

        Ok(ProviderRouter {
            clients: RwLock::new(clients),
            cache: self.cache,
            budget: self.budget,
            default_provider: self.default_provider,
            routing: self.routing,
            latency: RwLock::new(HashMap::new()),
        })
    }
}

impl ProviderRouter {
    /// Build a router from validated configuration.
    ///
    /// Providers whose section is missing or incomplete are skipped; only
    /// an empty result is an error. When batching is enabled each client is
    /// wrapped in a [`BatchClient`], whose worker needs a tokio runtime;
    /// without one this fails with `Configuration`.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        if config.batch.enabled && tokio::runtime::Handle::try_current().is_err() {
            return Err(HuginnError::Configuration(
                "batching requires a tokio runtime".to_string(),
            ));
        }

        let mut clients: Vec<Arc<dyn ModelClient>> = Vec::new();
        if let Some(azure) = config.providers.azure.as_ref().filter(|c| c.is_usable()) {
            match AzureClient::new(azure) {
                Ok(client) => clients.push(Arc::new(client)),
                Err(e) => warn!(provider = "azure", error = %e, "skipping provider"),
            }
        }
        if let Some(bedrock) = config.providers.bedrock.as_ref().filter(|c| c.is_usable()) {
            match BedrockClient::new(bedrock) {
                Ok(client) => clients.push(Arc::new(client)),
                Err(e) => warn!(provider = "bedrock", error = %e, "skipping provider"),
            }
        }
        if clients.is_empty() {
            return Err(HuginnError::Configuration(
                "no usable providers configured".to_string(),
            ));
        }

        let mut builder = RouterBuilder::new()
            .default_provider(config.default_provider.clone())
            .routing(config.routing.clone())
            .budget(Arc::new(BudgetTracker::new(config.budget.clone())));
        if config.cache.enabled {
            builder = builder.cache(Arc::new(ResponseCache::new(&config.cache)?));
        }
        for client in clients {
            let client: Arc<dyn ModelClient> = if config.batch.enabled {
                Arc::new(BatchClient::new(client, config.batch.clone()))
            } else {
                client
            };
            builder = builder.client(client);
        }

        let router = builder.build()?;
        info!(providers = ?router.providers(), default = %config.default_provider, "router ready");
        Ok(router)
    }
}

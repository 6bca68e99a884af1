//! Side-by-side generation across several providers.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use tracing::instrument;

use super::ProviderRouter;
use crate::HuginnError;
use crate::types::{GenerateRequest, GenerateResponse};

/// Per-provider outcomes of [`ProviderRouter::generate_with_comparison`].
///
/// Every requested provider appears in exactly one of the two maps.
#[derive(Debug, Clone, Default)]
pub struct ComparisonResult {
    pub responses: BTreeMap<String, GenerateResponse>,
    pub errors: BTreeMap<String, HuginnError>,
}

impl ComparisonResult {
    /// Success with the most content (by characters).
    pub fn longest(&self) -> Option<&GenerateResponse> {
        self.responses
            .values()
            .max_by_key(|r| r.content.chars().count())
    }

    /// Success with the shortest provider duration.
    pub fn fastest(&self) -> Option<&GenerateResponse> {
        self.responses.values().min_by_key(|r| r.duration)
    }

    /// Success with the lowest cost.
    pub fn cheapest(&self) -> Option<&GenerateResponse> {
        self.responses
            .values()
            .min_by(|a, b| a.usage.cost.total_cmp(&b.usage.cost))
    }
}

impl ProviderRouter {
    /// Send the same request to each named provider concurrently.
    ///
    /// Never fails as a whole: unknown providers and failed calls land in
    /// [`ComparisonResult::errors`]. Usage is tracked for every success. No
    /// budget check, cache or failover applies.
    #[instrument(skip(self, request), fields(providers = ?providers))]
    pub async fn generate_with_comparison(
        &self,
        request: &GenerateRequest,
        providers: &[&str],
    ) -> ComparisonResult {
        let calls = providers.iter().map(|name| async move {
            let name = (*name).to_string();
            let Some(client) = self.client(&name) else {
                let err = HuginnError::UnknownProvider(name.clone());
                return (name, Err(err));
            };
            let request = request.clone();
            let result = self.call(&name, Arc::as_ref(&client), &request).await;
            (name, result)
        });

        let mut outcome = ComparisonResult::default();
        for (name, result) in join_all(calls).await {
            match result {
                Ok(response) => {
                    if let Some(budget) = &self.budget {
                        budget.track_usage(&response).await;
                    }
                    outcome.responses.insert(name, response);
                }
                Err(e) => {
                    outcome.errors.insert(name, e);
                }
            }
        }
        outcome
    }
}

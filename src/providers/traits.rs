//! The provider-neutral model client contract.
//!
//! Every backend (and every decorator wrapping one) implements
//! [`ModelClient`]. Decorators hold an `Arc<dyn ModelClient>` and forward
//! whatever they do not change, so they stack in any order:
//!
//! ```text
//! BatchClient ─► CachedClient ─► AzureClient
//! ```
//!
//! # Errors
//!
//! Implementations report failures as [`HuginnError::Provider`] tagged with
//! their own provider name and an [`ErrorCode`](crate::ErrorCode). The code's
//! retryable flag is what the router looks at when deciding to fail over.
//!
//! [`HuginnError::Provider`]: crate::HuginnError::Provider

use async_trait::async_trait;

use super::stream;
use crate::Result;
use crate::types::{ChunkStream, GenerateRequest, GenerateResponse};

/// A client for one LLM provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Short symbolic provider name (e.g. "azure").
    fn provider(&self) -> &str;

    /// Model names this client can resolve.
    fn models(&self) -> Vec<String>;

    /// Run one generation call.
    ///
    /// An empty `request.model` selects the client's default model.
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Stream a generation.
    ///
    /// The default implementation makes one full [`generate`](Self::generate)
    /// call and replays the content in fixed-size pieces. A failed call
    /// yields a single error chunk.
    async fn generate_stream(&self, request: &GenerateRequest) -> ChunkStream {
        stream::emulate(self.generate(request).await)
    }

    /// Check that the provider is reachable and credentials are accepted.
    ///
    /// Default: a minimal one-token request against the default model.
    async fn health(&self) -> Result<()> {
        let probe = GenerateRequest::new("ping").max_tokens(1);
        self.generate(&probe).await.map(|_| ())
    }

    /// Release resources. Calls made after `close` fail with `ProviderDown`.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

//! Azure OpenAI chat-completions client.
//!
//! Models are addressed through deployments:
//! `POST {endpoint}/openai/deployments/{deployment}/chat/completions?api-version={v}`.
//! The configured deployment map resolves model names to deployment names.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::traits::ModelClient;
use crate::config::{AzureConfig, required};
use crate::pricing;
use crate::types::{GenerateRequest, GenerateResponse, Usage};
use crate::{ErrorCode, HuginnError, Result};

/// Client for Azure OpenAI deployments.
pub struct AzureClient {
    api_key: String,
    endpoint: String,
    api_version: String,
    default_model: String,
    deployments: HashMap<String, String>,
    http: Client,
    closed: AtomicBool,
}

impl AzureClient {
    pub const NAME: &'static str = "azure";

    /// Create a client from its config section.
    ///
    /// Fails with `Configuration` when the API key or endpoint is missing.
    pub fn new(config: &AzureConfig) -> Result<Self> {
        let api_key = required(config.api_key.as_deref(), "api_key")?;
        let endpoint = required(config.endpoint.as_deref(), "endpoint")?;
        let http = http::build_client(Self::NAME, Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            api_key,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            default_model: config.default_model.clone(),
            deployments: config.deployments.clone(),
            http,
            closed: AtomicBool::new(false),
        })
    }

    /// Resolve a model name to `(model, deployment)`.
    ///
    /// Accepts a mapped model name or a deployment name used directly.
    fn resolve(&self, model: &str) -> Result<(String, String)> {
        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };
        if let Some(deployment) = self.deployments.get(model) {
            return Ok((model.to_string(), deployment.clone()));
        }
        if self.deployments.values().any(|d| d == model) {
            return Ok((model.to_string(), model.to_string()));
        }
        Err(HuginnError::provider(
            ErrorCode::InvalidModel,
            Self::NAME,
            format!("no deployment configured for model '{model}'"),
        ))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HuginnError::provider(
                ErrorCode::ProviderDown,
                Self::NAME,
                "client is closed",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ModelClient for AzureClient {
    fn provider(&self) -> &str {
        Self::NAME
    }

    fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.deployments.keys().cloned().collect();
        models.sort();
        models
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.ensure_open()?;
        let (model, deployment) = self.resolve(&request.model)?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint, deployment, self.api_version
        );

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.prompt,
        });

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .header("api-key", &self.api_key)
            .json(&ChatRequest {
                messages,
                max_tokens: request.max_tokens,
                temperature: request.temperature,
            })
            .send()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let response = http::check_response(Self::NAME, response, None).await?;
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        let usage = body.usage.unwrap_or_default();
        let cost = pricing::calculate_cost(
            Self::NAME,
            &model,
            usage.prompt_tokens,
            usage.completion_tokens,
        );
        debug!(
            deployment = %deployment,
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "azure completion"
        );

        Ok(GenerateResponse {
            content,
            model,
            provider: Self::NAME.to_string(),
            usage: Usage::new(usage.prompt_tokens, usage.completion_tokens, cost),
            cached: false,
            duration: start.elapsed(),
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

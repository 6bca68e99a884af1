//! Amazon Bedrock runtime client for Anthropic models.
//!
//! Uses Bedrock API-key auth (bearer token) and the `InvokeModel` route:
//! `POST {base}/model/{model_id}/invoke` with an Anthropic messages body.
//! Failures carry their type in the `x-amzn-ErrorType` header.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::http;
use super::traits::ModelClient;
use crate::config::{BedrockConfig, required};
use crate::pricing;
use crate::types::{GenerateRequest, GenerateResponse, Usage};
use crate::{ErrorCode, HuginnError, Result};

const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

/// Response header carrying the Bedrock error type.
const ERROR_TYPE_HEADER: &str = "x-amzn-ErrorType";

/// Output token cap when the request does not set one. Bedrock requires it.
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Client for the Bedrock runtime.
pub struct BedrockClient {
    api_key: String,
    base_url: String,
    default_model: String,
    models: HashMap<String, String>,
    http: Client,
    closed: AtomicBool,
}

impl BedrockClient {
    pub const NAME: &'static str = "bedrock";

    /// Create a client from its config section.
    ///
    /// The base URL is the configured endpoint, or the regional runtime
    /// endpoint derived from `region`.
    pub fn new(config: &BedrockConfig) -> Result<Self> {
        let api_key = required(config.api_key.as_deref(), "api_key")?;
        let base_url = match (config.endpoint.as_deref(), config.region.as_deref()) {
            (Some(endpoint), _) if !endpoint.is_empty() => endpoint.trim_end_matches('/').to_string(),
            (_, Some(region)) if !region.is_empty() => {
                format!("https://bedrock-runtime.{region}.amazonaws.com")
            }
            _ => {
                return Err(HuginnError::Configuration(
                    "missing required field 'region'".to_string(),
                ));
            }
        };
        let http = http::build_client(Self::NAME, Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            api_key,
            base_url,
            default_model: config.default_model.clone(),
            models: config.models.clone(),
            http,
            closed: AtomicBool::new(false),
        })
    }

    /// Resolve a model name to `(model, model_id)`.
    ///
    /// Accepts a mapped model name, a configured model id, or any fully
    /// qualified id (`vendor.model...`).
    fn resolve(&self, model: &str) -> Result<(String, String)> {
        let model = if model.is_empty() {
            self.default_model.as_str()
        } else {
            model
        };
        if let Some(id) = self.models.get(model) {
            return Ok((model.to_string(), id.clone()));
        }
        if self.models.values().any(|id| id == model) || model.contains('.') {
            return Ok((model.to_string(), model.to_string()));
        }
        Err(HuginnError::provider(
            ErrorCode::InvalidModel,
            Self::NAME,
            format!("no model id configured for '{model}'"),
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
impl ModelClient for BedrockClient {
    fn provider(&self) -> &str {
        Self::NAME
    }

    fn models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.models.keys().cloned().collect();
        models.sort();
        models
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        self.ensure_open()?;
        let (model, model_id) = self.resolve(&request.model)?;
        let url = format!("{}/model/{}/invoke", self.base_url, model_id);

        let body = InvokeRequest {
            anthropic_version: ANTHROPIC_VERSION,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            system: request.system_prompt.as_deref(),
            temperature: request.temperature,
            messages: vec![InvokeMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let start = Instant::now();
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let response = http::check_response(Self::NAME, response, Some(ERROR_TYPE_HEADER)).await?;
        let body: InvokeResponse = response
            .json()
            .await
            .map_err(|e| http::transport_error(Self::NAME, e))?;

        let content: String = body
            .content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect();
        let usage = body.usage.unwrap_or_default();
        let cost = pricing::calculate_cost(
            Self::NAME,
            &model_id,
            usage.input_tokens,
            usage.output_tokens,
        );
        debug!(
            model_id = %model_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "bedrock invocation"
        );

        Ok(GenerateResponse {
            content,
            model,
            provider: Self::NAME.to_string(),
            usage: Usage::new(usage.input_tokens, usage.output_tokens, cost),
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
struct InvokeRequest<'a> {
    anthropic_version: &'static str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    messages: Vec<InvokeMessage<'a>>,
}

#[derive(Serialize)]
struct InvokeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct InvokeResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    usage: Option<InvokeUsage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

#[derive(Deserialize, Default)]
struct InvokeUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

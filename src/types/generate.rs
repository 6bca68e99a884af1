//! Request types for text generation.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Maximum number of opaque pass-through entries on [`RequestMetadata`].
pub const MAX_EXTRA_METADATA: usize = 16;

/// A provider-neutral generation request.
///
/// ```rust
/// # use huginn::GenerateRequest;
/// let req = GenerateRequest::new("Summarize this paragraph")
///     .model("gpt-4o")
///     .max_tokens(256)
///     .temperature(0.2)
///     .provider("azure");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,

    /// Model name. Empty means the provider's default model.
    #[serde(default)]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    #[serde(default)]
    pub metadata: RequestMetadata,

    /// Explicit cache key. Overrides the derived key when set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_key: Option<String>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Pin the request to a provider, bypassing complexity-based selection.
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.metadata.provider = Some(provider.into());
        self
    }

    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    pub fn metadata(mut self, metadata: RequestMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Routing hints and caller context attached to a request.
///
/// Known hints are typed fields. Anything else goes in a bounded string map
/// of at most [`MAX_EXTRA_METADATA`] entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetadata {
    /// Preferred provider name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Caller task label (e.g. "planner", "codegen").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "BTreeMap::is_empty",
        deserialize_with = "bounded_extra"
    )]
    extra: BTreeMap<String, String>,
}

impl RequestMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Insert an opaque entry.
    ///
    /// Returns `false` (and stores nothing) when the map is full and `key`
    /// is not already present.
    pub fn insert_extra(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        if !self.extra.contains_key(&key) && self.extra.len() >= MAX_EXTRA_METADATA {
            return false;
        }
        self.extra.insert(key, value.into());
        true
    }

    pub fn extra(&self, key: &str) -> Option<&str> {
        self.extra.get(key).map(String::as_str)
    }

    pub fn extra_len(&self) -> usize {
        self.extra.len()
    }
}

fn bounded_extra<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let map = BTreeMap::<String, String>::deserialize(deserializer)?;
    if map.len() > MAX_EXTRA_METADATA {
        return Err(serde::de::Error::custom(format!(
            "metadata holds {} extra entries, at most {MAX_EXTRA_METADATA} allowed",
            map.len()
        )));
    }
    Ok(map)
}

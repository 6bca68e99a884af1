//! Layered configuration.
//!
//! Values are resolved in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. A TOML file: the explicit path if given, else `~/.huginn/config.toml`,
//!    else `/etc/huginn/config.toml` (no file at all means defaults only)
//! 3. Environment variables (see [`ENV_VARS`])
//!
//! The result is validated before use.
//!
//! ```toml
//! default_provider = "azure"
//!
//! [providers.azure]
//! endpoint = "https://my-resource.openai.azure.com"
//! default_model = "gpt-4o"
//! deployments = { "gpt-4o" = "gpt4o-prod", "gpt-4o-mini" = "gpt4o-mini" }
//!
//! [providers.bedrock]
//! region = "us-east-1"
//! default_model = "claude-3-haiku"
//! models = { "claude-3-haiku" = "anthropic.claude-3-haiku-20240307-v1:0" }
//!
//! [cache]
//! ttl_secs = 3600
//!
//! [budget]
//! monthly_limit = 250.0
//! alert_threshold = 0.9
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::batch::BatchConfig;
use crate::budget::BudgetConfig;
use crate::cache::CacheConfig;
use crate::providers::http::DEFAULT_TIMEOUT;
use crate::router::RoutingConfig;
use crate::{HuginnError, Result};

/// Environment variables read by [`Config::apply_env`].
pub const ENV_VARS: &[&str] = &[
    "HUGINN_DEFAULT_PROVIDER",
    "AZURE_OPENAI_API_KEY",
    "AZURE_OPENAI_ENDPOINT",
    "AZURE_OPENAI_API_VERSION",
    "AWS_BEARER_TOKEN_BEDROCK",
    "AWS_REGION",
    "HUGINN_CACHE_ENABLED",
    "HUGINN_CACHE_TTL_SECS",
    "HUGINN_CACHE_URL",
    "HUGINN_BUDGET_MONTHLY_LIMIT",
    "HUGINN_BUDGET_ALERT_THRESHOLD",
    "HUGINN_BUDGET_TRACKING",
];

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Provider used when routing has no better choice. Default: "azure".
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_provider: default_provider(),
            providers: ProvidersConfig::default(),
            cache: CacheConfig::default(),
            budget: BudgetConfig::default(),
            batch: BatchConfig::default(),
            routing: RoutingConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

fn default_provider() -> String {
    "azure".to_string()
}

/// Per-provider sections. Absent sections are not configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub azure: Option<AzureConfig>,
    pub bedrock: Option<BedrockConfig>,
}

/// Azure OpenAI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub api_key: Option<String>,
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: Option<String>,
    #[serde(default = "default_azure_api_version")]
    pub api_version: String,
    #[serde(default = "default_azure_model")]
    pub default_model: String,
    /// Model name to deployment name.
    #[serde(default)]
    pub deployments: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AzureConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: None,
            api_version: default_azure_api_version(),
            default_model: default_azure_model(),
            deployments: HashMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl AzureConfig {
    /// Names of required fields that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.api_key) {
            missing.push("api_key");
        }
        if is_blank(&self.endpoint) {
            missing.push("endpoint");
        }
        missing
    }

    pub fn is_usable(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

fn default_azure_api_version() -> String {
    "2024-02-01".to_string()
}

fn default_azure_model() -> String {
    "gpt-4o".to_string()
}

/// Bedrock runtime connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BedrockConfig {
    /// Bedrock API key (bearer token).
    pub api_key: Option<String>,
    pub region: Option<String>,
    /// Overrides the regional runtime endpoint.
    pub endpoint: Option<String>,
    #[serde(default = "default_bedrock_model")]
    pub default_model: String,
    /// Model name to Bedrock model id.
    #[serde(default)]
    pub models: HashMap<String, String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BedrockConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            region: None,
            endpoint: None,
            default_model: default_bedrock_model(),
            models: HashMap::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl BedrockConfig {
    /// Names of required fields that are missing or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if is_blank(&self.api_key) {
            missing.push("api_key");
        }
        if is_blank(&self.region) && is_blank(&self.endpoint) {
            missing.push("region");
        }
        missing
    }

    pub fn is_usable(&self) -> bool {
        self.missing_fields().is_empty()
    }
}

fn default_bedrock_model() -> String {
    "claude-3-haiku".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// Rate-limit settings. Parsed and carried, not enforced by this crate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: Option<u32>,
    pub tokens_per_minute: Option<u32>,
}

impl Config {
    /// Load from the standard locations, apply the environment and validate.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided; must exist)
    /// 2. `~/.huginn/config.toml`
    /// 3. `/etc/huginn/config.toml`
    /// 4. Built-in defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::resolve_config_path(explicit_path)? {
            Some(path) => Self::from_file(&path)?,
            None => {
                debug!("no config file found, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file without applying the environment or validating.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HuginnError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        toml::from_str(&content).map_err(|e| {
            HuginnError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })
    }

    fn resolve_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(Some(path.to_path_buf()));
            }
            return Err(HuginnError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".huginn").join("config.toml");
            if user_config.exists() {
                return Ok(Some(user_config));
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/huginn/config.toml");
        if system_config.exists() {
            return Ok(Some(system_config));
        }

        Ok(None)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup` (an environment stand-in).
    ///
    /// Unparseable numeric or boolean values are ignored with a debug log,
    /// leaving the file value in place.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("HUGINN_DEFAULT_PROVIDER") {
            self.default_provider = v;
        }

        let azure_key = get("AZURE_OPENAI_API_KEY");
        let azure_endpoint = get("AZURE_OPENAI_ENDPOINT");
        let azure_version = get("AZURE_OPENAI_API_VERSION");
        if azure_key.is_some() || azure_endpoint.is_some() || azure_version.is_some() {
            let azure = self.providers.azure.get_or_insert_with(AzureConfig::default);
            if azure_key.is_some() {
                azure.api_key = azure_key;
            }
            if azure_endpoint.is_some() {
                azure.endpoint = azure_endpoint;
            }
            if let Some(v) = azure_version {
                azure.api_version = v;
            }
        }

        let bedrock_key = get("AWS_BEARER_TOKEN_BEDROCK");
        let region = get("AWS_REGION");
        if bedrock_key.is_some() || region.is_some() {
            let bedrock = self.providers.bedrock.get_or_insert_with(BedrockConfig::default);
            if bedrock_key.is_some() {
                bedrock.api_key = bedrock_key;
            }
            if region.is_some() {
                bedrock.region = region;
            }
        }

        if let Some(v) = parsed(&get, "HUGINN_CACHE_ENABLED", parse_bool) {
            self.cache.enabled = v;
        }
        if let Some(v) = parsed(&get, "HUGINN_CACHE_TTL_SECS", |s| s.parse::<u64>().ok()) {
            self.cache.ttl = std::time::Duration::from_secs(v);
        }
        if let Some(v) = get("HUGINN_CACHE_URL") {
            self.cache.url = Some(v);
        }
        if let Some(v) = parsed(&get, "HUGINN_BUDGET_MONTHLY_LIMIT", |s| s.parse::<f64>().ok()) {
            self.budget.monthly_limit = v;
        }
        if let Some(v) = parsed(&get, "HUGINN_BUDGET_ALERT_THRESHOLD", |s| s.parse::<f64>().ok()) {
            self.budget.alert_threshold = v;
        }
        if let Some(v) = parsed(&get, "HUGINN_BUDGET_TRACKING", parse_bool) {
            self.budget.tracking_enabled = v;
        }
    }

    /// Providers with every required field present, sorted by name.
    pub fn usable_providers(&self) -> Vec<&'static str> {
        let mut usable = Vec::new();
        if self.providers.azure.as_ref().is_some_and(AzureConfig::is_usable) {
            usable.push("azure");
        }
        if self.providers.bedrock.as_ref().is_some_and(BedrockConfig::is_usable) {
            usable.push("bedrock");
        }
        usable
    }

    /// Check the configuration is usable.
    ///
    /// Rejects: no usable provider, a default provider that is unknown or
    /// missing required fields, a negative budget limit, an alert threshold
    /// outside `[0, 1]`, and an unsupported cache URL.
    pub fn validate(&self) -> Result<()> {
        if self.usable_providers().is_empty() {
            return Err(HuginnError::Configuration(
                "no usable providers configured".to_string(),
            ));
        }

        let missing = match self.default_provider.as_str() {
            "azure" => self.providers.azure.as_ref().map(AzureConfig::missing_fields),
            "bedrock" => self.providers.bedrock.as_ref().map(BedrockConfig::missing_fields),
            other => {
                return Err(HuginnError::Configuration(format!(
                    "unknown default provider '{other}'"
                )));
            }
        };
        match missing {
            None => {
                return Err(HuginnError::Configuration(format!(
                    "default provider '{}' is not configured",
                    self.default_provider
                )));
            }
            Some(fields) if !fields.is_empty() => {
                return Err(HuginnError::Configuration(format!(
                    "default provider '{}' is missing required fields: {}",
                    self.default_provider,
                    fields.join(", ")
                )));
            }
            Some(_) => {}
        }

        self.budget.validate()?;
        self.cache.validate()?;
        self.batch.validate()?;
        Ok(())
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parsed<T>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let raw = get(key)?;
    let value = parse(&raw);
    if value.is_none() {
        debug!(key, value = %raw, "ignoring unparseable environment value");
    }
    value
}

/// Missing or empty required string.
pub(crate) fn required(value: Option<&str>, field: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.to_string()),
        _ => Err(HuginnError::Configuration(format!(
            "missing required field '{field}'"
        ))),
    }
}

/// Serde adapter: `Duration` as whole seconds.
pub(crate) mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Serde adapter: `Duration` as whole milliseconds.
pub(crate) mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

//! Huginn error types

use std::fmt;

/// Failure category reported by a provider call.
///
/// Every provider error is tagged with one of these codes. The code decides
/// whether the router may fail over to another provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    RateLimit,
    QuotaExceeded,
    InvalidModel,
    BadRequest,
    Unauthorized,
    ProviderDown,
    Timeout,
    NetworkError,
    HttpError,
    Unknown,
}

impl ErrorCode {
    /// Whether a failure with this code is transient.
    ///
    /// Validation, auth and quota failures are permanent; everything else may
    /// succeed on another attempt or another provider.
    pub fn is_retryable(self) -> bool {
        match self {
            Self::RateLimit
            | Self::ProviderDown
            | Self::Timeout
            | Self::NetworkError
            | Self::HttpError
            | Self::Unknown => true,
            Self::QuotaExceeded | Self::InvalidModel | Self::BadRequest | Self::Unauthorized => {
                false
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::QuotaExceeded => "quota_exceeded",
            Self::InvalidModel => "invalid_model",
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::ProviderDown => "provider_down",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::HttpError => "http_error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Huginn error types
#[derive(Debug, Clone, thiserror::Error)]
pub enum HuginnError {
    /// A provider call (or a check made on its behalf) failed.
    #[error("{provider}: {code}: {message}")]
    Provider {
        code: ErrorCode,
        provider: String,
        message: String,
        retryable: bool,
    },

    // Routing errors
    #[error("no provider available")]
    NoProvider,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    /// The caller gave up before a result was produced.
    #[error("request cancelled")]
    Cancelled,

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),

    // Cache store errors (absorbed by the cache layer, surfaced only by stores)
    #[error("cache error: {0}")]
    Cache(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for HuginnError {
    fn from(err: serde_json::Error) -> Self {
        HuginnError::Json(err.to_string())
    }
}

impl HuginnError {
    /// Build a provider error whose retryable flag follows the code.
    pub fn provider(code: ErrorCode, provider: impl Into<String>, message: impl Into<String>) -> Self {
        HuginnError::Provider {
            code,
            provider: provider.into(),
            message: message.into(),
            retryable: code.is_retryable(),
        }
    }

    /// Budget admission rejection. Never retryable.
    pub fn quota_exceeded(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::provider(ErrorCode::QuotaExceeded, provider, message)
    }

    /// The error code, if this is a provider error.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            HuginnError::Provider { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Whether the router may fail over after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HuginnError::Provider { retryable: true, .. })
    }

    /// Name of the provider the error originated from.
    pub fn provider_name(&self) -> Option<&str> {
        match self {
            HuginnError::Provider { provider, .. } => Some(provider),
            _ => None,
        }
    }

    /// Human-readable detail without the code/provider prefix.
    pub fn message(&self) -> String {
        match self {
            HuginnError::Provider { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for Huginn operations
pub type Result<T> = std::result::Result<T, HuginnError>;

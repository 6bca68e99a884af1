//! Shared HTTP plumbing for the provider adapters.
//!
//! Both backends speak JSON over HTTPS but report failures differently:
//! Azure puts an `error.code` in the body, Bedrock sets the
//! `x-amzn-ErrorType` header. Everything funnels into [`classify`] so the
//! taxonomy is decided in one place.

use std::time::Duration;

use reqwest::{Client, Response};

use crate::{ErrorCode, HuginnError, Result};

/// Default per-request timeout for provider HTTP calls.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the HTTP client used by an adapter.
pub(crate) fn build_client(provider: &str, timeout: Duration) -> Result<Client> {
    Client::builder().timeout(timeout).build().map_err(|e| {
        HuginnError::Configuration(format!("{provider}: failed to build HTTP client: {e}"))
    })
}

/// Map a transport-level failure (no HTTP status) to a provider error.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> HuginnError {
    let code = if err.is_timeout() {
        ErrorCode::Timeout
    } else if err.is_connect() || err.is_request() {
        ErrorCode::NetworkError
    } else if let Some(status) = err.status() {
        classify(status.as_u16(), None)
    } else {
        ErrorCode::Unknown
    };
    HuginnError::provider(code, provider, err.to_string())
}

/// Pick an error code from an HTTP status and an optional vendor error type.
///
/// The vendor type wins when it is recognised, since some throttling and
/// validation failures arrive with a generic status.
pub fn classify(status: u16, error_type: Option<&str>) -> ErrorCode {
    if let Some(code) = error_type.and_then(classify_error_type) {
        return code;
    }
    match status {
        400 | 422 => ErrorCode::BadRequest,
        401 | 403 => ErrorCode::Unauthorized,
        404 => ErrorCode::InvalidModel,
        408 => ErrorCode::Timeout,
        429 => ErrorCode::RateLimit,
        500..=599 => ErrorCode::HttpError,
        _ => ErrorCode::Unknown,
    }
}

fn classify_error_type(error_type: &str) -> Option<ErrorCode> {
    // "ThrottlingException:http://internal.amazon.com/..." -> "throttlingexception"
    let name = error_type
        .split(':')
        .next()
        .unwrap_or(error_type)
        .to_ascii_lowercase();
    let code = match name.as_str() {
        n if n.contains("throttl") || n.contains("toomanyrequests") || n == "429" => {
            ErrorCode::RateLimit
        }
        n if n.contains("quota") => ErrorCode::RateLimit,
        n if n.contains("validation") || n == "invalid_request_error" => ErrorCode::BadRequest,
        n if n.contains("accessdenied")
            || n.contains("unrecognizedclient")
            || n.contains("expiredtoken")
            || n == "401"
            || n == "invalidapikey" =>
        {
            ErrorCode::Unauthorized
        }
        n if n.contains("modeltimeout") || n == "timeout" => ErrorCode::Timeout,
        n if n.contains("deploymentnotfound") || n.contains("resourcenotfound") => {
            ErrorCode::InvalidModel
        }
        _ => return None,
    };
    Some(code)
}

/// Pass a successful response through; turn anything else into an error.
///
/// Reads the error type from `error_type_header` when given, otherwise from
/// the JSON body (`error.code` or `__type`), and the message from
/// `error.message` or `message`.
pub(crate) async fn check_response(
    provider: &str,
    response: Response,
    error_type_header: Option<&str>,
) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let header_type = error_type_header
        .and_then(|h| response.headers().get(h))
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = response.text().await.unwrap_or_default();
    let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();

    let body_type = parsed.as_ref().and_then(|v| {
        v.pointer("/error/code")
            .or_else(|| v.get("__type"))
            .and_then(|c| match c {
                serde_json::Value::String(s) => Some(s.clone()),
                serde_json::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
    });
    let message = parsed
        .as_ref()
        .and_then(|v| {
            v.pointer("/error/message")
                .or_else(|| v.get("message"))
                .or_else(|| v.get("Message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                body.clone()
            }
        });

    let error_type = header_type.or(body_type);
    let code = classify(status.as_u16(), error_type.as_deref());
    Err(HuginnError::provider(
        code,
        provider,
        format!("HTTP {}: {message}", status.as_u16()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(classify(401, None), ErrorCode::Unauthorized);
        assert_eq!(classify(403, None), ErrorCode::Unauthorized);
        assert_eq!(classify(429, None), ErrorCode::RateLimit);
        assert_eq!(classify(400, None), ErrorCode::BadRequest);
        assert_eq!(classify(502, None), ErrorCode::HttpError);
        assert_eq!(classify(418, None), ErrorCode::Unknown);
    }

    #[test]
    fn vendor_type_overrides_status() {
        assert_eq!(
            classify(400, Some("ThrottlingException:http://internal")),
            ErrorCode::RateLimit
        );
        assert_eq!(classify(500, Some("ValidationException")), ErrorCode::BadRequest);
        assert_eq!(classify(400, Some("SomethingElse")), ErrorCode::BadRequest);
    }
}

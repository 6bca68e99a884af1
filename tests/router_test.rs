//! Tests for provider selection, failover and the router's shared state.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use huginn::budget::{BudgetConfig, BudgetTracker};
use huginn::{
    CacheConfig, ErrorCode, GenerateRequest, GenerateResponse, HuginnError, ModelClient,
    ProviderRouter, ResponseCache, Result, RoutingConfig, Usage,
};

// ============================================================================
// Mock provider
// ============================================================================

struct MockProvider {
    name: &'static str,
    content: String,
    cost: f64,
    delay: Duration,
    failure: Option<ErrorCode>,
    reported: Option<&'static str>,
    calls: AtomicU32,
    closed: AtomicBool,
}

impl MockProvider {
    fn ok(name: &'static str) -> Self {
        Self {
            name,
            content: format!("answer from {name}"),
            cost: 0.01,
            delay: Duration::ZERO,
            failure: None,
            reported: None,
            calls: AtomicU32::new(0),
            closed: AtomicBool::new(false),
        }
    }

    fn failing(name: &'static str, code: ErrorCode) -> Self {
        Self {
            failure: Some(code),
            ..Self::ok(name)
        }
    }

    fn content(mut self, content: &str) -> Self {
        self.content = content.to_string();
        self
    }

    fn cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Provider name written into responses, in place of the client name.
    fn reports(mut self, provider: &'static str) -> Self {
        self.reported = Some(provider);
        self
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ModelClient for MockProvider {
    fn provider(&self) -> &str {
        self.name
    }

    fn models(&self) -> Vec<String> {
        vec![format!("{}-model", self.name)]
    }

    async fn generate(&self, _request: &GenerateRequest) -> Result<GenerateResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(code) = self.failure {
            return Err(HuginnError::provider(code, self.name, "mock failure"));
        }
        Ok(GenerateResponse {
            content: self.content.clone(),
            model: format!("{}-model", self.name),
            provider: self.reported.unwrap_or(self.name).to_string(),
            usage: Usage::new(100, 50, self.cost),
            cached: false,
            duration: self.delay,
        })
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

const MEDIUM_PROMPT: &str = "Tell me about the history of the printing press in Europe";
const COMPLEX_PROMPT: &str = "Design a scalable microservices architecture with advanced security";

fn router(azure: &Arc<MockProvider>, bedrock: &Arc<MockProvider>) -> ProviderRouter {
    ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .default_provider("azure")
        .build()
        .unwrap()
}

// ============================================================================
// Selection
// ============================================================================

#[tokio::test]
async fn metadata_hint_wins() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = router(&azure, &bedrock);

    let request = GenerateRequest::new(COMPLEX_PROMPT).provider("bedrock");
    assert_eq!(router.select_provider(&request).unwrap(), "bedrock");
}

#[tokio::test]
async fn complexity_drives_preference() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .default_provider("bedrock")
        .build()
        .unwrap();

    let simple = GenerateRequest::new("Hello world");
    let complex = GenerateRequest::new(COMPLEX_PROMPT);
    let medium = GenerateRequest::new(MEDIUM_PROMPT);

    assert_eq!(router.select_provider(&simple).unwrap(), "bedrock");
    assert_eq!(router.select_provider(&complex).unwrap(), "azure");
    assert_eq!(router.select_provider(&medium).unwrap(), "bedrock");
}

#[tokio::test]
async fn custom_routing_preferences() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .routing(RoutingConfig::new().simple(["azure"]).complex(["bedrock"]))
        .build()
        .unwrap();

    let simple = GenerateRequest::new("Hello world");
    assert_eq!(router.select_provider(&simple).unwrap(), "azure");
    let complex = GenerateRequest::new(COMPLEX_PROMPT);
    assert_eq!(router.select_provider(&complex).unwrap(), "bedrock");
}

#[tokio::test]
async fn unavailable_hint_falls_through() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = router(&azure, &bedrock);

    let request = GenerateRequest::new(MEDIUM_PROMPT).provider("openai");
    assert_eq!(router.select_provider(&request).unwrap(), "azure");
}

#[tokio::test]
async fn falls_back_to_any_provider() {
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = ProviderRouter::builder()
        .client(bedrock.clone())
        .default_provider("azure")
        .routing(RoutingConfig::new().simple(Vec::<String>::new()))
        .build()
        .unwrap();

    let request = GenerateRequest::new("Hello world");
    assert_eq!(router.select_provider(&request).unwrap(), "bedrock");
}

#[test]
fn builder_without_clients_fails() {
    let result = ProviderRouter::builder().build();
    assert!(matches!(result, Err(HuginnError::NoProvider)));
}

// ============================================================================
// Failover
// ============================================================================

#[tokio::test]
async fn retryable_failure_fails_over_once() {
    let azure = Arc::new(MockProvider::failing("azure", ErrorCode::RateLimit));
    let bedrock = Arc::new(MockProvider::ok("bedrock").reports("bedrock-us-east-1"));
    let router = router(&azure, &bedrock);

    let request = GenerateRequest::new(MEDIUM_PROMPT).provider("azure");
    let response = router.generate(&request).await.unwrap();

    // the router stamps the provider it failed over to
    assert_eq!(response.provider, "bedrock");
    assert_eq!(response.content, "answer from bedrock");
    assert_eq!(azure.calls(), 1);
    assert_eq!(bedrock.calls(), 1);
}

#[tokio::test]
async fn second_failure_surfaces_last_error() {
    let azure = Arc::new(MockProvider::failing("azure", ErrorCode::Timeout));
    let bedrock = Arc::new(MockProvider::failing("bedrock", ErrorCode::HttpError));
    let router = router(&azure, &bedrock);

    let err = router
        .generate(&GenerateRequest::new(MEDIUM_PROMPT))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::HttpError));
    assert_eq!(err.provider_name(), Some("bedrock"));
    assert_eq!(azure.calls(), 1);
    assert_eq!(bedrock.calls(), 1);
}

#[tokio::test]
async fn permanent_failure_does_not_fail_over() {
    let azure = Arc::new(MockProvider::failing("azure", ErrorCode::BadRequest));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = router(&azure, &bedrock);

    let err = router
        .generate(&GenerateRequest::new(MEDIUM_PROMPT))
        .await
        .unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::BadRequest));
    assert_eq!(bedrock.calls(), 0);
}

#[tokio::test]
async fn single_provider_surfaces_original_error() {
    let azure = Arc::new(MockProvider::failing("azure", ErrorCode::ProviderDown));
    let router = ProviderRouter::builder().client(azure.clone()).build().unwrap();

    let err = router
        .generate(&GenerateRequest::new("Hello world"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::ProviderDown));
    assert_eq!(azure.calls(), 1);
}

// ============================================================================
// Budget and cache
// ============================================================================

#[tokio::test]
async fn budget_rejection_is_terminal() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let budget = Arc::new(BudgetTracker::new(BudgetConfig::new().monthly_limit(1.0)));
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .budget(Arc::clone(&budget))
        .build()
        .unwrap();

    let spent = GenerateResponse {
        content: String::new(),
        model: "azure-model".to_string(),
        provider: "azure".to_string(),
        usage: Usage::new(0, 0, 1.0),
        cached: false,
        duration: Duration::ZERO,
    };
    budget.track_usage(&spent).await;

    let err = router
        .generate(&GenerateRequest::new("Hello world"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::QuotaExceeded));
    assert!(!err.is_retryable());
    assert_eq!(azure.calls() + bedrock.calls(), 0);
}

#[tokio::test]
async fn successful_calls_are_tracked() {
    let azure = Arc::new(MockProvider::ok("azure").cost(0.25));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let budget = Arc::new(BudgetTracker::new(BudgetConfig::default()));
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .budget(Arc::clone(&budget))
        .build()
        .unwrap();

    let request = GenerateRequest::new(MEDIUM_PROMPT).provider("azure");
    router.generate(&request).await.unwrap();
    router.generate(&request).await.unwrap();

    let usage = budget.current_usage().await;
    assert_eq!(usage.requests, 2);
    assert_eq!(usage.total_cost, 0.5);
    assert_eq!(usage.providers["azure"].models["azure-model"].requests, 2);
}

#[tokio::test]
async fn explicit_cache_key_is_served_from_cache() {
    let azure = Arc::new(MockProvider::ok("azure").delay(Duration::from_millis(10)));
    let cache = Arc::new(ResponseCache::new(&CacheConfig::default()).unwrap());
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .cache(cache)
        .build()
        .unwrap();

    let request = GenerateRequest::new("Hello world").cache_key("greeting");
    let first = router.generate(&request).await.unwrap();
    assert!(!first.cached);

    // written before the first call returned
    let second = router.generate(&request).await.unwrap();
    assert!(second.cached);
    assert_eq!(second.duration, Duration::ZERO);
    assert_eq!(second.content, first.content);
    assert_eq!(azure.calls(), 1);
}

#[tokio::test]
async fn requests_without_key_skip_cache() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let cache = Arc::new(ResponseCache::new(&CacheConfig::default()).unwrap());
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .cache(Arc::clone(&cache))
        .build()
        .unwrap();

    let request = GenerateRequest::new("Hello world");
    router.generate(&request).await.unwrap();
    let again = router.generate(&request).await.unwrap();

    assert!(!again.cached);
    assert_eq!(azure.calls(), 2);
    assert_eq!(cache.stats().await.unwrap().key_count, 0);
}

// ============================================================================
// Comparison
// ============================================================================

#[tokio::test]
async fn comparison_collects_every_outcome() {
    let azure = Arc::new(
        MockProvider::ok("azure")
            .content("a much longer and more detailed answer")
            .cost(0.05)
            .delay(Duration::from_millis(60)),
    );
    let bedrock = Arc::new(
        MockProvider::ok("bedrock")
            .content("short")
            .cost(0.01)
            .delay(Duration::from_millis(5)),
    );
    let budget = Arc::new(BudgetTracker::new(BudgetConfig::default()));
    let router = ProviderRouter::builder()
        .client(azure.clone())
        .client(bedrock.clone())
        .budget(Arc::clone(&budget))
        .build()
        .unwrap();

    let result = router
        .generate_with_comparison(
            &GenerateRequest::new("compare me"),
            &["azure", "bedrock", "openai"],
        )
        .await;

    assert_eq!(result.responses.len(), 2);
    assert!(matches!(
        result.errors.get("openai"),
        Some(HuginnError::UnknownProvider(_))
    ));
    assert_eq!(result.longest().unwrap().provider, "azure");
    assert_eq!(result.fastest().unwrap().provider, "bedrock");
    assert_eq!(result.cheapest().unwrap().provider, "bedrock");
    assert_eq!(budget.current_usage().await.requests, 2);
}

#[tokio::test]
async fn comparison_records_failures() {
    let azure = Arc::new(MockProvider::failing("azure", ErrorCode::Unauthorized));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = router(&azure, &bedrock);

    let result = router
        .generate_with_comparison(&GenerateRequest::new("x"), &["azure", "bedrock"])
        .await;

    assert_eq!(
        result.errors["azure"].code(),
        Some(ErrorCode::Unauthorized)
    );
    assert!(result.responses.contains_key("bedrock"));
    // no failover in comparison mode
    assert_eq!(bedrock.calls(), 1);
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn health_check_reports_each_provider() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::failing("bedrock", ErrorCode::Unauthorized));
    let router = router(&azure, &bedrock);

    let health = router.health_check().await;
    assert_eq!(health.len(), 2);
    assert!(health["azure"].is_ok());
    assert_eq!(
        health["bedrock"].as_ref().unwrap_err().code(),
        Some(ErrorCode::Unauthorized)
    );
}

#[tokio::test]
async fn add_and_remove_providers() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let router = ProviderRouter::builder().client(azure.clone()).build().unwrap();

    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    assert!(router.add_provider(bedrock.clone()).is_none());
    assert_eq!(router.providers(), ["azure", "bedrock"]);

    let replacement = Arc::new(MockProvider::ok("bedrock").content("v2"));
    let replaced = router.add_provider(replacement.clone());
    assert!(replaced.is_some());
    assert!(!bedrock.is_closed());

    router.remove_provider("bedrock").await.unwrap();
    assert!(replacement.is_closed());
    assert_eq!(router.providers(), ["azure"]);

    let err = router.remove_provider("bedrock").await.unwrap_err();
    assert!(matches!(err, HuginnError::UnknownProvider(_)));
}

#[tokio::test]
async fn latency_is_observed_per_provider() {
    let azure = Arc::new(MockProvider::ok("azure").delay(Duration::from_millis(10)));
    let router = ProviderRouter::builder().client(azure.clone()).build().unwrap();

    assert!(router.provider_latency("azure").is_none());
    router.generate(&GenerateRequest::new("hi")).await.unwrap();
    assert!(router.provider_latency("azure").unwrap() >= Duration::from_millis(10));
}

#[tokio::test]
async fn close_closes_every_client() {
    let azure = Arc::new(MockProvider::ok("azure"));
    let bedrock = Arc::new(MockProvider::ok("bedrock"));
    let router = router(&azure, &bedrock);

    router.close().await.unwrap();
    assert!(azure.is_closed());
    assert!(bedrock.is_closed());
}

//! Tests for monthly spend tracking and budget admission.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use huginn::budget::{BudgetConfig, BudgetTracker, Clock};
use huginn::{ErrorCode, GenerateRequest, GenerateResponse, Usage};

// ============================================================================
// Helpers
// ============================================================================

fn spend(provider: &str, model: &str, cost: f64) -> GenerateResponse {
    GenerateResponse {
        content: "ok".to_string(),
        model: model.to_string(),
        provider: provider.to_string(),
        usage: Usage::new(100, 50, cost),
        cached: false,
        duration: Duration::from_millis(5),
    }
}

/// A clock the test can move.
fn manual_clock(start: DateTime<Utc>) -> (Clock, Arc<Mutex<DateTime<Utc>>>) {
    let now = Arc::new(Mutex::new(start));
    let handle = Arc::clone(&now);
    let clock: Clock = Arc::new(move || *handle.lock().unwrap());
    (clock, now)
}

fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn rejects_once_limit_reached() {
    let tracker = BudgetTracker::new(BudgetConfig::new().monthly_limit(10.0));
    let request = GenerateRequest::new("Hello world").max_tokens(10);

    tracker.track_usage(&spend("azure", "gpt-4o", 6.0)).await;
    assert!(tracker.check_budget("azure", &request).await.is_ok());

    tracker.track_usage(&spend("azure", "gpt-4o", 4.0)).await;
    for _ in 0..3 {
        let err = tracker.check_budget("azure", &request).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::QuotaExceeded));
        assert!(!err.is_retryable());
        assert_eq!(err.provider_name(), Some("azure"));
    }
    assert!(tracker.is_over_budget().await);
}

#[tokio::test]
async fn empty_month_always_admits() {
    let tracker = BudgetTracker::new(BudgetConfig::new().monthly_limit(0.0));
    let request = GenerateRequest::new("x".repeat(10_000)).max_tokens(100_000);
    assert!(tracker.check_budget("azure", &request).await.is_ok());
}

#[tokio::test]
async fn rejects_projected_overrun() {
    let tracker = BudgetTracker::new(BudgetConfig::new().monthly_limit(1.0));
    tracker.track_usage(&spend("azure", "gpt-4o", 0.99)).await;

    // ~1M output tokens at the default rate is ~$2
    let large = GenerateRequest::new("write a novel").max_tokens(1_000_000);
    let err = tracker.check_budget("unknown", &large).await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::QuotaExceeded));

    let small = GenerateRequest::new("hi").max_tokens(10);
    assert!(tracker.check_budget("unknown", &small).await.is_ok());
}

#[tokio::test]
async fn disabled_tracking_admits_and_records_nothing() {
    let config = BudgetConfig::new().monthly_limit(1.0).tracking_enabled(false);
    let tracker = BudgetTracker::new(config);

    tracker.track_usage(&spend("azure", "gpt-4o", 50.0)).await;
    let usage = tracker.current_usage().await;
    assert_eq!(usage.requests, 0);
    assert_eq!(usage.total_cost, 0.0);
    assert!(
        tracker
            .check_budget("azure", &GenerateRequest::new("hi"))
            .await
            .is_ok()
    );
}

// ============================================================================
// Aggregation
// ============================================================================

#[tokio::test]
async fn totals_equal_sum_of_children() {
    let tracker = BudgetTracker::new(BudgetConfig::default());
    let events = [
        ("azure", "gpt-4o", 0.5),
        ("azure", "gpt-4o-mini", 0.25),
        ("azure", "gpt-4o", 0.5),
        ("bedrock", "claude-3-haiku", 0.125),
    ];

    let mut previous = 0.0;
    for (provider, model, cost) in events {
        tracker.track_usage(&spend(provider, model, cost)).await;
        let total = tracker.current_usage().await.total_cost;
        assert!(total >= previous, "total cost must not decrease");
        previous = total;
    }

    let usage = tracker.current_usage().await;
    assert_eq!(usage.requests, 4);
    assert_eq!(usage.total_cost, 1.375);
    assert_eq!(usage.total_tokens, 600);

    let provider_sum: f64 = usage.providers.values().map(|p| p.cost).sum();
    assert_eq!(provider_sum, usage.total_cost);

    let azure = &usage.providers["azure"];
    assert_eq!(azure.requests, 3);
    assert_eq!(azure.models["gpt-4o"].requests, 2);
    assert_eq!(azure.models["gpt-4o"].prompt_tokens, 200);
    assert_eq!(azure.models["gpt-4o"].completion_tokens, 100);
    let model_sum: f64 = azure.models.values().map(|m| m.cost).sum();
    assert_eq!(model_sum, azure.cost);
}

#[tokio::test]
async fn reads_are_copies() {
    let tracker = BudgetTracker::new(BudgetConfig::default());
    tracker.track_usage(&spend("azure", "gpt-4o", 1.0)).await;

    let mut snapshot = tracker.current_usage().await;
    snapshot.total_cost = 999.0;
    snapshot.providers.clear();

    let fresh = tracker.current_usage().await;
    assert_eq!(fresh.total_cost, 1.0);
    assert_eq!(fresh.providers.len(), 1);
}

#[tokio::test]
async fn concurrent_tracking_loses_nothing() {
    let tracker = Arc::new(BudgetTracker::new(BudgetConfig::default()));
    let tasks: Vec<_> = (0..50)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move { tracker.track_usage(&spend("azure", "gpt-4o", 0.5)).await })
        })
        .collect();
    for task in tasks {
        task.await.unwrap();
    }

    let usage = tracker.current_usage().await;
    assert_eq!(usage.requests, 50);
    assert_eq!(usage.total_cost, 25.0);
}

// ============================================================================
// Months
// ============================================================================

#[tokio::test]
async fn new_month_starts_from_zero() {
    let (clock, now) = manual_clock(at(2024, 1, 31));
    let tracker = BudgetTracker::with_clock(BudgetConfig::new().monthly_limit(10.0), clock);
    let request = GenerateRequest::new("hi").max_tokens(10);

    tracker.track_usage(&spend("azure", "gpt-4o", 10.0)).await;
    assert!(tracker.check_budget("azure", &request).await.is_err());

    *now.lock().unwrap() = at(2024, 2, 1);
    let usage = tracker.current_usage().await;
    assert_eq!(usage.month, "2024-02");
    assert_eq!(usage.total_cost, 0.0);
    assert!(tracker.check_budget("azure", &request).await.is_ok());

    tracker.track_usage(&spend("bedrock", "claude-3-haiku", 1.0)).await;
    let history = tracker.usage_history(12).await;
    let months: Vec<&str> = history.iter().map(|m| m.month.as_str()).collect();
    assert_eq!(months, ["2024-02", "2024-01"]);
    assert_eq!(history[1].total_cost, 10.0);

    assert_eq!(tracker.usage_history(1).await.len(), 1);
}

#[tokio::test]
async fn status_reports_utilization_and_alert() {
    let config = BudgetConfig::new().monthly_limit(100.0).alert_threshold(0.8);
    let (clock, _) = manual_clock(at(2025, 6, 15));
    let tracker = BudgetTracker::with_clock(config, clock);

    tracker.track_usage(&spend("azure", "gpt-4o", 50.0)).await;
    let status = tracker.budget_status().await;
    assert_eq!(status.month, "2025-06");
    assert_eq!(status.utilization, 0.5);
    assert!(!status.should_alert);

    tracker.track_usage(&spend("azure", "gpt-4o", 35.0)).await;
    let status = tracker.budget_status().await;
    assert_eq!(status.current_spend, 85.0);
    assert_eq!(status.remaining, 15.0);
    assert_eq!(status.requests, 2);
    assert!(status.should_alert);
    assert!(!status.over_budget);
    assert!(tracker.should_alert().await);
    assert!(!tracker.is_over_budget().await);
}

#[tokio::test]
async fn zero_limit_status_is_fully_utilized() {
    let tracker = BudgetTracker::new(BudgetConfig::new().monthly_limit(0.0));
    let status = tracker.budget_status().await;
    assert_eq!(status.utilization, 1.0);
    assert!(status.over_budget);
    assert_eq!(status.remaining, 0.0);
}

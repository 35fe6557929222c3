//! End-to-end breaker, registry and retry behavior on a paused clock.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;
use skill_substrate::{
    retry_async, BreakerOptions, BreakerRegistry, CircuitState, RetryPolicy, Substrate, SubstrateConfig,
};

mod common;
use common::FlakyDependency;

const NO_LATENCY: Duration = Duration::ZERO;

#[tokio::test(start_paused = true)]
async fn test_trip_reject_recover_scenario() {
    let registry = BreakerRegistry::default();
    let options = BreakerOptions {
        failure_threshold: 3,
        cooldown: Duration::from_millis(500),
        exclusive_trial: false,
    };
    let breaker = registry.get_with("openai", options);
    let dep = FlakyDependency::failing(3);

    for _ in 0..3 {
        let err = breaker.call(|| dep.call(NO_LATENCY)).await.unwrap_err();
        assert!(!err.is_open());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    advance(Duration::from_millis(100)).await;
    let err = breaker.call(|| dep.call(NO_LATENCY)).await.unwrap_err();
    assert!(err.is_open());
    assert!(err.to_string().contains("0.4s"), "{}", err);
    assert_eq!(dep.calls(), 3);

    advance(Duration::from_millis(500)).await;
    let value = breaker.call(|| dep.call(NO_LATENCY)).await.unwrap();
    assert_eq!(value, 4);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);

    let status = registry.all_status();
    assert_eq!(status["openai"].state, CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_open_rejections_never_invoke_operation() {
    let registry = BreakerRegistry::new(BreakerOptions {
        failure_threshold: 2,
        cooldown: Duration::from_secs(30),
        exclusive_trial: false,
    });
    let breaker = registry.get("resend");
    let dep = FlakyDependency::failing(u32::MAX);

    for _ in 0..2 {
        let _ = breaker.call(|| dep.call(NO_LATENCY)).await;
    }
    for step in 0..30 {
        advance(Duration::from_millis(999)).await;
        let err = breaker.call(|| dep.call(NO_LATENCY)).await.unwrap_err();
        assert!(err.is_open(), "step {}", step);
    }
    assert_eq!(dep.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_trial_reopens() {
    let registry = BreakerRegistry::new(BreakerOptions {
        failure_threshold: 1,
        cooldown: Duration::from_millis(200),
        exclusive_trial: false,
    });
    let breaker = registry.get("fullenrich");
    let dep = FlakyDependency::failing(2);

    let _ = breaker.call(|| dep.call(NO_LATENCY)).await;
    advance(Duration::from_millis(250)).await;

    let err = breaker.call(|| dep.call(NO_LATENCY)).await.unwrap_err();
    assert!(!err.is_open());
    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(dep.calls(), 2);

    advance(Duration::from_millis(150)).await;
    assert!(breaker.call(|| dep.call(NO_LATENCY)).await.unwrap_err().is_open());
}

#[tokio::test(start_paused = true)]
async fn test_retry_inside_breaker_absorbs_transient_errors() {
    let mut config = SubstrateConfig::default();
    config.retry.base_delay_ms = 100;
    let substrate = Substrate::from_config(&config);
    let dep = FlakyDependency::failing(2);

    let value = substrate
        .guarded_call("claude-sonnet", || dep.call(Duration::from_millis(20)))
        .await
        .unwrap();

    assert_eq!(value, 3);
    let breaker = substrate.breakers().get("claude-sonnet");
    assert_eq!(breaker.failure_count(), 0);
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_retry_around_breaker_sees_fail_fast() {
    let registry = Arc::new(BreakerRegistry::new(BreakerOptions {
        failure_threshold: 1,
        cooldown: Duration::from_secs(60),
        exclusive_trial: false,
    }));
    let dep = FlakyDependency::failing(u32::MAX);
    let breaker = registry.get("hubspot");

    let result = retry_async(
        || breaker.call(|| dep.call(NO_LATENCY)),
        2,
        Duration::from_millis(100),
    )
    .await;

    let err = result.unwrap_err();
    assert!(err.is_open());
    assert_eq!(dep.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_policy_attempt_count() {
    let dep = FlakyDependency::failing(u32::MAX);
    let policy = RetryPolicy::new(4, Duration::from_millis(10));

    let err = policy.run(|| dep.call(NO_LATENCY)).await.unwrap_err();
    assert_eq!(err, "call 5 failed");
    assert_eq!(dep.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_reset_overrides_cooldown() {
    let registry = BreakerRegistry::new(BreakerOptions {
        failure_threshold: 1,
        cooldown: Duration::from_secs(3600),
        exclusive_trial: false,
    });
    let dep = FlakyDependency::failing(1);
    let breaker = registry.get("web-fetch");
    let _ = breaker.call(|| dep.call(NO_LATENCY)).await;
    assert_eq!(breaker.state(), CircuitState::Open);

    registry.reset_all();
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breaker.call(|| dep.call(NO_LATENCY)).await.is_ok());
}

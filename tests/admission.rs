//! End-to-end admission scenarios over the in-memory store.
//!
//! Timestamps are passed explicitly so window rollover is deterministic and
//! the suite never sleeps.

use std::sync::Arc;
use std::time::Duration;

use floodgate::config::FloodgateConfig;
use floodgate::ratelimit::PolicyChain;
use floodgate::store::{CounterStore, MemoryStore};

/// Aligned on every window length used below.
const T0: i64 = 1_700_000_000_000;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn chain_from(yaml: &str) -> (PolicyChain, Arc<MemoryStore>) {
    let config = FloodgateConfig::from_yaml(yaml).unwrap();
    let store = Arc::new(MemoryStore::new());
    let chain = PolicyChain::from_config(&config, Arc::clone(&store) as Arc<dyn CounterStore>)
        .unwrap();
    (chain, store)
}

#[tokio::test]
async fn five_requests_for_one_number_then_denied() {
    init_tracing();
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 1000
    window_secs: 10
"#,
    );

    for i in 0..5 {
        let decision = chain.admit_at("789", T0 + i * 100).await.unwrap();
        assert!(decision.is_allowed(), "request {} should be allowed", i + 1);
    }

    let decision = chain.admit_at("789", T0 + 600).await.unwrap();
    assert!(!decision.is_allowed());
    assert!(decision.retry_after().unwrap() > Duration::ZERO);
}

#[tokio::test]
async fn global_limit_spans_identities() {
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 100
    window_secs: 10
  global:
    permit_limit: 10
    window_secs: 10
"#,
    );

    for i in 0..10 {
        let identity = format!("number-{}", i);
        let decision = chain.admit_at(&identity, T0 + i * 50).await.unwrap();
        assert!(decision.is_allowed(), "request {} should be allowed", i + 1);
    }

    // Any identity is denied once the global budget is spent.
    let decision = chain.admit_at("number-0", T0 + 600).await.unwrap();
    assert!(!decision.is_allowed());
}

#[tokio::test]
async fn identities_do_not_interfere() {
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 1000
    window_secs: 10
"#,
    );

    // Interleave two numbers, staying one request under each limit.
    for i in 0..4 {
        let t = T0 + i * 100;
        assert!(chain.admit_at("123", t).await.unwrap().is_allowed());
        assert!(chain.admit_at("456", t + 50).await.unwrap().is_allowed());
    }
}

#[tokio::test]
async fn window_rollover_restores_capacity() {
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 1000
    window_secs: 10
"#,
    );

    for i in 0..5 {
        assert!(chain.admit_at("12345", T0 + i * 100).await.unwrap().is_allowed());
    }
    assert!(!chain.admit_at("12345", T0 + 500).await.unwrap().is_allowed());

    // One second past the window, the full budget is back.
    let later = T0 + 6_500;
    for i in 0..5 {
        let decision = chain.admit_at("12345", later + i * 100).await.unwrap();
        assert!(decision.is_allowed(), "request {} should be allowed", i + 1);
    }
}

#[tokio::test]
async fn sliding_bound_holds_for_any_trailing_window() {
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 1000
    window_secs: 10
"#,
    );

    let window_ms = 5_000;
    let mut admitted = Vec::new();

    // Hammer one number every 400ms for ten seconds.
    for i in 0..25 {
        let t = T0 + i * 400;
        if chain.admit_at("789", t).await.unwrap().is_allowed() {
            admitted.push(t);
        }
    }

    // No trailing window of the configured length holds more than the limit.
    for &t in &admitted {
        let in_window = admitted
            .iter()
            .filter(|&&a| a > t - window_ms && a <= t)
            .count();
        assert!(in_window <= 5, "{} admitted in the window ending at {}", in_window, t);
    }
}

#[tokio::test]
async fn fixed_window_admits_boundary_burst() {
    // The acknowledged weakness of fixed windows: a client straddling a
    // boundary gets two full budgets back to back.
    let (chain, _) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 5
    window_secs: 5
    algorithm: fixed_window
  global:
    permit_limit: 1000
    window_secs: 10
"#,
    );

    // T0 is aligned, so the first window ends at T0 + 5_000.
    for i in 0..5 {
        let t = T0 + 4_500 + i * 50;
        assert!(chain.admit_at("789", t).await.unwrap().is_allowed());
    }
    for i in 0..5 {
        let t = T0 + 5_100 + i * 50;
        assert!(chain.admit_at("789", t).await.unwrap().is_allowed());
    }
}

#[tokio::test]
async fn denial_at_either_stage_denies_overall() {
    let (chain, store) = chain_from(
        r#"
limits:
  identity:
    permit_limit: 1
    window_secs: 10
  global:
    permit_limit: 3
    window_secs: 10
"#,
    );

    assert!(chain.admit_at("alice", T0).await.unwrap().is_allowed());

    // Denied by the identity policy. The global stage was still charged,
    // since it runs first.
    assert!(!chain.admit_at("alice", T0 + 100).await.unwrap().is_allowed());

    // Admitted: third global permit, first for bob.
    assert!(chain.admit_at("bob", T0 + 200).await.unwrap().is_allowed());

    // Denied by the global policy; carol's own counter stays untouched.
    assert!(!chain.admit_at("carol", T0 + 300).await.unwrap().is_allowed());
    let carol_used = store
        .peek_sliding("ratelimit:identity:carol", T0 + 400, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(carol_used, 0);
}

#[test]
fn config_file_with_environment_override() {
    let path = std::env::temp_dir().join(format!("floodgate-admission-{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        r#"
store:
  url: redis://cache.internal:6379
limits:
  identity:
    permit_limit: 5
    window_secs: 5
  global:
    permit_limit: 10
    window_secs: 10
"#,
    )
    .unwrap();

    std::env::set_var("FLOODGATE_LIMITS__IDENTITY__PERMIT_LIMIT", "3");
    let config = FloodgateConfig::from_file(path.to_str().unwrap()).unwrap();
    std::env::remove_var("FLOODGATE_LIMITS__IDENTITY__PERMIT_LIMIT");
    std::fs::remove_file(&path).unwrap();

    // The environment wins over the file.
    assert_eq!(config.limits.identity.permit_limit, 3);
    assert_eq!(config.store.url, "redis://cache.internal:6379");
    assert_eq!(config.limits.global.permit_limit, 10);
}

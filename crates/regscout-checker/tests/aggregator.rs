mod common;

use common::{aggregator, aggregator_with, domain, entry, settings, ScriptedAdapter, SessionAdapter};
use futures::StreamExt;
use regscout_browser::testing::MockBackend;
use regscout_browser::{SessionManager, SessionSettings};
use regscout_cache::CacheKey;
use regscout_checker::{CacheMode, CheckError, CheckRequest, DisconnectPolicy, OutcomeSource, QueryEvent};
use regscout_core::ProviderId;
use regscout_provider::ProviderAdapter;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

#[tokio::test(start_paused = true)]
async fn test_collect_has_one_entry_per_provider() {
    let aggregator = aggregator(vec![
        entry(ProviderId::Porkbun, ScriptedAdapter::available_after(secs(1), Decimal::new(999, 2))),
        entry(ProviderId::Gandi, ScriptedAdapter::taken_after(secs(2))),
        entry(ProviderId::Hover, ScriptedAdapter::hanging()),
    ]);

    let report = aggregator
        .check(&CheckRequest::new("Example.Tech").with_timeout_ms(3_000))
        .await
        .expect("valid request");

    assert!(report.ok);
    assert_eq!(report.domain, "example.tech");
    assert_eq!(
        report.results.keys().copied().collect::<Vec<_>>(),
        vec![ProviderId::Porkbun, ProviderId::Gandi, ProviderId::Hover]
    );
    assert_eq!(report.results[&ProviderId::Porkbun].available, Some(true));
    assert_eq!(report.results[&ProviderId::Gandi].available, Some(false));
    assert_eq!(
        report.results[&ProviderId::Hover].error.as_deref(),
        Some("Timed out after 3000 ms")
    );
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_is_still_ok() {
    let aggregator = aggregator(vec![
        entry(ProviderId::Porkbun, ScriptedAdapter::failing_after(secs(1))),
        entry(ProviderId::Namecheap, ScriptedAdapter::failing_after(secs(2))),
        entry(ProviderId::Gandi, ScriptedAdapter::taken_after(secs(1))),
        entry(ProviderId::Dynadot, ScriptedAdapter::taken_after(secs(2))),
        entry(ProviderId::Spaceship, ScriptedAdapter::available_after(secs(3), Decimal::new(1099, 2))),
    ]);

    let report = aggregator
        .check(&CheckRequest::new("example.tech"))
        .await
        .expect("valid request");

    assert!(report.ok);
    assert_eq!(report.results.len(), 5);
    assert_eq!(report.results.values().filter(|r| r.ok).count(), 3);
    assert_eq!(
        report.results[&ProviderId::Porkbun].error.as_deref(),
        Some("provider returned HTTP 503")
    );
}

#[tokio::test(start_paused = true)]
async fn test_all_failing_is_not_ok() {
    let aggregator = aggregator(vec![
        entry(ProviderId::Porkbun, ScriptedAdapter::failing_after(secs(1))),
        entry(ProviderId::Gandi, ScriptedAdapter::hanging()),
    ]);

    let report = aggregator
        .check(&CheckRequest::new("example.tech").with_timeout_ms(2_000))
        .await
        .expect("valid request");

    assert!(!report.ok);
    assert_eq!(report.results.len(), 2);
}

#[tokio::test]
async fn test_invalid_request_schedules_nothing() {
    let adapter = ScriptedAdapter::taken_after(Duration::ZERO);
    let aggregator = aggregator(vec![entry(ProviderId::Porkbun, adapter.clone())]);

    for request in [
        CheckRequest::new("no spaces allowed.tech"),
        CheckRequest::new("example.tech").with_providers(["gandi"]),
        CheckRequest::new("example.tech").with_providers(Vec::<String>::new()),
        CheckRequest::new("example.tech").with_timeout_ms(0),
    ] {
        let result = aggregator.check(&request).await;
        assert!(matches!(result, Err(CheckError::InvalidQuery(_))), "{request:?}");
    }
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_stream_ordering() {
    let aggregator = aggregator(vec![
        entry(ProviderId::Porkbun, ScriptedAdapter::taken_after(secs(2))),
        entry(ProviderId::Gandi, ScriptedAdapter::taken_after(secs(1))),
        entry(ProviderId::Hover, ScriptedAdapter::failing_after(secs(3))),
    ]);
    let query = aggregator
        .resolve(&CheckRequest::new("example.tech"))
        .expect("valid request");

    let events: Vec<QueryEvent> = aggregator.stream(query).collect().await;

    assert_eq!(events.len(), 5);
    assert!(matches!(events.first(), Some(QueryEvent::Init(_))));
    assert!(matches!(events.last(), Some(QueryEvent::Done(summary)) if summary.total == 3 && summary.failed == 1));

    let completion_order: Vec<ProviderId> = events
        .iter()
        .filter_map(|event| match event {
            QueryEvent::Result(outcome) => Some(outcome.provider),
            _ => None,
        })
        .collect();
    assert_eq!(
        completion_order,
        vec![ProviderId::Gandi, ProviderId::Porkbun, ProviderId::Hover]
    );
}

#[tokio::test(start_paused = true)]
async fn test_fast_and_hanging_provider_timeline() {
    let aggregator = aggregator(vec![
        entry(ProviderId::Porkbun, ScriptedAdapter::available_after(secs(1), Decimal::new(1299, 2))),
        entry(ProviderId::Gandi, ScriptedAdapter::hanging()),
    ]);
    let query = aggregator
        .resolve(&CheckRequest::new("example.tech").with_timeout_ms(5_000))
        .expect("valid request");

    let started = Instant::now();
    let mut stream = aggregator.stream(query);
    let mut timeline = Vec::new();
    while let Some(event) = stream.next().await {
        timeline.push((started.elapsed(), event));
    }

    let names: Vec<&str> = timeline.iter().map(|(_, e)| e.name()).collect();
    assert_eq!(names, vec!["init", "result", "result", "done"]);

    let near = |at: Duration, expected_ms: u64| {
        let expected = Duration::from_millis(expected_ms);
        at >= expected && at < expected + Duration::from_millis(50)
    };

    let (at, QueryEvent::Result(first)) = &timeline[1] else {
        panic!("expected a result event");
    };
    assert!(near(*at, 1_000), "first result at {at:?}");
    assert_eq!(first.provider, ProviderId::Porkbun);
    assert_eq!(first.result.registration_price, Some(Decimal::new(1299, 2)));
    assert_eq!(first.result.currency.as_deref(), Some("USD"));

    let (at, QueryEvent::Result(second)) = &timeline[2] else {
        panic!("expected a result event");
    };
    assert!(near(*at, 5_000), "second result at {at:?}");
    assert_eq!(second.provider, ProviderId::Gandi);
    assert_eq!(second.source, OutcomeSource::Timeout);
    assert_eq!(second.result.error.as_deref(), Some("Timed out after 5000 ms"));

    let (at, _) = &timeline[3];
    assert!(near(*at, 5_000), "done at {at:?}");
}

#[tokio::test(start_paused = true)]
async fn test_heartbeats_while_idle() {
    let aggregator = aggregator_with(
        vec![entry(ProviderId::Porkbun, ScriptedAdapter::taken_after(Duration::from_millis(3_500)))],
        settings(secs(1), DisconnectPolicy::Detach),
    );
    let query = aggregator
        .resolve(&CheckRequest::new("example.tech"))
        .expect("valid request");

    let events: Vec<QueryEvent> = aggregator.stream(query).collect().await;
    let names: Vec<&str> = events.iter().map(QueryEvent::name).collect();

    assert_eq!(
        names,
        vec!["init", "heartbeat", "heartbeat", "heartbeat", "result", "done"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_detached_stream_still_populates_cache() {
    let adapter = ScriptedAdapter::taken_after(secs(2));
    let aggregator = aggregator_with(
        vec![entry(ProviderId::Porkbun, adapter.clone())],
        settings(secs(1), DisconnectPolicy::Detach),
    );
    let query = aggregator
        .resolve(&CheckRequest::new("example.tech"))
        .expect("valid request");

    let mut stream = aggregator.stream(query);
    assert!(matches!(stream.next().await, Some(QueryEvent::Init(_))));
    drop(stream);

    tokio::time::sleep(secs(3)).await;

    let key = CacheKey::new(ProviderId::Porkbun, domain());
    let cached = aggregator.runner().cache().get(&key).await.expect("cached result");
    assert!(cached.ok);
    assert_eq!(cached.available, Some(false));
    assert_eq!(adapter.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_policy_stops_outstanding_checks() {
    let adapter = ScriptedAdapter::taken_after(secs(2));
    let aggregator = aggregator_with(
        vec![entry(ProviderId::Porkbun, adapter.clone())],
        settings(secs(1), DisconnectPolicy::Cancel),
    );
    let query = aggregator
        .resolve(&CheckRequest::new("example.tech"))
        .expect("valid request");

    let mut stream = aggregator.stream(query);
    assert!(matches!(stream.next().await, Some(QueryEvent::Init(_))));
    drop(stream);

    tokio::time::sleep(secs(3)).await;

    // the runner was aborted before it could write the result
    let key = CacheKey::new(ProviderId::Porkbun, domain());
    assert_eq!(aggregator.runner().cache().get(&key).await, None);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_query_is_served_from_cache() {
    let adapter = ScriptedAdapter::available_after(secs(1), Decimal::new(500, 2));
    let aggregator = aggregator(vec![entry(ProviderId::Porkbun, adapter.clone())]);
    let request = CheckRequest::new("example.tech");

    let first = aggregator.check(&request).await.expect("valid request");
    let started = Instant::now();
    let second = aggregator.check(&request).await.expect("valid request");

    assert_eq!(first, second);
    assert_eq!(adapter.calls(), 1);
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn test_check_one_refresh_bypasses_cache() {
    let adapter = ScriptedAdapter::taken_after(Duration::from_millis(100));
    let aggregator = aggregator(vec![entry(ProviderId::Gandi, adapter.clone())]);

    let first = aggregator
        .check_one(ProviderId::Gandi, &domain(), 5_000, CacheMode::ReadWrite)
        .await
        .expect("registered provider");
    let cached = aggregator
        .check_one(ProviderId::Gandi, &domain(), 5_000, CacheMode::ReadWrite)
        .await
        .expect("registered provider");
    let refreshed = aggregator
        .check_one(ProviderId::Gandi, &domain(), 5_000, CacheMode::Refresh)
        .await
        .expect("registered provider");

    assert_eq!(first.source, OutcomeSource::Adapter);
    assert_eq!(cached.source, OutcomeSource::Cache);
    assert_eq!(refreshed.source, OutcomeSource::Adapter);
    assert_eq!(adapter.calls(), 2);

    let unknown = aggregator
        .check_one(ProviderId::Hover, &domain(), 5_000, CacheMode::ReadWrite)
        .await;
    assert!(matches!(unknown, Err(CheckError::InvalidQuery(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_browser_sessions_stay_within_cap() {
    let root = tempfile::tempdir().expect("create temp dir");
    let backend = MockBackend::new().with_page_text("example.tech is available");
    let sessions = SessionManager::new(
        Arc::new(backend.clone()),
        SessionSettings {
            profile_root: root.path().to_path_buf(),
            max_sessions: 2,
            hard_timeout: secs(200),
            headless: true,
            navigation_timeout: secs(30),
        },
    );

    let providers = [
        ProviderId::Porkbun,
        ProviderId::Namecheap,
        ProviderId::GoDaddy,
        ProviderId::Cloudflare,
        ProviderId::Dynadot,
        ProviderId::Gandi,
        ProviderId::Hover,
    ];
    let adapters = providers
        .iter()
        .map(|&id| {
            let adapter: Arc<dyn ProviderAdapter> =
                SessionAdapter::new(sessions.clone(), Duration::from_millis(40));
            (id, adapter)
        })
        .collect();
    let aggregator = aggregator(adapters);

    let report = aggregator
        .check(&CheckRequest::new("example.tech").with_timeout_ms(10_000))
        .await
        .expect("valid request");

    assert!(report.ok);
    assert_eq!(report.results.len(), providers.len());
    assert!(report.results.values().all(|r| r.ok && r.available == Some(true)));

    let stats = sessions.stats();
    assert_eq!(stats.opened, providers.len() as u64);
    assert!(stats.peak_open <= 2, "peak {}", stats.peak_open);
    assert!(backend.stats().peak_live <= 2);
    assert_eq!(sessions.limiter().available(), 2);
}

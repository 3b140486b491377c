// domain-monitor-lib/tests/integration.rs

//! Integration tests for the check engine, driven by in-process probe doubles

use async_trait::async_trait;
use domain_monitor_lib::{
    BatchOutcome, CheckConfig, DomainChecker, DomainInput, DomainMonitorError, DomainResult,
    JsonFileStore, MemoryStore, PersistenceSink, ReachabilityOutcome, ReachabilityProber,
    SslStatus, StatusCode, TlsInspector, TlsOutcome,
};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Prober that records hosts, tracks peak concurrency and can be told which
/// hosts are down or hang.
#[derive(Default)]
struct ScriptedProber {
    latency: Duration,
    down: Vec<&'static str>,
    hang: Vec<&'static str>,
    seen: Mutex<Vec<String>>,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedProber {
    fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProber for ScriptedProber {
    async fn probe(&self, host: &str) -> ReachabilityOutcome {
        self.seen.lock().unwrap().push(host.to_string());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        if self.hang.contains(&host) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        } else if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        if self.down.contains(&host) {
            ReachabilityOutcome::failed()
        } else {
            ReachabilityOutcome::ok()
        }
    }
}

/// Inspector that reports a fixed certificate, except for hosts listed as broken.
struct FixedInspector {
    broken: Vec<&'static str>,
}

#[async_trait]
impl TlsInspector for FixedInspector {
    async fn inspect(&self, host: &str) -> TlsOutcome {
        if self.broken.contains(&host) {
            TlsOutcome::failed()
        } else {
            TlsOutcome::valid("2030-06-01 12:00:00", "Test Issuing CA")
        }
    }
}

struct FailingSink;

#[async_trait]
impl PersistenceSink for FailingSink {
    async fn upsert_domains(
        &self,
        _results: &[DomainResult],
        owner: &str,
    ) -> Result<bool, DomainMonitorError> {
        Err(DomainMonitorError::storage(owner, "disk full"))
    }
}

/// Log sink for tests that assert on emitted warnings.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }

    /// Route this thread's tracing output here until the guard drops.
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn fast_config() -> CheckConfig {
    CheckConfig::default()
        .with_http_timeout(Duration::from_secs(5))
        .with_ssl_timeout(Duration::from_secs(5))
        .with_overall_timeout(Duration::from_secs(10))
}

fn build_checker(config: CheckConfig, prober: Arc<ScriptedProber>) -> DomainChecker {
    DomainChecker::with_components(config, prober, Arc::new(FixedInspector { broken: vec![] }))
}

fn inputs(urls: &[&str]) -> Vec<DomainInput> {
    urls.iter().map(|u| DomainInput::from(*u)).collect()
}

fn sorted_urls(outcome: &BatchOutcome) -> Vec<String> {
    let mut urls: Vec<String> = outcome.results.iter().map(|r| r.url.clone()).collect();
    urls.sort();
    urls
}

#[tokio::test]
async fn test_healthy_batch_reports_every_domain() {
    let prober = Arc::new(ScriptedProber::default());
    let checker = build_checker(fast_config(), prober.clone());

    let outcome = checker
        .check(&inputs(&["alpha.com", "beta.org", "gamma.io"]), "alice")
        .await;

    assert_eq!(outcome.owner, "alice");
    assert_eq!(outcome.expected_count, 3);
    assert_eq!(outcome.actual_count, 3);
    assert_eq!(outcome.incomplete_workers, 0);
    assert!(outcome.is_complete());
    assert_eq!(sorted_urls(&outcome), vec!["alpha.com", "beta.org", "gamma.io"]);

    for result in &outcome.results {
        assert_eq!(result.status_code, StatusCode::Ok);
        assert_eq!(result.ssl_status, SslStatus::Valid);
        assert_eq!(result.expiration_date, "2030-06-01 12:00:00");
        assert_eq!(result.issuer, "Test Issuing CA");
    }
}

#[tokio::test]
async fn test_mixed_batch_keeps_input_urls() {
    let prober = Arc::new(ScriptedProber {
        down: vec!["bad.invalid"],
        ..Default::default()
    });
    let checker = DomainChecker::with_components(
        fast_config(),
        prober.clone(),
        Arc::new(FixedInspector {
            broken: vec!["bad.invalid"],
        }),
    );

    let outcome = checker
        .check(&inputs(&["https://www.good.com/path", "bad.invalid"]), "nora")
        .await;

    assert_eq!(outcome.expected_count, 2);
    assert_eq!(outcome.actual_count, 2);

    let good = outcome
        .results
        .iter()
        .find(|r| r.url == "https://www.good.com/path")
        .unwrap();
    assert_eq!(good.status_code, StatusCode::Ok);
    assert_eq!(good.ssl_status, SslStatus::Valid);
    assert_eq!(good.expiration_date, "2030-06-01 12:00:00");
    assert_eq!(good.issuer, "Test Issuing CA");

    let bad = outcome.results.iter().find(|r| r.url == "bad.invalid").unwrap();
    assert_eq!(bad.status_code, StatusCode::Failed);
    assert_eq!(bad.ssl_status, SslStatus::Unknown);
    assert_eq!(bad.expiration_date, "unknown");
    assert_eq!(bad.issuer, "unknown");

    let mut seen = prober.seen();
    seen.sort();
    assert_eq!(seen, vec!["bad.invalid", "good.com"]);
}

#[tokio::test]
async fn test_worker_cap_bounds_concurrency() {
    let prober = Arc::new(ScriptedProber {
        latency: Duration::from_millis(50),
        ..Default::default()
    });
    let config = fast_config().with_max_workers(2);
    assert_eq!(config.worker_count(5), 2);
    let checker = build_checker(config, prober.clone());

    let outcome = checker
        .check(&inputs(&["a.com", "b.com", "c.com", "d.com", "e.com"]), "bob")
        .await;

    assert_eq!(outcome.actual_count, 5);
    assert!(prober.peak() <= 2, "peak concurrency was {}", prober.peak());
    assert_eq!(prober.seen().len(), 5);
}

#[tokio::test]
async fn test_batch_deadline_drops_hanging_checks() {
    let prober = Arc::new(ScriptedProber {
        hang: vec!["slow1.com", "slow2.com"],
        ..Default::default()
    });
    let config = fast_config()
        .with_max_workers(5)
        .with_overall_timeout(Duration::from_millis(300));
    let checker = build_checker(config, prober);
    let logs = CapturedLogs::default();
    let _guard = logs.install();

    let start = Instant::now();
    let outcome = checker
        .check(
            &inputs(&["fast1.com", "slow1.com", "fast2.com", "slow2.com", "fast3.com"]),
            "carol",
        )
        .await;

    assert!(start.elapsed() < Duration::from_secs(2));
    assert_eq!(outcome.expected_count, 5);
    assert_eq!(outcome.actual_count, 3);
    assert_eq!(outcome.lost_count(), 2);
    assert_eq!(outcome.incomplete_workers, 2);
    assert_eq!(sorted_urls(&outcome), vec!["fast1.com", "fast2.com", "fast3.com"]);

    let logs = logs.contents();
    assert!(logs.contains("WARN"), "no warning in logs: {}", logs);
    assert!(logs.contains("Lost 2 checks for carol"), "logs: {}", logs);
    assert!(logs.contains("2 workers did not complete"), "logs: {}", logs);
}

#[tokio::test]
async fn test_unreachable_domain_hides_certificate_details() {
    let prober = Arc::new(ScriptedProber {
        down: vec!["down.com"],
        ..Default::default()
    });
    let checker = DomainChecker::with_components(
        fast_config(),
        prober,
        Arc::new(FixedInspector {
            broken: vec!["badcert.com"],
        }),
    );

    let outcome = checker
        .check(&inputs(&["down.com", "badcert.com"]), "dave")
        .await;
    let down = outcome.results.iter().find(|r| r.url == "down.com").unwrap();
    let badcert = outcome.results.iter().find(|r| r.url == "badcert.com").unwrap();

    assert_eq!(*down, DomainResult::failed("down.com"));
    assert_eq!(badcert.status_code, StatusCode::Ok);
    assert_eq!(badcert.ssl_status, SslStatus::Failed);
    assert_eq!(badcert.expiration_date, "unknown");
    assert_eq!(badcert.issuer, "unknown");
}

#[tokio::test]
async fn test_hosts_are_normalized_but_urls_preserved() {
    let prober = Arc::new(ScriptedProber::default());
    let checker = build_checker(fast_config(), prober.clone());

    let outcome = checker
        .check(
            &[
                DomainInput::from("https://www.example.com/login"),
                DomainInput::TaggedHost {
                    url: "http://shop.example.org/cart?id=1".to_string(),
                },
            ],
            "erin",
        )
        .await;

    let mut seen = prober.seen();
    seen.sort();
    assert_eq!(seen, vec!["example.com", "shop.example.org"]);
    assert_eq!(
        sorted_urls(&outcome),
        vec!["http://shop.example.org/cart?id=1", "https://www.example.com/login"]
    );
}

#[tokio::test]
async fn test_duplicates_are_checked_independently() {
    let prober = Arc::new(ScriptedProber::default());
    let checker = build_checker(fast_config(), prober.clone());

    let outcome = checker
        .check(&inputs(&["twice.com", "twice.com", "once.com"]), "frank")
        .await;

    assert_eq!(outcome.expected_count, 3);
    assert_eq!(outcome.actual_count, 3);
    assert_eq!(prober.seen().len(), 3);
}

#[tokio::test]
async fn test_repeated_batches_agree() {
    let prober = Arc::new(ScriptedProber {
        down: vec!["b.com"],
        ..Default::default()
    });
    let checker = build_checker(fast_config(), prober);
    let domains = inputs(&["a.com", "b.com", "c.com"]);

    let mut first = checker.check(&domains, "grace").await.results;
    let mut second = checker.check(&domains, "grace").await.results;
    first.sort_by(|a, b| a.url.cmp(&b.url));
    second.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_concurrent_batches_for_different_owners() {
    let prober = Arc::new(ScriptedProber {
        latency: Duration::from_millis(20),
        ..Default::default()
    });
    let checker = build_checker(fast_config().with_max_workers(3), prober);

    let alice_domains = inputs(&["a1.com", "a2.com", "a3.com", "a4.com"]);
    let bob_domains = inputs(&["b1.com", "b2.com"]);
    let (alice, bob) = tokio::join!(
        checker.check(&alice_domains, "alice"),
        checker.check(&bob_domains, "bob"),
    );

    assert_eq!(sorted_urls(&alice), vec!["a1.com", "a2.com", "a3.com", "a4.com"]);
    assert_eq!(sorted_urls(&bob), vec!["b1.com", "b2.com"]);
}

#[tokio::test]
async fn test_results_reach_the_sink() {
    let store = Arc::new(MemoryStore::new());
    let prober = Arc::new(ScriptedProber {
        down: vec!["down.com"],
        ..Default::default()
    });
    let checker = build_checker(fast_config(), prober).with_sink(store.clone());

    checker
        .check(&inputs(&["up.com", "down.com"]), "heidi")
        .await;

    let mut stored = store.domains("heidi").await;
    stored.sort_by(|a, b| a.url.cmp(&b.url));
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0], DomainResult::failed("down.com"));
    assert!(stored[1].is_ok());
    assert!(store.domains("someone-else").await.is_empty());
}

#[tokio::test]
async fn test_empty_batch_skips_the_sink() {
    let store = Arc::new(MemoryStore::new());
    let checker = build_checker(fast_config(), Arc::new(ScriptedProber::default()))
        .with_sink(store.clone());

    let outcome = checker.check(&[], "ivan").await;
    assert_eq!(outcome.expected_count, 0);
    assert!(outcome.results.is_empty());
    assert!(store.domains("ivan").await.is_empty());
}

#[tokio::test]
async fn test_sink_failure_does_not_fail_the_batch() {
    let checker = build_checker(fast_config(), Arc::new(ScriptedProber::default()))
        .with_sink(Arc::new(FailingSink));

    let outcome = checker.check(&inputs(&["a.com"]), "judy").await;
    assert_eq!(outcome.actual_count, 1);
    assert!(outcome.results[0].is_ok());
}

#[tokio::test]
async fn test_json_store_round_trip_through_checker() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let prober = Arc::new(ScriptedProber::default());
    let checker = build_checker(fast_config(), prober).with_sink(store.clone());

    checker.check(&inputs(&["a.com", "b.com"]), "kim").await;

    // Stored records can be fed straight back in as inputs
    let stored = store.load_domains("kim").await.unwrap();
    let json = serde_json::to_string(&stored).unwrap();
    let reloaded: Vec<DomainInput> = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded.len(), 2);

    let outcome = checker.check(&reloaded, "kim").await;
    assert_eq!(outcome.actual_count, 2);
    assert_eq!(store.load_domains("kim").await.unwrap().len(), 2);
}

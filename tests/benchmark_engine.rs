use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use proxybench::benchmark::StatisticsConfig;
use proxybench::config::{BenchmarkConfig, Config};
use proxybench::models::proxy_endpoint::ProxyEndpoint;
use proxybench::proxies::common::{ProxyError, Result as ProxyResult};
use proxybench::proxies::transport::{RequestTransport, TransportFactory};
use proxybench::proxies::utils::io::LatencyProbe;
use proxybench::validation::{CheckType, ResponseValidation, ValidationCheck};
use proxybench::{BenchError, BenchmarkEngine, Phase};

/// How a mocked proxy behaves, keyed by host.
#[derive(Clone)]
enum Behaviour {
    Respond { delay: Duration, body: &'static str },
    Fail { delay: Duration },
    Unbuildable,
}

/// When each mocked call started, as `(kind, host, instant)`.
type Timeline = Arc<Mutex<Vec<(&'static str, String, Instant)>>>;

fn mark(timeline: &Timeline, kind: &'static str, host: &str) {
    timeline.lock().push((kind, host.to_string(), Instant::now()));
}

fn starts(timeline: &Timeline, kind: &str, host: &str) -> Vec<Instant> {
    timeline
        .lock()
        .iter()
        .filter(|(k, h, _)| *k == kind && h == host)
        .map(|(_, _, at)| *at)
        .collect()
}

struct MockTransport {
    host: String,
    behaviour: Behaviour,
    calls: Arc<Mutex<usize>>,
    timeline: Timeline,
}

#[async_trait]
impl RequestTransport for MockTransport {
    async fn perform_request(&self, _url: &str) -> ProxyResult<Vec<u8>> {
        *self.calls.lock() += 1;
        mark(&self.timeline, "request", &self.host);
        match &self.behaviour {
            Behaviour::Respond { delay, body } => {
                tokio::time::sleep(*delay).await;
                Ok(body.as_bytes().to_vec())
            }
            Behaviour::Fail { delay } => {
                tokio::time::sleep(*delay).await;
                Err(ProxyError::Request("connection reset".into()))
            }
            Behaviour::Unbuildable => unreachable!(),
        }
    }
}

#[derive(Default)]
struct MockFactory {
    behaviours: HashMap<String, Behaviour>,
    calls: Arc<Mutex<usize>>,
    builds: Arc<Mutex<usize>>,
    timeline: Timeline,
}

impl MockFactory {
    fn with(mut self, host: &str, behaviour: Behaviour) -> Self {
        self.behaviours.insert(host.to_string(), behaviour);
        self
    }

    fn timed(mut self, timeline: &Timeline) -> Self {
        self.timeline = Arc::clone(timeline);
        self
    }
}

impl TransportFactory for MockFactory {
    fn build(
        &self,
        proxy: &ProxyEndpoint,
        _timeout: Duration,
    ) -> ProxyResult<Arc<dyn RequestTransport>> {
        *self.builds.lock() += 1;
        match self.behaviours.get(&proxy.host) {
            Some(Behaviour::Unbuildable) | None => Err(
                ProxyError::TransportSetup(format!("bad proxy {}", proxy.host)),
            ),
            Some(behaviour) => Ok(Arc::new(MockTransport {
                host: proxy.host.clone(),
                behaviour: behaviour.clone(),
                calls: Arc::clone(&self.calls),
                timeline: Arc::clone(&self.timeline),
            })),
        }
    }
}

/// Fixed ping per host; hosts not listed fail to connect.
struct MockProbe {
    pings: HashMap<String, Duration>,
    timeline: Timeline,
}

#[async_trait]
impl LatencyProbe for MockProbe {
    async fn ping(&self, proxy: &ProxyEndpoint) -> ProxyResult<Duration> {
        mark(&self.timeline, "ping", &proxy.host);
        match self.pings.get(&proxy.host) {
            Some(d) => {
                tokio::time::sleep(*d).await;
                Ok(*d)
            }
            None => Err(ProxyError::Connect {
                addr: proxy.address(),
                source: std::io::Error::from(
                    std::io::ErrorKind::ConnectionRefused,
                ),
            }),
        }
    }
}

fn probe(pings: &[(&str, u64)]) -> Arc<MockProbe> {
    timed_probe(pings, &Timeline::default())
}

fn timed_probe(pings: &[(&str, u64)], timeline: &Timeline) -> Arc<MockProbe> {
    Arc::new(MockProbe {
        pings: pings
            .iter()
            .map(|(h, ms)| (h.to_string(), Duration::from_millis(*ms)))
            .collect(),
        timeline: Arc::clone(timeline),
    })
}

fn config(proxies: &[&str], requests: usize) -> Config {
    Config {
        proxies: proxies.iter().map(|p| p.to_string()).collect(),
        benchmark: BenchmarkConfig {
            requests,
            interval_ms: 100,
            warmup_requests: 2,
            target_url: "http://target.test/get".into(),
            concurrency: 1,
            timeout_ms: 1_000,
            response_validation: None,
        },
        statistics: StatisticsConfig::default(),
    }
}

const GOOD: &str = "http:good:8080:u:p:enabled";
const BAD: &str = "socks:bad:1080:u:p:enabled";

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

#[tokio::test(start_paused = true)]
async fn failing_and_succeeding_proxies() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(50), body: "{}" })
        .with("bad", Behaviour::Fail { delay: ms(20) });
    let engine = BenchmarkEngine::with_components(
        config(&[GOOD, BAD], 5),
        Arc::new(factory),
        probe(&[("good", 10), ("bad", 10)]),
    );

    engine.run().await.unwrap();
    assert_eq!(engine.phase(), Phase::Done);

    let results = engine.results();
    assert_eq!(results.len(), 2);

    let bad = &results[BAD].request_metrics;
    assert_eq!((bad.total, bad.successful, bad.failed), (5, 0, 5));
    assert!(bad.times.is_empty());
    assert!(bad.statistics.is_none());
    assert!(results[BAD].derived_metrics.statistics.is_none());

    let good = &results[GOOD].request_metrics;
    assert_eq!((good.total, good.successful, good.failed), (5, 5, 0));
    assert_eq!(good.times, vec![50; 5]);
    let stats = good.statistics.as_ref().unwrap();
    assert!(stats.min <= stats.max);

    let derived = &results[GOOD].derived_metrics;
    assert_eq!(derived.processing_times, vec![30; 5]);
    assert_eq!(derived.statistics.as_ref().unwrap().mean, Some(30.0));
}

#[tokio::test(start_paused = true)]
async fn failed_pings_record_zero_and_keep_full_request_time() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(40), body: "{}" });
    let engine = BenchmarkEngine::with_components(
        config(&[GOOD], 3),
        Arc::new(factory),
        probe(&[]),
    );

    engine.run().await.unwrap();
    let results = engine.results();
    let metrics = &results[GOOD];

    assert_eq!(metrics.ping_metrics.times, vec![0, 0, 0]);
    assert_eq!(metrics.derived_metrics.processing_times, vec![40, 40, 40]);
}

#[tokio::test(start_paused = true)]
async fn derived_times_clamp_at_zero() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(30), body: "{}" });
    let engine = BenchmarkEngine::with_components(
        config(&[GOOD], 2),
        Arc::new(factory),
        probe(&[("good", 25)]),
    );

    engine.run().await.unwrap();
    let results = engine.results();
    let metrics = &results[GOOD];

    assert_eq!(metrics.ping_metrics.times, vec![25, 25]);
    assert_eq!(metrics.derived_metrics.processing_times, vec![0, 0]);
}

#[tokio::test(start_paused = true)]
async fn timed_out_request_counts_its_elapsed_time_as_failure() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(5_000), body: "{}" });
    let engine = BenchmarkEngine::with_components(
        config(&[GOOD], 2),
        Arc::new(factory),
        probe(&[("good", 1)]),
    );

    engine.run().await.unwrap();
    let results = engine.results();
    let request = &results[GOOD].request_metrics;

    assert_eq!((request.total, request.successful, request.failed), (2, 0, 2));
    assert!(request.times.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unbuildable_transport_fails_every_request() {
    let factory = MockFactory::default().with("bad", Behaviour::Unbuildable);
    let engine = BenchmarkEngine::with_components(
        config(&[BAD], 4),
        Arc::new(factory),
        probe(&[("bad", 3)]),
    );

    engine.run().await.unwrap();
    let results = engine.results();
    let metrics = &results[BAD];

    assert_eq!(metrics.request_metrics.total, 4);
    assert_eq!(metrics.request_metrics.failed, 4);
    assert_eq!(metrics.ping_metrics.times.len(), 4);
    assert!(metrics.derived_metrics.processing_times.is_empty());
}

#[tokio::test(start_paused = true)]
async fn validation_failure_is_a_failed_request() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(10), body: r#"{"id":2}"# })
        .with("bad", Behaviour::Respond { delay: ms(10), body: r#"{"id":1}"# });

    let mut config = config(&[GOOD, BAD], 3);
    config.benchmark.response_validation = Some(ResponseValidation {
        enabled: true,
        checks: vec![ValidationCheck {
            path: "id".into(),
            kind: CheckType::Number,
            value: Some(serde_json::json!(1)),
        }],
    });

    let engine = BenchmarkEngine::with_components(
        config,
        Arc::new(factory),
        probe(&[("good", 1), ("bad", 1)]),
    );
    engine.run().await.unwrap();
    let results = engine.results();

    // "good" answers with the wrong id, "bad" with the right one
    assert_eq!(results[GOOD].request_metrics.failed, 3);
    assert_eq!(results[BAD].request_metrics.successful, 3);
}

#[tokio::test(start_paused = true)]
async fn disabled_validation_accepts_any_body() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(10), body: "<html>" });

    let mut config = config(&[GOOD], 2);
    config.benchmark.response_validation = Some(ResponseValidation {
        enabled: false,
        checks: vec![ValidationCheck {
            path: "id".into(),
            kind: CheckType::Number,
            value: None,
        }],
    });

    let engine = BenchmarkEngine::with_components(
        config,
        Arc::new(factory),
        probe(&[("good", 1)]),
    );
    engine.run().await.unwrap();

    assert_eq!(engine.results()[GOOD].request_metrics.successful, 2);
}

#[tokio::test(start_paused = true)]
async fn warmup_runs_before_measurement_and_is_not_recorded() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(10), body: "{}" });
    let calls = Arc::clone(&factory.calls);

    let engine = BenchmarkEngine::with_components(
        config(&[GOOD], 3),
        Arc::new(factory),
        probe(&[("good", 1)]),
    );
    engine.run().await.unwrap();

    // 2 warmup + 3 measured
    assert_eq!(*calls.lock(), 5);
    assert_eq!(engine.results()[GOOD].request_metrics.total, 3);
}

#[tokio::test(start_paused = true)]
async fn transports_are_built_once_per_proxy_per_run() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(10), body: "{}" })
        .with("bad", Behaviour::Unbuildable);
    let builds = Arc::clone(&factory.builds);
    let calls = Arc::clone(&factory.calls);

    let engine = BenchmarkEngine::with_components(
        config(&[GOOD, BAD], 3),
        Arc::new(factory),
        probe(&[("good", 1), ("bad", 1)]),
    );

    engine.run().await.unwrap();
    // one build each, shared by warmup and the request phase
    assert_eq!(*builds.lock(), 2);
    assert_eq!(*calls.lock(), 5);
    assert_eq!(engine.results()[BAD].request_metrics.failed, 3);

    engine.run().await.unwrap();
    assert_eq!(*builds.lock(), 4);
}

#[tokio::test(start_paused = true)]
async fn interval_separates_iterations_but_not_the_first() {
    let timeline = Timeline::default();
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(0), body: "{}" })
        .timed(&timeline);

    let mut config = config(&[GOOD], 3);
    config.benchmark.warmup_requests = 0;

    let engine = BenchmarkEngine::with_components(
        config,
        Arc::new(factory),
        timed_probe(&[("good", 0)], &timeline),
    );

    let t0 = Instant::now();
    engine.run().await.unwrap();

    assert_eq!(
        starts(&timeline, "ping", "good"),
        vec![t0, t0 + ms(100), t0 + ms(200)]
    );
    assert_eq!(
        starts(&timeline, "request", "good"),
        vec![t0 + ms(200), t0 + ms(300), t0 + ms(400)]
    );
}

#[tokio::test(start_paused = true)]
async fn slow_warmup_holds_back_every_proxy() {
    const SLOW: &str = "http:slow:8080:u:p:enabled";

    let timeline = Timeline::default();
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(10), body: "{}" })
        .with("slow", Behaviour::Respond { delay: ms(300), body: "{}" })
        .timed(&timeline);

    let engine = BenchmarkEngine::with_components(
        config(&[GOOD, SLOW], 2),
        Arc::new(factory),
        timed_probe(&[("good", 5), ("slow", 5)], &timeline),
    );

    let t0 = Instant::now();
    engine.run().await.unwrap();

    // two 300ms warmup requests on "slow"
    let warmup_done = t0 + ms(600);
    for host in ["good", "slow"] {
        assert_eq!(
            starts(&timeline, "ping", host),
            vec![warmup_done, warmup_done + ms(105)]
        );
    }

    // warmup at 0 and 10, then nothing until every ping has finished
    let pings_done = warmup_done + ms(110);
    assert_eq!(
        starts(&timeline, "request", "good"),
        vec![t0, t0 + ms(10), pings_done, pings_done + ms(110)]
    );
}

#[tokio::test(start_paused = true)]
async fn identical_runs_give_identical_statistics() {
    let run = || async {
        let factory = MockFactory::default()
            .with("good", Behaviour::Respond { delay: ms(70), body: "{}" })
            .with("bad", Behaviour::Respond { delay: ms(120), body: "{}" });
        let engine = BenchmarkEngine::with_components(
            config(&[GOOD, BAD], 4),
            Arc::new(factory),
            probe(&[("good", 5), ("bad", 15)]),
        );
        engine.run().await.unwrap();
        engine.results()
    };

    let first = run().await;
    let second = run().await;

    for proxy in [GOOD, BAD] {
        assert_eq!(
            first[proxy].request_metrics.statistics,
            second[proxy].request_metrics.statistics
        );
        assert_eq!(
            first[proxy].derived_metrics.statistics,
            second[proxy].derived_metrics.statistics
        );
    }
}

#[tokio::test(start_paused = true)]
async fn counters_stay_consistent_across_mixed_outcomes() {
    let factory = MockFactory::default()
        .with("good", Behaviour::Respond { delay: ms(5), body: "{}" })
        .with("bad", Behaviour::Fail { delay: ms(5) });
    let engine = BenchmarkEngine::with_components(
        config(&[GOOD, BAD, "http:other:1:u:p:enabled"], 6),
        Arc::new(factory),
        probe(&[("good", 1)]),
    );
    engine.run().await.unwrap();

    for metrics in engine.results().values() {
        let r = &metrics.request_metrics;
        assert_eq!(r.successful + r.failed, r.total);
        assert_eq!(r.times.len() as u64, r.successful);
        assert!(metrics
            .derived_metrics
            .processing_times
            .iter()
            .all(|t| *t >= 0));
    }
}

#[tokio::test]
async fn run_without_enabled_proxies_fails() {
    let engine = BenchmarkEngine::with_components(
        config(&["http:off:1:u:p:disabled"], 1),
        Arc::new(MockFactory::default()),
        probe(&[]),
    );

    assert!(matches!(engine.run().await, Err(BenchError::NoProxies)));
    assert_eq!(engine.phase(), Phase::Failed);
}

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::future::join_all;
use parking_lot::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{BenchError, Result};
use crate::models::proxy_endpoint::ProxyEndpoint;
use crate::proxies::common::ProxyError;
use crate::proxies::transport::{
    ReqwestTransportFactory, RequestTransport, TransportFactory,
};
use crate::proxies::utils::io::{LatencyProbe, TcpProbe};
use crate::validation::ResponseValidator;

use super::metrics::{MetricsSnapshot, ProxyMetrics};

/// Lifecycle of a run. Phases are global: none starts before the
/// previous one has finished for every proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Warmup,
    Pinging,
    RequestBenchmarking,
    DerivingMetrics,
    ComputingStatistics,
    Done,
    Failed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Warmup => "warmup",
            Phase::Pinging => "ping measurement",
            Phase::RequestBenchmarking => "request benchmarking",
            Phase::DerivingMetrics => "derived metrics",
            Phase::ComputingStatistics => "statistics",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The phases that fan out one worker per proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Measurement {
    Warmup,
    Ping,
    Request,
}

impl From<Measurement> for Phase {
    fn from(m: Measurement) -> Self {
        match m {
            Measurement::Warmup => Phase::Warmup,
            Measurement::Ping => Phase::Pinging,
            Measurement::Request => Phase::RequestBenchmarking,
        }
    }
}

/// A proxy's transport, built once per run. Warmup and the request phase
/// share it, and with it the connection pool.
type SharedTransport =
    std::result::Result<Arc<dyn RequestTransport>, Arc<ProxyError>>;

/// Per-proxy state registered at the start of a run.
struct ProxySlot {
    metrics: Arc<ProxyMetrics>,
    transport: SharedTransport,
}

/// Drives warmup, ping and request phases across all enabled proxies,
/// then derives processing times and computes statistics.
pub struct BenchmarkEngine {
    config: Arc<Config>,
    proxies: Vec<ProxyEndpoint>,
    slots: DashMap<String, ProxySlot>,
    phase: RwLock<Phase>,
    transports: Arc<dyn TransportFactory>,
    probe: Arc<dyn LatencyProbe>,
    validator: Option<Arc<ResponseValidator>>,
}

impl BenchmarkEngine {
    pub fn new(config: Config) -> Self {
        let probe = TcpProbe::new(config.benchmark.timeout());
        Self::with_components(
            config,
            Arc::new(ReqwestTransportFactory),
            Arc::new(probe),
        )
    }

    /// Builds an engine over caller-supplied transport and probe.
    pub fn with_components(
        config: Config,
        transports: Arc<dyn TransportFactory>,
        probe: Arc<dyn LatencyProbe>,
    ) -> Self {
        let proxies = config.enabled_proxies();
        let validator = config
            .benchmark
            .response_validation
            .as_ref()
            .filter(|v| v.enabled)
            .map(|v| Arc::new(ResponseValidator::new(v)));

        if config.benchmark.concurrency != proxies.len() {
            debug!(
                "concurrency={} does not limit fan-out; running {} workers per phase",
                config.benchmark.concurrency,
                proxies.len()
            );
        }

        Self {
            config: Arc::new(config),
            proxies,
            slots: DashMap::new(),
            phase: RwLock::new(Phase::Idle),
            transports,
            probe,
            validator,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.read()
    }

    fn set_phase(&self, phase: Phase) {
        *self.phase.write() = phase;
    }

    /// Runs every phase in order. Per-iteration failures are recorded,
    /// never returned; only phase-level failures abort the run.
    pub async fn run(&self) -> Result<()> {
        info!("Starting proxy benchmark...");

        if let Err(e) = self.run_phases().await {
            self.set_phase(Phase::Failed);
            return Err(e);
        }

        self.set_phase(Phase::Done);
        info!("Benchmark completed successfully!");
        Ok(())
    }

    async fn run_phases(&self) -> Result<()> {
        if self.proxies.is_empty() {
            return Err(BenchError::NoProxies);
        }

        self.slots.clear();
        let timeout = self.config.benchmark.timeout();
        for proxy in &self.proxies {
            let id = proxy.identity();
            let transport =
                self.transports.build(proxy, timeout).map_err(Arc::new);
            let slot = ProxySlot {
                metrics: Arc::new(ProxyMetrics::new(id.clone())),
                transport,
            };
            self.slots.insert(id, slot);
        }

        self.run_measurement(Measurement::Warmup).await?;
        self.run_measurement(Measurement::Ping).await?;
        self.run_measurement(Measurement::Request).await?;

        self.set_phase(Phase::DerivingMetrics);
        info!("Calculating derived metrics...");
        self.calculate_derived_metrics();

        self.set_phase(Phase::ComputingStatistics);
        info!("Calculating statistics...");
        self.calculate_statistics();

        Ok(())
    }

    /// Spawns one worker per proxy and waits for all of them.
    async fn run_measurement(&self, measurement: Measurement) -> Result<()> {
        let phase = Phase::from(measurement);
        self.set_phase(phase);
        info!("Running {} phase...", phase);

        let mut handles = Vec::with_capacity(self.proxies.len());
        for proxy in &self.proxies {
            let worker = self.worker(proxy)?;
            handles.push(tokio::spawn(async move {
                match measurement {
                    Measurement::Warmup => worker.warmup().await,
                    Measurement::Ping => worker.ping().await,
                    Measurement::Request => worker.benchmark_requests().await,
                }
            }));
        }

        let failures: Vec<String> = self
            .proxies
            .iter()
            .zip(join_all(handles).await)
            .filter_map(|(proxy, joined)| {
                joined
                    .err()
                    .map(|e| format!("{}: {}", proxy.address(), e))
            })
            .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BenchError::Phase {
                phase: phase.name(),
                reason: failures.join("; "),
            })
        }
    }

    fn worker(&self, proxy: &ProxyEndpoint) -> Result<ProxyWorker> {
        let slot = self
            .slots
            .get(&proxy.identity())
            .ok_or_else(|| BenchError::Phase {
                phase: self.phase().name(),
                reason: format!("no metrics registered for {}", proxy.address()),
            })?;

        Ok(ProxyWorker {
            proxy: proxy.clone(),
            metrics: Arc::clone(&slot.metrics),
            transport: slot.transport.clone(),
            config: Arc::clone(&self.config),
            probe: Arc::clone(&self.probe),
            validator: self.validator.clone(),
        })
    }

    /// `processing[i] = max(0, request[i] - 2 * ping[i])`, index-aligned
    /// and truncated to the shorter series.
    fn calculate_derived_metrics(&self) {
        for entry in self.slots.iter() {
            let metrics = &entry.value().metrics;
            let requests = metrics.request_times();
            let pings = metrics.ping_times();

            for (request, ping) in requests.iter().zip(pings.iter()) {
                metrics.record_derived(derived_time(*request, *ping));
            }
        }
    }

    fn calculate_statistics(&self) {
        for entry in self.slots.iter() {
            entry.value().metrics.compute_statistics(&self.config.statistics);
        }
    }

    /// Finalized metrics keyed by proxy identity.
    pub fn results(&self) -> BTreeMap<String, MetricsSnapshot> {
        self.slots
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().metrics.snapshot()))
            .collect()
    }
}

pub fn derived_time(request_ms: i64, ping_ms: i64) -> i64 {
    request_ms.saturating_sub(ping_ms.saturating_mul(2)).max(0)
}

/// Everything one proxy's worker needs for a phase.
struct ProxyWorker {
    proxy: ProxyEndpoint,
    metrics: Arc<ProxyMetrics>,
    transport: SharedTransport,
    config: Arc<Config>,
    probe: Arc<dyn LatencyProbe>,
    validator: Option<Arc<ResponseValidator>>,
}

impl ProxyWorker {
    /// Primes pools and caches. Outcomes are only logged.
    #[instrument(skip_all, fields(proxy = %self.proxy.address()))]
    async fn warmup(self) {
        let transport = match &self.transport {
            Ok(t) => Arc::clone(t),
            Err(e) => {
                warn!("Failed to create client: {}", e);
                return;
            }
        };

        for i in 0..self.config.benchmark.warmup_requests {
            match self.request_once(transport.as_ref()).await {
                Ok(()) => debug!("Warmup request {} succeeded", i + 1),
                Err(e) => warn!("Warmup request failed: {}", e),
            }
        }
    }

    #[instrument(skip_all, fields(proxy = %self.proxy.address()))]
    async fn ping(self) {
        let interval = self.config.benchmark.interval();

        for i in 0..self.config.benchmark.requests {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }

            match self.probe.ping(&self.proxy).await {
                Ok(elapsed) => self.metrics.record_ping(elapsed),
                Err(e) => {
                    warn!("Ping failed: {}", e);
                    self.metrics.record_ping(Duration::ZERO);
                }
            }
        }
    }

    #[instrument(skip_all, fields(proxy = %self.proxy.address()))]
    async fn benchmark_requests(self) {
        let requests = self.config.benchmark.requests;

        let transport = match &self.transport {
            Ok(t) => Arc::clone(t),
            Err(e) => {
                warn!("Failed to create client: {}", e);
                for _ in 0..requests {
                    self.metrics.record_request(Duration::ZERO, false);
                }
                return;
            }
        };

        let interval = self.config.benchmark.interval();
        for i in 0..requests {
            if i > 0 {
                tokio::time::sleep(interval).await;
            }

            let start = Instant::now();
            let outcome = self.request_once(transport.as_ref()).await;
            let elapsed = start.elapsed();

            match outcome {
                Ok(()) => self.metrics.record_request(elapsed, true),
                Err(e) => {
                    if self.validator.is_some() {
                        warn!("Request/Validation failed: {}", e);
                    } else {
                        warn!("Request failed: {}", e);
                    }
                    self.metrics.record_request(elapsed, false);
                }
            }
        }
    }

    /// One GET bounded by the per-request timeout, then validation.
    async fn request_once(
        &self,
        transport: &dyn RequestTransport,
    ) -> Result<()> {
        let timeout = self.config.benchmark.timeout();
        let url = &self.config.benchmark.target_url;

        let body = tokio::time::timeout(timeout, transport.perform_request(url))
            .await
            .map_err(|_| ProxyError::Timeout(timeout))??;

        if let Some(validator) = &self.validator {
            validator.validate(&body)?;
        }
        Ok(())
    }
}

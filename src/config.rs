use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::benchmark::statistics::StatisticsConfig;
use crate::error::{BenchError, Result};
use crate::models::proxy_endpoint::ProxyEndpoint;
use crate::validation::ResponseValidation;

/// Comma-separated proxy list that replaces `proxies` from the file.
pub const PROXIES_ENV: &str = "PROXYBENCH_PROXIES";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub proxies: Vec<String>,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkConfig {
    #[serde(default = "default_requests")]
    pub requests: usize,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_warmup_requests")]
    pub warmup_requests: usize,
    #[serde(default = "default_target_url")]
    pub target_url: String,
    /// Parsed and reported, but fan-out is always one worker per proxy.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_validation: Option<ResponseValidation>,
}

fn default_requests() -> usize {
    100
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_warmup_requests() -> usize {
    10
}

fn default_target_url() -> String {
    "https://httpbin.org/get".to_string()
}

fn default_concurrency() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            interval_ms: default_interval_ms(),
            warmup_requests: default_warmup_requests(),
            target_url: default_target_url(),
            concurrency: default_concurrency(),
            timeout_ms: default_timeout_ms(),
            response_validation: None,
        }
    }
}

impl BenchmarkConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validation_enabled(&self) -> bool {
        self.response_validation
            .as_ref()
            .map_or(false, |v| v.enabled)
    }
}

impl Config {
    /// Reads a JSON config file, applies env overrides and validates it.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            BenchError::Config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))
        })?;

        let mut config = Self::from_json(&raw)?;
        config.apply_env_overrides();
        config.validate()?;

        info!(
            "Loaded configuration from {} ({} proxies)",
            path.display(),
            config.proxies.len()
        );
        Ok(config)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| BenchError::Config(e.to_string()))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(proxies) = proxies_from_env() {
            info!(
                "Using {} proxies from {}",
                proxies.len(),
                PROXIES_ENV
            );
            self.proxies = proxies;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let bench = &self.benchmark;

        if bench.timeout_ms == 0 {
            return Err(BenchError::Config(
                "benchmark.timeout_ms must be greater than zero".into(),
            ));
        }
        if bench.target_url.trim().is_empty() {
            return Err(BenchError::Config(
                "benchmark.target_url must not be empty".into(),
            ));
        }

        for p in &self.statistics.percentiles {
            if !(*p > 0.0 && *p < 100.0) {
                return Err(BenchError::Config(format!(
                    "percentile {} is outside (0, 100)",
                    p
                )));
            }
        }

        if let Some(validation) = &bench.response_validation {
            for check in &validation.checks {
                if let Some(expected) = &check.value {
                    if !check.kind.accepts_value(expected) {
                        return Err(BenchError::Config(format!(
                            "check '{}' of type {} cannot expect {}",
                            check.path, check.kind, expected
                        )));
                    }
                }
            }
        }

        Ok(())
    }

    /// Parses the proxy list, dropping malformed, disabled and
    /// duplicate entries.
    pub fn enabled_proxies(&self) -> Vec<ProxyEndpoint> {
        let mut seen = HashSet::new();
        let mut proxies = Vec::new();
        for raw in &self.proxies {
            match raw.parse::<ProxyEndpoint>() {
                Ok(proxy) if proxy.enabled => {
                    if seen.insert(proxy.identity()) {
                        proxies.push(proxy);
                    } else {
                        warn!("Skipping duplicate proxy {}", proxy.address());
                    }
                }
                Ok(proxy) => {
                    info!("Skipping disabled proxy {}", proxy.address())
                }
                Err(e) => warn!("Skipping invalid proxy {}: {}", raw, e),
            }
        }
        proxies
    }
}

fn proxies_from_env() -> Option<Vec<String>> {
    let value = std::env::var(PROXIES_ENV).ok()?;
    let proxies: Vec<String> = value
        .split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    (!proxies.is_empty()).then_some(proxies)
}

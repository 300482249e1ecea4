use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::benchmark::metrics::MetricsSnapshot;
use crate::error::Result;

/// Full result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkReport {
    pub run_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub proxies: Vec<MetricsSnapshot>,
}

/// Derived-metric mean per proxy.
#[derive(Debug, Clone, Serialize)]
pub struct ShortSummary {
    pub timestamp: DateTime<Utc>,
    pub proxies: BTreeMap<String, f64>,
}

pub struct Reporter {
    run_id: Uuid,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Proxies are listed in identity order.
    pub fn generate_report(
        &self,
        results: &BTreeMap<String, MetricsSnapshot>,
    ) -> BenchmarkReport {
        BenchmarkReport {
            run_id: self.run_id,
            timestamp: Utc::now(),
            proxies: results.values().cloned().collect(),
        }
    }

    /// Proxies without derived statistics report `0.0`.
    pub fn generate_short_summary(
        &self,
        results: &BTreeMap<String, MetricsSnapshot>,
    ) -> ShortSummary {
        let proxies = results
            .iter()
            .map(|(proxy, snapshot)| {
                let mean = snapshot
                    .derived_metrics
                    .statistics
                    .as_ref()
                    .and_then(|s| s.mean)
                    .unwrap_or(0.0);
                (proxy.clone(), mean)
            })
            .collect();

        ShortSummary {
            timestamp: Utc::now(),
            proxies,
        }
    }

    pub async fn save<T: Serialize>(
        &self,
        value: &T,
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(value)?;
        tokio::fs::write(path, json).await?;
        info!("Saved {}", path.display());
        Ok(())
    }
}

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which optional statistics to compute. Shared by every proxy in a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsConfig {
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default = "default_true")]
    pub mean: bool,
    #[serde(default = "default_true")]
    pub median: bool,
}

fn default_percentiles() -> Vec<f64> {
    vec![90.0, 95.0, 99.0]
}

fn default_true() -> bool {
    true
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            percentiles: default_percentiles(),
            mean: true,
            median: true,
        }
    }
}

/// Descriptive statistics of one sample series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub min: i64,
    pub max: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub median: Option<f64>,
    pub std_dev: f64,
    /// Keyed by the percentile with one decimal, e.g. `"95.0"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<BTreeMap<String, f64>>,
}

impl Statistics {
    /// Returns `None` for an empty series.
    pub fn compute(
        values: &[i64],
        config: &StatisticsConfig,
    ) -> Option<Statistics> {
        if values.is_empty() {
            return None;
        }

        let mut sorted = values.to_vec();
        sorted.sort_unstable();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = arithmetic_mean(&sorted);

        let percentiles = if config.percentiles.is_empty() {
            None
        } else {
            Some(
                config
                    .percentiles
                    .iter()
                    .map(|p| (percentile_key(*p), percentile(&sorted, *p)))
                    .collect(),
            )
        };

        Some(Statistics {
            min,
            max,
            mean: config.mean.then_some(mean),
            median: config.median.then(|| percentile(&sorted, 50.0)),
            std_dev: std_dev(&sorted, mean),
            percentiles,
        })
    }
}

pub fn percentile_key(p: f64) -> String {
    format!("{:.1}", p)
}

fn arithmetic_mean(values: &[i64]) -> f64 {
    values.iter().map(|v| *v as f64).sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_dev(values: &[i64], mean: f64) -> f64 {
    let variance = values
        .iter()
        .map(|v| {
            let d = *v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64;
    variance.sqrt()
}

/// Linear interpolation between closest ranks over a sorted series.
///
/// Rank is `p / 100 * (n - 1)`, so the result is non-decreasing in `p`
/// and always within `[min, max]`.
pub fn percentile(sorted: &[i64], p: f64) -> f64 {
    let last = sorted.len() - 1;
    let rank = (p.clamp(0.0, 100.0) / 100.0) * last as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    let lo = sorted[lower] as f64;
    let hi = sorted[upper.min(last)] as f64;
    lo + (hi - lo) * (rank - lower as f64)
}

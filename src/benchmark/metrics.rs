use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use super::statistics::{Statistics, StatisticsConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestMetrics {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    /// Successful requests only, in issue order.
    pub times: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PingMetrics {
    pub times: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// Request time minus twice the ping time, per index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub processing_times: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// Read-only copy of one proxy's metrics, as handed to reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub proxy: String,
    pub request_metrics: RequestMetrics,
    pub ping_metrics: PingMetrics,
    pub derived_metrics: DerivedMetrics,
}

#[derive(Debug, Default)]
struct Series {
    request: RequestMetrics,
    ping: PingMetrics,
    derived: DerivedMetrics,
}

/// Per-proxy accumulator of timing samples and request counters.
///
/// Each proxy's worker is the only writer, but all access still goes
/// through the lock so a reader never sees a half-applied record.
#[derive(Debug)]
pub struct ProxyMetrics {
    proxy: String,
    series: Mutex<Series>,
}

impl ProxyMetrics {
    pub fn new(proxy: impl Into<String>) -> Self {
        Self {
            proxy: proxy.into(),
            series: Mutex::new(Series::default()),
        }
    }

    pub fn proxy(&self) -> &str {
        &self.proxy
    }

    /// Counts one request. Only successes contribute a sample.
    pub fn record_request(&self, duration: Duration, success: bool) {
        let mut guard = self.series.lock();
        let request = &mut guard.request;

        request.total += 1;
        if success {
            request.successful += 1;
            request.times.push(as_millis(duration));
        } else {
            request.failed += 1;
        }
    }

    pub fn record_ping(&self, duration: Duration) {
        self.series.lock().ping.times.push(as_millis(duration));
    }

    pub fn record_derived(&self, millis: i64) {
        self.series
            .lock()
            .derived
            .processing_times
            .push(millis);
    }

    pub fn request_times(&self) -> Vec<i64> {
        self.series.lock().request.times.clone()
    }

    pub fn ping_times(&self) -> Vec<i64> {
        self.series.lock().ping.times.clone()
    }

    pub fn derived_times(&self) -> Vec<i64> {
        self.series.lock().derived.processing_times.clone()
    }

    /// `(total, successful, failed)`
    pub fn request_counts(&self) -> (u64, u64, u64) {
        let series = self.series.lock();
        (
            series.request.total,
            series.request.successful,
            series.request.failed,
        )
    }

    /// Attaches statistics for all three series in one critical section.
    pub fn compute_statistics(&self, config: &StatisticsConfig) {
        let mut guard = self.series.lock();
        let series = &mut *guard;
        series.request.statistics =
            Statistics::compute(&series.request.times, config);
        series.ping.statistics =
            Statistics::compute(&series.ping.times, config);
        series.derived.statistics =
            Statistics::compute(&series.derived.processing_times, config);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let series = self.series.lock();
        MetricsSnapshot {
            proxy: self.proxy.clone(),
            request_metrics: series.request.clone(),
            ping_metrics: series.ping.clone(),
            derived_metrics: series.derived.clone(),
        }
    }
}

fn as_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

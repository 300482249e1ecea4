pub mod engine;
pub mod metrics;
pub mod statistics;

pub use engine::{BenchmarkEngine, Phase};
pub use metrics::{MetricsSnapshot, ProxyMetrics};
pub use statistics::{Statistics, StatisticsConfig};

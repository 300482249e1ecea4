pub mod benchmark;
pub mod config;
pub mod error;
pub mod models;
pub mod proxies;
pub mod report;
pub mod validation;

pub use benchmark::{BenchmarkEngine, Phase};
pub use config::Config;
pub use error::{BenchError, Result};

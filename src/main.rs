use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use proxybench::{report::Reporter, BenchmarkEngine, Config};

/// Benchmarks HTTP(S) and SOCKS5 proxies against a target URL.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Where to write the full report
    #[arg(long, default_value = "result.json")]
    output: PathBuf,

    /// Where to write the per-proxy summary
    #[arg(long, default_value = "results_short.json")]
    summary: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proxybench=info".into()),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    if !args.config.exists() {
        bail!(
            "Configuration file not found: {}",
            args.config.display()
        );
    }

    info!("Loading configuration from {}...", args.config.display());
    let config = Config::from_file(&args.config)
        .context("Failed to load configuration")?;

    let engine = BenchmarkEngine::new(config);
    engine.run().await.context("Benchmark failed")?;

    let reporter = Reporter::new();
    let results = engine.results();

    let report = reporter.generate_report(&results);
    reporter
        .save(&report, &args.output)
        .await
        .context("Failed to save report")?;

    let summary = reporter.generate_short_summary(&results);
    reporter
        .save(&summary, &args.summary)
        .await
        .context("Failed to save short summary")?;

    info!(
        "Benchmark results saved to {} and {}",
        args.output.display(),
        args.summary.display()
    );
    Ok(())
}

//! layoutbench binary
//!
//! Benchmarks every storage layout across a set of record counts and writes
//! a summary table plus a CSV of averaged results.

use std::path::PathBuf;

use clap::Parser;
use layoutbench::bench::{self, BenchConfig};
use layoutbench::{StrategyKind, WalSyncStrategy};
use tracing_subscriber::{fmt, EnvFilter};

/// Storage layout benchmark
#[derive(Parser, Debug)]
#[command(name = "layoutbench")]
#[command(about = "Benchmark record layouts over an embedded bucket store")]
#[command(version)]
struct Args {
    /// Record counts to benchmark (comma separated)
    #[arg(short, long, value_delimiter = ',', default_value = "10,100,1000,10000")]
    counts: Vec<usize>,

    /// Trials per strategy and record count
    #[arg(short, long, default_value = "10")]
    runs: usize,

    /// CSV output path
    #[arg(short, long, default_value = "benchmark_results.csv")]
    output: PathBuf,

    /// Only benchmark this strategy (repeatable; default: all)
    #[arg(short, long = "strategy")]
    strategies: Vec<StrategyKind>,

    /// Parent directory for trial databases
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// fsync the WAL every N commits (0 = every commit)
    #[arg(long, default_value = "1000")]
    sync_every: usize,

    /// Seed for sampling read/update ids
    #[arg(long, default_value = "42")]
    seed: u64,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,layoutbench=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let args = Args::parse();

    tracing::info!("layoutbench v{}", layoutbench::VERSION);

    let defaults = BenchConfig::default();
    let config = BenchConfig {
        counts: args.counts,
        runs: args.runs,
        strategies: if args.strategies.is_empty() {
            defaults.strategies
        } else {
            args.strategies
        },
        work_dir: args.work_dir.unwrap_or(defaults.work_dir),
        sync_strategy: match args.sync_every {
            0 => WalSyncStrategy::EveryWrite,
            count => WalSyncStrategy::EveryNEntries { count },
        },
        seed: args.seed,
    };

    tracing::info!(
        counts = ?config.counts,
        runs = config.runs,
        work_dir = %config.work_dir.display(),
        "starting benchmark"
    );

    let results = match bench::run_suite(&config) {
        Ok(results) => results,
        Err(e) => {
            tracing::error!("Benchmark failed: {}", e);
            std::process::exit(1);
        }
    };

    bench::print_results(&results);

    if let Err(e) = bench::write_csv(&args.output, &results) {
        tracing::error!("Failed to write CSV {}: {}", args.output.display(), e);
        std::process::exit(1);
    }
    println!("\nWrote CSV: {}", args.output.display());
}

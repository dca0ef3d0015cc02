//! Benchmark driver
//!
//! ## Trial
//! ```text
//! fresh store in a temp dir
//!   -> setup -> write_all (timed) -> close -> measure size
//!   -> reopen -> reads -> read_many -> balance sum -> balance updates
//!   -> close, temp dir removed
//! ```
//!
//! Every duration is reported per operation (total / number of operations),
//! and trials are repeated `runs` times and averaged.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{Config, WalSyncStrategy};
use crate::error::{LayoutError, Result};
use crate::record::{FieldValue, Record};
use crate::store::{disk_usage, Store};
use crate::strategy::{StorageStrategy, StrategyKind, StrategyVariant};

/// `created_at`/`updated_at` are relative to this instant so records are
/// reproducible across runs
const REFERENCE_TIME: i64 = 1_700_000_000;

/// Value written by the update phase
pub const UPDATE_BALANCE: f64 = 12345.67;

// =============================================================================
// Results
// =============================================================================

/// Timed phase of a trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    Write,
    Read,
    ReadMany,
    FieldSum,
    Update,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Write,
        Operation::Read,
        Operation::ReadMany,
        Operation::FieldSum,
        Operation::Update,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Operation::Write => "Write",
            Operation::Read => "Read",
            Operation::ReadMany => "ReadMany",
            Operation::FieldSum => "FieldSum",
            Operation::Update => "Update",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-operation cost of one phase
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkResult {
    pub strategy: String,
    pub bulk: bool,
    pub operation: Operation,
    pub duration: Duration,
    pub storage_bytes: u64,
    pub record_count: usize,
}

impl BenchmarkResult {
    pub fn insert_mode(&self) -> &'static str {
        crate::strategy::insert_mode(self.bulk)
    }

    pub fn micros(&self) -> f64 {
        self.duration.as_nanos() as f64 / 1e3
    }
}

// =============================================================================
// Data generation
// =============================================================================

/// Deterministic test record for `id`
pub fn generate_record(id: i64) -> Record {
    let mut rng = StdRng::seed_from_u64(id as u64);
    Record {
        id,
        username: format!("user_{}", id),
        email: format!("user{}@example.com", id),
        first_name: format!("First_{}", id),
        last_name: format!("Last_{}", id),
        age: rng.gen_range(18..78),
        height: rng.gen_range(150..200) as f32,
        weight: rng.gen_range(50..150) as f32,
        balance: rng.gen::<f64>() * 10000.0,
        is_active: rng.gen_bool(0.5),
        created_at: REFERENCE_TIME - rng.gen_range(0..365 * 24 * 3600),
        updated_at: REFERENCE_TIME,
        login_count: rng.gen_range(0..1000),
        score: rng.gen::<f64>() * 100.0,
        description: format!(
            "This is a description for user {} with some random text to make it longer and more realistic.",
            id
        ),
    }
}

/// Records with ids `0..count`
pub fn generate_records(count: usize) -> Vec<Record> {
    (0..count as i64).map(generate_record).collect()
}

/// Half of the ids `0..count`, in random order
pub fn sample_ids(count: usize, rng: &mut impl Rng) -> Vec<i64> {
    let mut ids: Vec<i64> = (0..count as i64).collect();
    ids.shuffle(rng);
    ids.truncate(count / 2);
    ids
}

// =============================================================================
// Trials
// =============================================================================

fn per_op(total: Duration, ops: usize) -> Duration {
    if ops == 0 {
        return Duration::ZERO;
    }
    Duration::from_nanos((total.as_nanos() / ops as u128) as u64)
}

fn timed<T>(f: impl FnOnce() -> T) -> (T, Duration) {
    let start = Instant::now();
    let value = f();
    (value, start.elapsed())
}

fn open_store(dir: &Path, sync: WalSyncStrategy) -> Result<Store> {
    Store::open(
        Config::builder()
            .data_dir(dir)
            .wal_sync_strategy(sync)
            .build(),
    )
}

/// Run one trial of `variant` in a fresh store under `work_dir`
///
/// Failures of individual reads and updates are logged and the trial goes on;
/// failures to open, set up or load the store abort it.
pub fn run_trial(
    variant: &StrategyVariant,
    records: &[Record],
    read_ids: &[i64],
    update_ids: &[i64],
    work_dir: &Path,
    sync: WalSyncStrategy,
) -> Result<Vec<BenchmarkResult>> {
    let record_count = records.len();
    let prefix: String = format!("trial_{}_{}_", variant.name(), record_count)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(work_dir)?;

    // Load
    let store = open_store(dir.path(), sync)?;
    variant.setup(&store)?;
    let (loaded, write_total) = timed(|| variant.write_all(&store, records));
    loaded?;
    store.close()?;
    let storage_bytes = disk_usage(dir.path())?;

    // Query
    let store = open_store(dir.path(), sync)?;

    let (_, read_total) = timed(|| {
        for &id in read_ids {
            if let Err(e) = variant.read(&store, id) {
                tracing::warn!(strategy = variant.name(), id, error = %e, "read failed");
            }
        }
    });

    let (batch, read_many_total) = match read_ids.first() {
        Some(&start) => timed(|| variant.read_many(&store, start, read_ids.len())),
        None => (Ok(Vec::new()), Duration::ZERO),
    };
    let batch_len = batch.map(|b| b.len()).unwrap_or_else(|e| {
        tracing::warn!(strategy = variant.name(), error = %e, "read_many failed");
        0
    });

    let (sum, field_sum_total) = timed(|| variant.read_field_sum(&store, "balance", record_count));
    if let Err(e) = sum {
        tracing::warn!(strategy = variant.name(), error = %e, "field sum failed");
    }

    let (_, update_total) = timed(|| {
        for &id in update_ids {
            let value = FieldValue::Float64(UPDATE_BALANCE);
            if let Err(e) = variant.update_field(&store, id, "balance", value) {
                tracing::warn!(strategy = variant.name(), id, error = %e, "update failed");
            }
        }
    });

    store.close()?;

    let phases = [
        (Operation::Write, per_op(write_total, record_count)),
        (Operation::Read, per_op(read_total, read_ids.len())),
        (Operation::ReadMany, per_op(read_many_total, batch_len)),
        (Operation::FieldSum, per_op(field_sum_total, record_count)),
        (Operation::Update, per_op(update_total, update_ids.len())),
    ];

    Ok(phases
        .into_iter()
        .map(|(operation, duration)| BenchmarkResult {
            strategy: variant.name().to_string(),
            bulk: variant.is_bulk(),
            operation,
            duration,
            storage_bytes,
            record_count,
        })
        .collect())
}

/// Repeat [`run_trial`] `runs` times
pub fn run_benchmark(
    variant: &StrategyVariant,
    records: &[Record],
    read_ids: &[i64],
    update_ids: &[i64],
    runs: usize,
    work_dir: &Path,
    sync: WalSyncStrategy,
) -> Result<Vec<BenchmarkResult>> {
    let mut results = Vec::with_capacity(runs * Operation::ALL.len());
    for run in 0..runs {
        tracing::debug!(strategy = variant.name(), bulk = variant.is_bulk(), run, "trial start");
        results.extend(run_trial(variant, records, read_ids, update_ids, work_dir, sync)?);
    }
    Ok(results)
}

/// Mean duration and storage per (strategy, insert mode, operation, count)
///
/// Output is ordered by record count, strategy, single before bulk, then
/// operation.
pub fn average_results(results: &[BenchmarkResult]) -> Vec<BenchmarkResult> {
    let mut groups: BTreeMap<(usize, &str, bool, Operation), Vec<&BenchmarkResult>> =
        BTreeMap::new();
    for r in results {
        groups
            .entry((r.record_count, r.strategy.as_str(), r.bulk, r.operation))
            .or_default()
            .push(r);
    }

    groups
        .into_iter()
        .map(|((record_count, strategy, bulk, operation), group)| {
            let n = group.len();
            let nanos: u128 = group.iter().map(|r| r.duration.as_nanos()).sum();
            let bytes: u64 = group.iter().map(|r| r.storage_bytes).sum();
            BenchmarkResult {
                strategy: strategy.to_string(),
                bulk,
                operation,
                duration: Duration::from_nanos((nanos / n as u128) as u64),
                storage_bytes: bytes / n as u64,
                record_count,
            }
        })
        .collect()
}

// =============================================================================
// Suite
// =============================================================================

/// Driver settings
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Record counts to benchmark, one table each
    pub counts: Vec<usize>,

    /// Trials per (variant, count)
    pub runs: usize,

    /// Layouts to include (both insert modes of each)
    pub strategies: Vec<StrategyKind>,

    /// Parent directory for trial stores
    pub work_dir: PathBuf,

    /// WAL sync strategy of every trial store
    pub sync_strategy: WalSyncStrategy,

    /// Seed for sampling read/update ids
    pub seed: u64,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            counts: vec![10, 100, 1_000, 10_000],
            runs: 10,
            strategies: StrategyKind::ALL.to_vec(),
            work_dir: std::env::temp_dir(),
            sync_strategy: WalSyncStrategy::EveryNEntries { count: 1000 },
            seed: 42,
        }
    }
}

/// Run every (variant, count) combination and return averaged results
pub fn run_suite(config: &BenchConfig) -> Result<Vec<BenchmarkResult>> {
    if config.runs == 0 {
        return Err(LayoutError::Config("runs must be at least 1".to_string()));
    }
    if config.strategies.is_empty() {
        return Err(LayoutError::Config("no strategies selected".to_string()));
    }

    let max_count = config.counts.iter().copied().max().unwrap_or(0);
    let all_records = generate_records(max_count);
    let variants = StrategyVariant::for_kinds(&config.strategies);
    let mut rng = StdRng::seed_from_u64(config.seed);

    let mut results = Vec::new();
    for &count in &config.counts {
        let subset = &all_records[..count];
        let read_ids = sample_ids(count, &mut rng);
        let update_ids = sample_ids(count, &mut rng);

        for variant in &variants {
            tracing::info!(
                strategy = variant.name(),
                insert = variant.insert_mode(),
                records = count,
                "benchmarking"
            );
            results.extend(run_benchmark(
                variant,
                subset,
                &read_ids,
                &update_ids,
                config.runs,
                &config.work_dir,
                config.sync_strategy,
            )?);
        }
    }

    Ok(average_results(&results))
}

// =============================================================================
// Reporting
// =============================================================================

/// One table per record count, one row per (strategy, insert mode)
pub fn render_table(results: &[BenchmarkResult]) -> String {
    type Row<'a> = BTreeMap<Operation, &'a BenchmarkResult>;
    let mut tables: BTreeMap<usize, BTreeMap<(&str, bool), Row<'_>>> = BTreeMap::new();
    for r in results {
        tables
            .entry(r.record_count)
            .or_default()
            .entry((r.strategy.as_str(), r.bulk))
            .or_default()
            .insert(r.operation, r);
    }

    let mut out = String::new();
    for (count, rows) in tables {
        let _ = writeln!(out, "\n--- {} Records ---", count);
        let _ = writeln!(
            out,
            "{:<15} {:<8} {:<10} {:<10} {:<10} {:<10} {:<12} {:<12}",
            "Strategy", "Insert", "Write(μs)", "Read(μs)", "FldSum(μs)", "Update(μs)",
            "ReadMany(μs)", "Storage(KB)"
        );
        let _ = writeln!(out, "{}", "-".repeat(15 + 8 + 10 * 5 + 12));

        for ((strategy, bulk), ops) in rows {
            let us = |op: Operation| ops.get(&op).map_or(0.0, |r| r.micros());
            let size_kb = ops
                .values()
                .next()
                .map_or(0.0, |r| r.storage_bytes as f64 / 1024.0);
            let _ = writeln!(
                out,
                "{:<15} {:<8} {:<10.2} {:<10.2} {:<10.2} {:<10.2} {:<12.2} {:<12.2}",
                strategy,
                crate::strategy::insert_mode(bulk),
                us(Operation::Write),
                us(Operation::Read),
                us(Operation::FieldSum),
                us(Operation::Update),
                us(Operation::ReadMany),
                size_kb
            );
        }
    }
    out
}

/// Print [`render_table`] to stdout
pub fn print_results(results: &[BenchmarkResult]) {
    print!("{}", render_table(results));
}

pub const CSV_HEADER: &str = "Strategy,Insert,RecordCount,Operation,Duration_us,StorageBytes";

/// Write every result as one CSV row
pub fn write_csv(path: &Path, results: &[BenchmarkResult]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "{}", CSV_HEADER)?;
    for r in results {
        writeln!(
            out,
            "{},{},{},{},{:.0},{}",
            r.strategy,
            r.insert_mode(),
            r.record_count,
            r.operation,
            r.micros(),
            r.storage_bytes
        )?;
    }
    out.flush()?;
    Ok(())
}

//! # layoutbench
//!
//! Six physical layouts for structured records over an embedded, ordered,
//! transactional bucket store, plus the driver that benchmarks them:
//! - One uniform strategy contract (write, read, range scan, aggregate, update)
//! - Single-blob layouts: Binary, Binary+Names, JSON, GOB
//! - Decomposed layouts: one key per field (MultiKV), one bucket per record
//!   (NestedBucket)
//! - Write-Ahead Logging and snapshot checkpoints so on-disk size is measurable
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Benchmark Driver                          │
//! │       (generate records, time trials, average, report)       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                StrategyVariant (Single / Bulk)               │
//! │                   StorageStrategy contract                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Codecs    │          │    Store    │
//!   │ (blob/field)│          │  (buckets)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                          ┌────────┴────────┐
//!                          ▼                 ▼
//!                   ┌─────────────┐   ┌─────────────┐
//!                   │     WAL     │   │  Snapshot   │
//!                   │  (Append)   │   │ (Checkpoint)│
//!                   └─────────────┘   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod record;

pub mod wal;
pub mod store;
pub mod codec;
pub mod strategy;
pub mod bench;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LayoutError, Result};
pub use config::{Config, WalSyncStrategy};
pub use record::{Field, FieldKind, FieldValue, Record};
pub use store::Store;
pub use strategy::{StorageStrategy, StrategyKind, StrategyVariant};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of layoutbench
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

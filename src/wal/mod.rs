//! Write-Ahead Log (WAL) Module
//!
//! Makes committed write transactions durable through append-only logging.
//!
//! ## Responsibilities
//! - Append one entry per committed write transaction
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering against the snapshot
//! - Crash recovery and replay
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Entry 1                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Entry 2                                 │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//!
//! `Data` is the bincode encoding of a [`WalEntry`].

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Mutation, HEADER_SIZE, MAX_ENTRY_SIZE};
pub use writer::WalWriter;
pub use reader::WalReader;
pub use recovery::{WalRecovery, RecoveryResult};

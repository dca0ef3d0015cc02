//! Configuration for the bucket store
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

/// Main configuration for a Store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log of committed transactions)
    ///     └── snapshot.db      (last checkpoint of the bucket tree)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) after which a commit triggers a checkpoint
    pub wal_size_limit: u64,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every committed transaction (safest, slowest)
    EveryWrite,

    /// fsync after N committed transactions
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./layoutbench_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            wal_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL size limit (in bytes)
    pub fn wal_size_limit(mut self, size: u64) -> Self {
        self.config.wal_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

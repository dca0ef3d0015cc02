//! Store Module
//!
//! Embedded, ordered, transactional key-value store with nested buckets.
//!
//! ## Responsibilities
//! - Named top-level buckets, nested buckets, point get/put
//! - Forward cursors in ascending key order
//! - Shared read transactions and serialized, atomic write transactions
//! - Durability through the WAL and periodic snapshot checkpoints
//!
//! ## On-disk Layout
//! ```text
//! {data_dir}/
//!   ├── snapshot.db   (last checkpoint, see snapshot module)
//!   └── wal.log       (transactions committed since that checkpoint)
//! ```
//!
//! On open the snapshot is loaded and every WAL entry with a newer LSN is
//! replayed on top of it. A commit that pushes the WAL past
//! `Config::wal_size_limit` writes a new snapshot and truncates the WAL.

mod bucket;
mod snapshot;
mod tx;

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::Config;
use crate::error::Result;
use crate::wal::{Mutation, WalRecovery, WalWriter};

pub use bucket::{Bucket, BucketMut, Cursor, Entry};
pub use tx::{ReadTx, WriteTx};

use bucket::BucketNode;

/// The bucket store
///
/// ## Concurrency:
/// - `root`: RwLock held for the lifetime of each transaction
///   (many concurrent read transactions, one exclusive write transaction)
/// - `durability`: WAL writer behind a Mutex, only touched while the root
///   write lock (or a read lock, for checkpoints) is held
pub struct Store {
    root: RwLock<BucketNode>,

    /// `None` for in-memory stores
    durability: Option<Durability>,
}

struct Durability {
    data_dir: PathBuf,
    wal: Mutex<WalWriter>,
    wal_size_limit: u64,
}

impl Store {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SNAPSHOT_FILENAME: &'static str = "snapshot.db";

    /// Open or create a persistent store with the given config
    ///
    /// On startup:
    /// 1. Create data directory
    /// 2. Load the snapshot if one exists
    /// 3. Recover the WAL and replay entries newer than the snapshot
    /// 4. Ready to serve transactions
    pub fn open(config: Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let snapshot_path = config.data_dir.join(Self::SNAPSHOT_FILENAME);
        let wal_path = config.data_dir.join(Self::WAL_FILENAME);

        let (mut root, snapshot_lsn) = if snapshot_path.exists() {
            snapshot::read(&snapshot_path)?
        } else {
            (BucketNode::default(), 0)
        };

        let mut last_lsn = snapshot_lsn;
        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_corrupted > 0 {
                tracing::warn!(
                    recovered = recovery.entries_recovered,
                    corrupted = recovery.entries_corrupted,
                    truncated = recovery.was_truncated,
                    "WAL recovery discarded a damaged tail"
                );
            }

            let mut replayed = 0usize;
            for entry in entries {
                if entry.lsn <= snapshot_lsn {
                    continue;
                }
                last_lsn = entry.lsn;
                for mutation in entry.mutations {
                    tx::apply_mutation(&mut root, mutation)?;
                }
                replayed += 1;
            }

            if replayed > 0 {
                tracing::info!(replayed, last_lsn, "replayed WAL entries");
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy, last_lsn + 1)?;

        tracing::debug!(
            data_dir = %config.data_dir.display(),
            snapshot_lsn,
            last_lsn,
            "store opened"
        );

        Ok(Self {
            root: RwLock::new(root),
            durability: Some(Durability {
                data_dir: config.data_dir,
                wal: Mutex::new(wal),
                wal_size_limit: config.wal_size_limit,
            }),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Create a store that lives only in memory
    pub fn in_memory() -> Self {
        Self {
            root: RwLock::new(BucketNode::default()),
            durability: None,
        }
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Begin a read transaction
    pub fn begin_read(&self) -> ReadTx<'_> {
        ReadTx::new(self.root.read())
    }

    /// Begin a write transaction (blocks while another is active)
    pub fn begin_write(&self) -> WriteTx<'_> {
        WriteTx::new(self, self.root.write(), self.durability.is_some())
    }

    /// Run `f` inside a read transaction
    pub fn view<T>(&self, f: impl FnOnce(&ReadTx<'_>) -> Result<T>) -> Result<T> {
        let tx = self.begin_read();
        f(&tx)
    }

    /// Run `f` inside a write transaction
    ///
    /// Commits when `f` returns `Ok`; rolls back every change otherwise.
    pub fn update<T>(&self, f: impl FnOnce(&mut WriteTx<'_>) -> Result<T>) -> Result<T> {
        let mut tx = self.begin_write();
        match f(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    // =========================================================================
    // Durability
    // =========================================================================

    /// Log a committing transaction (called with the root write lock held)
    ///
    /// The transaction is committed once its WAL entry is appended; an `Err`
    /// here means the log holds nothing of it. A checkpoint that fails
    /// afterwards leaves the entry in the WAL and is only logged.
    fn log_commit(&self, mutations: Vec<Mutation>, root: &BucketNode) -> Result<()> {
        let Some(durability) = &self.durability else {
            return Ok(());
        };

        let mut wal = durability.wal.lock();
        let lsn = wal.append(mutations)?;

        if wal.size() >= durability.wal_size_limit {
            if let Err(e) = durability.checkpoint(root, &mut wal) {
                tracing::warn!(lsn, error = %e, "checkpoint after commit failed, WAL kept");
            }
        }
        Ok(())
    }

    /// Write a snapshot of the current tree and truncate the WAL
    ///
    /// No-op for in-memory stores.
    pub fn checkpoint(&self) -> Result<()> {
        let Some(durability) = &self.durability else {
            return Ok(());
        };
        let root = self.root.read();
        let mut wal = durability.wal.lock();
        durability.checkpoint(&root, &mut wal)
    }

    /// Bytes currently used on disk (snapshot + WAL), 0 for in-memory stores
    pub fn disk_size(&self) -> Result<u64> {
        match &self.durability {
            Some(durability) => disk_usage(&durability.data_dir),
            None => Ok(0),
        }
    }

    /// Data directory, `None` for in-memory stores
    pub fn data_dir(&self) -> Option<&Path> {
        self.durability.as_ref().map(|d| d.data_dir.as_path())
    }

    /// Close the store gracefully
    ///
    /// Checkpoints so the next open starts from a snapshot and an empty WAL.
    pub fn close(self) -> Result<()> {
        self.checkpoint()?;
        if let Some(durability) = &self.durability {
            durability.wal.lock().sync()?;
        }
        Ok(())
    }
}

impl Durability {
    fn checkpoint(&self, root: &BucketNode, wal: &mut WalWriter) -> Result<()> {
        let lsn = wal.current_lsn();
        let path = self.data_dir.join(Store::SNAPSHOT_FILENAME);
        let size = snapshot::write(&path, root, lsn)?;
        wal.truncate()?;
        tracing::debug!(lsn, snapshot_bytes = size, "checkpoint written");
        Ok(())
    }
}

/// Total size of the store files under `data_dir`
pub fn disk_usage(data_dir: &Path) -> Result<u64> {
    let mut total = 0;
    for name in [Store::SNAPSHOT_FILENAME, Store::WAL_FILENAME] {
        match fs::metadata(data_dir.join(name)) {
            Ok(meta) => total += meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(total)
}

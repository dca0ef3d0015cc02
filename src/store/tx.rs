//! Transactions
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader
//!
//! - `ReadTx` holds a shared lock on the bucket tree: readers run together and
//!   see a consistent snapshot because no writer can be active.
//! - `WriteTx` holds the exclusive lock for its whole lifetime, mutates the
//!   tree in place and journals every change. Commit appends the redo side of
//!   the journal to the WAL; rollback (explicit, on error, or on drop) replays
//!   the undo side in reverse.

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::error::{LayoutError, Result};
use crate::wal::Mutation;

use super::bucket::{child_mut, create_child, Bucket, BucketMut, BucketNode, Cursor, Node};
use super::Store;

// =============================================================================
// Journal
// =============================================================================

/// Undo record: what `key` in the bucket at `path` held before the change
#[derive(Debug)]
struct Undo {
    path: Vec<Vec<u8>>,
    key: Vec<u8>,
    previous: Option<Node>,
}

/// Per-transaction change log
#[derive(Debug, Default)]
pub(crate) struct Journal {
    /// Redo records are only kept when a WAL will consume them
    redo_enabled: bool,
    mutations: Vec<Mutation>,
    undo: Vec<Undo>,
}

impl Journal {
    fn new(redo_enabled: bool) -> Self {
        Self {
            redo_enabled,
            ..Self::default()
        }
    }

    pub(crate) fn record_put(&mut self, path: &[Vec<u8>], key: &[u8], value: &[u8], previous: Option<Node>) {
        if self.redo_enabled {
            self.mutations.push(Mutation::Put {
                path: path.to_vec(),
                key: key.to_vec(),
                value: value.to_vec(),
            });
        }
        self.undo.push(Undo {
            path: path.to_vec(),
            key: key.to_vec(),
            previous,
        });
    }

    pub(crate) fn record_create(&mut self, path: &[Vec<u8>], key: &[u8]) {
        if self.redo_enabled {
            self.mutations.push(Mutation::CreateBucket {
                path: path.to_vec(),
                key: key.to_vec(),
            });
        }
        self.undo.push(Undo {
            path: path.to_vec(),
            key: key.to_vec(),
            previous: None,
        });
    }

    fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Number of changes recorded so far
    fn len(&self) -> usize {
        self.undo.len()
    }
}

// =============================================================================
// Read Transaction
// =============================================================================

/// Read-only transaction over a consistent snapshot
pub struct ReadTx<'s> {
    root: RwLockReadGuard<'s, BucketNode>,
}

impl<'s> ReadTx<'s> {
    pub(crate) fn new(root: RwLockReadGuard<'s, BucketNode>) -> Self {
        Self { root }
    }

    /// Open a top-level bucket
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        Bucket::new(&self.root).bucket(name)
    }

    /// Cursor over the top-level bucket names
    pub fn cursor(&self) -> Cursor<'_> {
        Bucket::new(&self.root).cursor()
    }
}

// =============================================================================
// Write Transaction
// =============================================================================

/// Exclusive read-write transaction
///
/// Dropping an uncommitted transaction rolls it back.
pub struct WriteTx<'s> {
    store: &'s Store,
    root: RwLockWriteGuard<'s, BucketNode>,
    journal: Journal,
    finished: bool,
}

impl<'s> WriteTx<'s> {
    pub(crate) fn new(store: &'s Store, root: RwLockWriteGuard<'s, BucketNode>, redo_enabled: bool) -> Self {
        Self {
            store,
            root,
            journal: Journal::new(redo_enabled),
            finished: false,
        }
    }

    /// Read-only view of a top-level bucket, including uncommitted changes
    pub fn bucket(&self, name: &[u8]) -> Option<Bucket<'_>> {
        Bucket::new(&self.root).bucket(name)
    }

    /// Open a top-level bucket for writing
    pub fn bucket_mut(&mut self, name: &[u8]) -> Option<BucketMut<'_>> {
        child_mut(&mut self.root, &[], name, &mut self.journal)
    }

    /// Open a top-level bucket, creating it if needed
    pub fn create_bucket_if_not_exists(&mut self, name: &[u8]) -> Result<BucketMut<'_>> {
        create_child(&mut self.root, &[], name, &mut self.journal)
    }

    /// Make every change visible and durable (for persistent stores)
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if self.journal.is_empty() {
            return Ok(());
        }

        let changes = self.journal.len();
        let mutations = std::mem::take(&mut self.journal.mutations);
        if let Err(e) = self.store.log_commit(mutations, &self.root) {
            tracing::warn!(error = %e, changes, "commit failed, rolling back");
            self.undo_all();
            return Err(e);
        }

        self.journal.undo.clear();
        Ok(())
    }

    /// Discard every change made by this transaction
    pub fn rollback(mut self) {
        self.finished = true;
        self.undo_all();
    }

    fn undo_all(&mut self) {
        while let Some(undo) = self.journal.undo.pop() {
            let Some(node) = self.root.descend_mut(&undo.path) else {
                // Parents are undone after their children, so the path must exist
                tracing::error!(path = ?undo.path, "rollback target bucket vanished");
                continue;
            };
            match undo.previous {
                Some(previous) => {
                    node.entries.insert(undo.key, previous);
                }
                None => {
                    node.entries.remove(&undo.key);
                }
            }
        }
        self.journal.mutations.clear();
    }
}

impl Drop for WriteTx<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.undo_all();
        }
    }
}

/// Apply one replayed WAL mutation to a tree
pub(crate) fn apply_mutation(root: &mut BucketNode, mutation: Mutation) -> Result<()> {
    match mutation {
        Mutation::CreateBucket { path, key } => {
            replay_target(root, &path)?
                .entries
                .entry(key)
                .or_insert_with(|| Node::Bucket(BucketNode::default()));
        }
        Mutation::Put { path, key, value } => {
            replay_target(root, &path)?
                .entries
                .insert(key, Node::Value(value));
        }
    }
    Ok(())
}

fn replay_target<'a>(root: &'a mut BucketNode, path: &[Vec<u8>]) -> Result<&'a mut BucketNode> {
    root.descend_mut(path).ok_or_else(|| {
        let names: Vec<_> = path
            .iter()
            .map(|p| String::from_utf8_lossy(p).into_owned())
            .collect();
        LayoutError::WalCorruption(format!("replay targets missing bucket {:?}", names))
    })
}

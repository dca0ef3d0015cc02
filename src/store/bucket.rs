//! Buckets and cursors
//!
//! A bucket is an ordered map from byte keys to either a value or a nested
//! bucket. Handles borrow from the transaction that produced them, so they
//! cannot outlive it.

use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::{LayoutError, Result};

use super::tx::Journal;

/// In-memory bucket tree node
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct BucketNode {
    pub(crate) entries: BTreeMap<Vec<u8>, Node>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Value(Vec<u8>),
    Bucket(BucketNode),
}

impl BucketNode {
    /// Walk `path` from this node, returning the bucket it names
    pub(crate) fn descend_mut(&mut self, path: &[Vec<u8>]) -> Option<&mut BucketNode> {
        let mut node = self;
        for segment in path {
            match node.entries.get_mut(segment.as_slice()) {
                Some(Node::Bucket(child)) => node = child,
                _ => return None,
            }
        }
        Some(node)
    }
}

/// What a cursor finds under a key
#[derive(Debug, Clone, Copy)]
pub enum Entry<'tx> {
    Value(&'tx [u8]),
    Bucket(Bucket<'tx>),
}

impl<'tx> Entry<'tx> {
    /// The value, or `None` for a nested bucket
    pub fn value(&self) -> Option<&'tx [u8]> {
        match self {
            Entry::Value(v) => Some(v),
            Entry::Bucket(_) => None,
        }
    }

    pub fn bucket(&self) -> Option<Bucket<'tx>> {
        match self {
            Entry::Value(_) => None,
            Entry::Bucket(b) => Some(*b),
        }
    }
}

// =============================================================================
// Read-only handle
// =============================================================================

/// Read-only bucket handle
#[derive(Debug, Clone, Copy)]
pub struct Bucket<'tx> {
    node: &'tx BucketNode,
}

impl<'tx> Bucket<'tx> {
    pub(crate) fn new(node: &'tx BucketNode) -> Self {
        Self { node }
    }

    /// Point lookup; `None` if absent or if the key holds a nested bucket
    pub fn get(&self, key: &[u8]) -> Option<&'tx [u8]> {
        match self.node.entries.get(key) {
            Some(Node::Value(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Open a nested bucket
    pub fn bucket(&self, key: &[u8]) -> Option<Bucket<'tx>> {
        match self.node.entries.get(key) {
            Some(Node::Bucket(child)) => Some(Bucket::new(child)),
            _ => None,
        }
    }

    /// Forward cursor positioned before the first key
    pub fn cursor(&self) -> Cursor<'tx> {
        Cursor::new(&self.node.entries)
    }

    /// Number of direct entries (values and nested buckets)
    pub fn len(&self) -> usize {
        self.node.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node.entries.is_empty()
    }
}

// =============================================================================
// Cursor
// =============================================================================

/// Forward cursor over a bucket in ascending key order
///
/// `first` and `seek` reposition the cursor and return the entry found there;
/// the [`Iterator`] impl advances it.
pub struct Cursor<'tx> {
    entries: &'tx BTreeMap<Vec<u8>, Node>,
    range: btree_map::Range<'tx, Vec<u8>, Node>,
}

impl<'tx> Cursor<'tx> {
    fn new(entries: &'tx BTreeMap<Vec<u8>, Node>) -> Self {
        Self {
            entries,
            range: entries.range::<[u8], _>(..),
        }
    }

    /// Move to the first key
    pub fn first(&mut self) -> Option<(&'tx [u8], Entry<'tx>)> {
        self.range = self.entries.range::<[u8], _>(..);
        self.next()
    }

    /// Move to the first key `>= key`
    pub fn seek(&mut self, key: &[u8]) -> Option<(&'tx [u8], Entry<'tx>)> {
        self.range = self
            .entries
            .range::<[u8], _>((Bound::Included(key), Bound::Unbounded));
        self.next()
    }
}

impl<'tx> Iterator for Cursor<'tx> {
    type Item = (&'tx [u8], Entry<'tx>);

    fn next(&mut self) -> Option<Self::Item> {
        self.range.next().map(|(key, node)| {
            let entry = match node {
                Node::Value(v) => Entry::Value(v.as_slice()),
                Node::Bucket(child) => Entry::Bucket(Bucket::new(child)),
            };
            (key.as_slice(), entry)
        })
    }
}

// =============================================================================
// Writable handle
// =============================================================================

/// Writable bucket handle, only available inside a write transaction
///
/// Every mutation is journaled so the transaction can be rolled back and,
/// for persistent stores, replayed from the WAL.
pub struct BucketMut<'tx> {
    node: &'tx mut BucketNode,
    path: Vec<Vec<u8>>,
    journal: &'tx mut Journal,
}

impl<'tx> BucketMut<'tx> {
    pub(crate) fn new(node: &'tx mut BucketNode, path: Vec<Vec<u8>>, journal: &'tx mut Journal) -> Self {
        Self {
            node,
            path,
            journal,
        }
    }

    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.as_bucket().get(key)
    }

    /// Insert or overwrite a value
    ///
    /// Fails if `key` is empty or currently names a nested bucket.
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(LayoutError::Store("key required".to_string()));
        }
        if let Some(Node::Bucket(_)) = self.node.entries.get(key) {
            return Err(LayoutError::Store(format!(
                "incompatible value: {} is a bucket",
                String::from_utf8_lossy(key)
            )));
        }

        let previous = self
            .node
            .entries
            .insert(key.to_vec(), Node::Value(value.to_vec()));
        self.journal.record_put(&self.path, key, value, previous);
        Ok(())
    }

    /// Read-only view of a nested bucket
    pub fn bucket(&self, key: &[u8]) -> Option<Bucket<'_>> {
        self.as_bucket().bucket(key)
    }

    /// Open a nested bucket for writing
    pub fn bucket_mut(&mut self, key: &[u8]) -> Option<BucketMut<'_>> {
        child_mut(self.node, &self.path, key, self.journal)
    }

    /// Open a nested bucket, creating it if needed
    pub fn create_bucket_if_not_exists(&mut self, key: &[u8]) -> Result<BucketMut<'_>> {
        create_child(self.node, &self.path, key, self.journal)
    }

    /// Cursor over the current (uncommitted) contents
    pub fn cursor(&self) -> Cursor<'_> {
        Cursor::new(&self.node.entries)
    }

    pub fn as_bucket(&self) -> Bucket<'_> {
        Bucket::new(self.node)
    }
}

/// Open the child bucket `key` of `node` for writing
pub(crate) fn child_mut<'a>(
    node: &'a mut BucketNode,
    path: &[Vec<u8>],
    key: &[u8],
    journal: &'a mut Journal,
) -> Option<BucketMut<'a>> {
    match node.entries.get_mut(key) {
        Some(Node::Bucket(child)) => Some(BucketMut::new(child, child_path(path, key), journal)),
        _ => None,
    }
}

/// Open the child bucket `key` of `node`, creating it if absent
pub(crate) fn create_child<'a>(
    node: &'a mut BucketNode,
    path: &[Vec<u8>],
    key: &[u8],
    journal: &'a mut Journal,
) -> Result<BucketMut<'a>> {
    if key.is_empty() {
        return Err(LayoutError::Store("bucket name required".to_string()));
    }

    match node.entries.get(key) {
        Some(Node::Value(_)) => {
            return Err(LayoutError::Store(format!(
                "incompatible value: {} is not a bucket",
                String::from_utf8_lossy(key)
            )));
        }
        Some(Node::Bucket(_)) => {}
        None => {
            node.entries
                .insert(key.to_vec(), Node::Bucket(BucketNode::default()));
            journal.record_create(path, key);
        }
    }

    child_mut(node, path, key, journal).ok_or_else(|| LayoutError::bucket_not_found(key))
}

fn child_path(path: &[Vec<u8>], key: &[u8]) -> Vec<Vec<u8>> {
    let mut child = Vec::with_capacity(path.len() + 1);
    child.extend_from_slice(path);
    child.push(key.to_vec());
    child
}

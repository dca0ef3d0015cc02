//! Tests for the bucket store
//!
//! These tests verify:
//! - Bucket creation, point get/put, nested buckets
//! - Cursor ordering, seek and first
//! - Write transaction commit and rollback
//! - Durability: WAL replay, checkpoints, torn WAL tails

use std::fs::{self, OpenOptions};
use std::path::Path;

use layoutbench::config::{Config, WalSyncStrategy};
use layoutbench::store::{disk_usage, Entry};
use layoutbench::{LayoutError, Result, Store};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open(dir: &Path) -> Store {
    Store::open(
        Config::builder()
            .data_dir(dir)
            .wal_sync_strategy(WalSyncStrategy::EveryWrite)
            .build(),
    )
    .unwrap()
}

fn put(store: &Store, bucket: &[u8], key: &[u8], value: &[u8]) {
    store
        .update(|tx| tx.create_bucket_if_not_exists(bucket)?.put(key, value))
        .unwrap();
}

fn get(store: &Store, bucket: &[u8], key: &[u8]) -> Option<Vec<u8>> {
    store
        .view(|tx| Ok(tx.bucket(bucket).and_then(|b| b.get(key)).map(|v| v.to_vec())))
        .unwrap()
}

fn keys(store: &Store, bucket: &[u8]) -> Vec<Vec<u8>> {
    store
        .view(|tx| {
            let b = tx.bucket(bucket).ok_or(LayoutError::Store("missing".into()))?;
            Ok(b.cursor().map(|(k, _)| k.to_vec()).collect())
        })
        .unwrap()
}

// =============================================================================
// Bucket Tests
// =============================================================================

#[test]
fn test_put_get() {
    let store = Store::in_memory();
    put(&store, b"users", b"k1", b"v1");

    assert_eq!(get(&store, b"users", b"k1"), Some(b"v1".to_vec()));
    assert_eq!(get(&store, b"users", b"k2"), None);
    assert_eq!(get(&store, b"other", b"k1"), None);
}

#[test]
fn test_put_overwrites() {
    let store = Store::in_memory();
    put(&store, b"users", b"k1", b"v1");
    put(&store, b"users", b"k1", b"v2");

    assert_eq!(get(&store, b"users", b"k1"), Some(b"v2".to_vec()));
}

#[test]
fn test_create_bucket_is_idempotent() {
    let store = Store::in_memory();
    put(&store, b"users", b"k1", b"v1");

    store
        .update(|tx| {
            tx.create_bucket_if_not_exists(b"users")?;
            Ok(())
        })
        .unwrap();

    assert_eq!(get(&store, b"users", b"k1"), Some(b"v1".to_vec()));
}

#[test]
fn test_missing_bucket_for_write() {
    let store = Store::in_memory();
    let opened = store.update(|tx| Ok(tx.bucket_mut(b"nope").is_some())).unwrap();
    assert!(!opened);
}

#[test]
fn test_empty_key_rejected() {
    let store = Store::in_memory();
    let err = store
        .update(|tx| tx.create_bucket_if_not_exists(b"users")?.put(b"", b"v"))
        .unwrap_err();
    assert!(matches!(err, LayoutError::Store(_)));
}

#[test]
fn test_nested_buckets() {
    let store = Store::in_memory();
    store
        .update(|tx| {
            let mut root = tx.create_bucket_if_not_exists(b"root")?;
            let mut child = root.create_bucket_if_not_exists(b"child")?;
            child.put(b"name", b"ann")?;
            root.put(b"plain", b"value")
        })
        .unwrap();

    store
        .view(|tx| {
            let root = tx.bucket(b"root").unwrap();
            let child = root.bucket(b"child").unwrap();
            assert_eq!(child.get(b"name"), Some(&b"ann"[..]));

            // A bucket is not a value and a value is not a bucket
            assert!(root.get(b"child").is_none());
            assert!(root.bucket(b"plain").is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_put_over_bucket_rejected() {
    let store = Store::in_memory();
    let err = store
        .update(|tx| {
            let mut root = tx.create_bucket_if_not_exists(b"root")?;
            root.create_bucket_if_not_exists(b"child")?;
            root.put(b"child", b"oops")
        })
        .unwrap_err();
    assert!(matches!(err, LayoutError::Store(_)));
}

#[test]
fn test_bucket_over_value_rejected() {
    let store = Store::in_memory();
    let err = store
        .update(|tx| {
            let mut root = tx.create_bucket_if_not_exists(b"root")?;
            root.put(b"plain", b"value")?;
            root.create_bucket_if_not_exists(b"plain")?;
            Ok(())
        })
        .unwrap_err();
    assert!(matches!(err, LayoutError::Store(_)));
}

// =============================================================================
// Cursor Tests
// =============================================================================

#[test]
fn test_cursor_ascending_order() {
    let store = Store::in_memory();
    for key in [&b"c"[..], b"a", b"bb", b"b"] {
        put(&store, b"users", key, b"x");
    }

    assert_eq!(
        keys(&store, b"users"),
        vec![b"a".to_vec(), b"b".to_vec(), b"bb".to_vec(), b"c".to_vec()]
    );
}

#[test]
fn test_cursor_seek_and_first() {
    let store = Store::in_memory();
    for key in [&b"a"[..], b"c", b"e"] {
        put(&store, b"users", key, key);
    }

    store
        .view(|tx| {
            let mut cursor = tx.bucket(b"users").unwrap().cursor();

            let (k, _) = cursor.seek(b"b").unwrap();
            assert_eq!(k, b"c");
            let (k, _) = cursor.next().unwrap();
            assert_eq!(k, b"e");
            assert!(cursor.next().is_none());

            let (k, _) = cursor.first().unwrap();
            assert_eq!(k, b"a");

            assert!(cursor.seek(b"f").is_none());
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_cursor_reports_nested_buckets() {
    let store = Store::in_memory();
    store
        .update(|tx| {
            let mut root = tx.create_bucket_if_not_exists(b"root")?;
            root.put(b"a", b"1")?;
            root.create_bucket_if_not_exists(b"b")?.put(b"x", b"2")
        })
        .unwrap();

    store
        .view(|tx| {
            let entries: Vec<_> = tx.bucket(b"root").unwrap().cursor().collect();
            assert_eq!(entries.len(), 2);
            assert!(matches!(entries[0], (b"a", Entry::Value(b"1"))));
            let nested = entries[1].1.bucket().unwrap();
            assert_eq!(nested.get(b"x"), Some(&b"2"[..]));
            Ok(())
        })
        .unwrap();
}

#[test]
fn test_top_level_cursor_lists_buckets() {
    let store = Store::in_memory();
    put(&store, b"beta", b"k", b"v");
    put(&store, b"alpha", b"k", b"v");

    let names: Vec<Vec<u8>> = store
        .view(|tx| Ok(tx.cursor().map(|(k, _)| k.to_vec()).collect()))
        .unwrap();
    assert_eq!(names, vec![b"alpha".to_vec(), b"beta".to_vec()]);
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_failed_update_rolls_back_everything() {
    let store = Store::in_memory();
    put(&store, b"users", b"k1", b"old");

    let result: Result<()> = store.update(|tx| {
        let mut bucket = tx.create_bucket_if_not_exists(b"users")?;
        bucket.put(b"k1", b"new")?;
        bucket.put(b"k2", b"new")?;
        bucket.create_bucket_if_not_exists(b"nested")?.put(b"x", b"y")?;
        tx.create_bucket_if_not_exists(b"fresh")?;
        Err(LayoutError::Decode("abort".into()))
    });
    assert!(result.is_err());

    assert_eq!(get(&store, b"users", b"k1"), Some(b"old".to_vec()));
    assert_eq!(get(&store, b"users", b"k2"), None);
    assert_eq!(keys(&store, b"users"), vec![b"k1".to_vec()]);
    assert!(store.view(|tx| Ok(tx.bucket(b"fresh").is_none())).unwrap());
}

#[test]
fn test_explicit_rollback_and_drop() {
    let store = Store::in_memory();

    let mut tx = store.begin_write();
    tx.create_bucket_if_not_exists(b"users").unwrap().put(b"k", b"v").unwrap();
    tx.rollback();
    assert!(store.view(|tx| Ok(tx.bucket(b"users").is_none())).unwrap());

    {
        let mut tx = store.begin_write();
        tx.create_bucket_if_not_exists(b"users").unwrap().put(b"k", b"v").unwrap();
    }
    assert!(store.view(|tx| Ok(tx.bucket(b"users").is_none())).unwrap());
}

#[test]
fn test_write_tx_sees_own_changes() {
    let store = Store::in_memory();
    let mut tx = store.begin_write();
    tx.create_bucket_if_not_exists(b"users").unwrap().put(b"k", b"v").unwrap();
    assert_eq!(tx.bucket(b"users").unwrap().get(b"k"), Some(&b"v"[..]));
    tx.commit().unwrap();

    assert_eq!(get(&store, b"users", b"k"), Some(b"v".to_vec()));
}

#[test]
fn test_concurrent_readers() {
    let store = Store::in_memory();
    put(&store, b"users", b"k", b"v");

    let a = store.begin_read();
    let b = store.begin_read();
    assert_eq!(a.bucket(b"users").unwrap().get(b"k"), Some(&b"v"[..]));
    assert_eq!(b.bucket(b"users").unwrap().get(b"k"), Some(&b"v"[..]));
}

// =============================================================================
// Durability Tests
// =============================================================================

#[test]
fn test_reopen_replays_wal() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(temp.path());
        put(&store, b"users", b"k1", b"v1");
        store
            .update(|tx| {
                tx.create_bucket_if_not_exists(b"nested")?
                    .create_bucket_if_not_exists(b"inner")?
                    .put(b"k", b"deep")
            })
            .unwrap();
        // Dropped without close: only the WAL holds the data
    }
    assert!(!temp.path().join("snapshot.db").exists());

    let store = open(temp.path());
    assert_eq!(get(&store, b"users", b"k1"), Some(b"v1".to_vec()));
    let deep = store
        .view(|tx| {
            Ok(tx
                .bucket(b"nested")
                .and_then(|b| b.bucket(b"inner"))
                .and_then(|b| b.get(b"k"))
                .map(|v| v.to_vec()))
        })
        .unwrap();
    assert_eq!(deep, Some(b"deep".to_vec()));
}

#[test]
fn test_rolled_back_tx_not_logged() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(temp.path());
        put(&store, b"users", b"k1", b"v1");
        let _ = store.update(|tx| {
            tx.bucket_mut(b"users").unwrap().put(b"k2", b"v2")?;
            Err::<(), _>(LayoutError::Decode("abort".into()))
        });
    }

    let store = open(temp.path());
    assert_eq!(keys(&store, b"users"), vec![b"k1".to_vec()]);
}

#[test]
fn test_close_checkpoints() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path());
    for i in 0..20u32 {
        put(&store, b"users", &i.to_be_bytes(), b"value");
    }
    store.close().unwrap();

    assert!(temp.path().join("snapshot.db").exists());
    assert_eq!(fs::metadata(temp.path().join("wal.log")).unwrap().len(), 0);

    let store = open(temp.path());
    assert_eq!(keys(&store, b"users").len(), 20);

    // Writes after a checkpoint land on top of the snapshot
    put(&store, b"users", b"late", b"value");
    drop(store);
    let store = open(temp.path());
    assert_eq!(keys(&store, b"users").len(), 21);
}

#[test]
fn test_wal_size_limit_triggers_checkpoint() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .wal_size_limit(512)
        .build();
    let store = Store::open(config).unwrap();

    for i in 0..50u32 {
        put(&store, b"users", &i.to_be_bytes(), &[7u8; 64]);
    }

    assert!(temp.path().join("snapshot.db").exists());
    assert!(fs::metadata(temp.path().join("wal.log")).unwrap().len() < 512);
    drop(store);

    let store = open(temp.path());
    assert_eq!(keys(&store, b"users").len(), 50);
}

#[test]
fn test_failed_checkpoint_keeps_commit() {
    let temp = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .wal_size_limit(1)
        .build();

    // A directory where the snapshot temp file goes makes every checkpoint fail
    let blocker = temp.path().join("snapshot.tmp");
    fs::create_dir(&blocker).unwrap();

    {
        let store = Store::open(config.clone()).unwrap();
        put(&store, b"b", b"k", b"v");
        put(&store, b"b", b"k2", b"v2");
        assert_eq!(get(&store, b"b", b"k"), Some(b"v".to_vec()));
        assert!(store.checkpoint().is_err());
    }

    fs::remove_dir(&blocker).unwrap();
    let store = Store::open(config).unwrap();
    assert_eq!(get(&store, b"b", b"k"), Some(b"v".to_vec()));
    assert_eq!(get(&store, b"b", b"k2"), Some(b"v2".to_vec()));
    assert!(!temp.path().join("snapshot.db").exists());
}

#[test]
fn test_torn_wal_tail_is_discarded() {
    let temp = TempDir::new().unwrap();
    {
        let store = open(temp.path());
        put(&store, b"users", b"k1", b"v1");
        put(&store, b"users", b"k2", b"v2");
    }

    let wal = temp.path().join("wal.log");
    let len = fs::metadata(&wal).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&wal)
        .unwrap()
        .set_len(len - 3)
        .unwrap();

    let store = open(temp.path());
    assert_eq!(get(&store, b"users", b"k1"), Some(b"v1".to_vec()));
    assert_eq!(get(&store, b"users", b"k2"), None);

    // The store keeps working after recovery
    put(&store, b"users", b"k3", b"v3");
    drop(store);
    let store = open(temp.path());
    assert_eq!(keys(&store, b"users"), vec![b"k1".to_vec(), b"k3".to_vec()]);
}

#[test]
fn test_corrupt_snapshot_is_an_error() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path());
    put(&store, b"users", b"k1", b"v1");
    store.close().unwrap();

    let snapshot = temp.path().join("snapshot.db");
    let mut bytes = fs::read(&snapshot).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    fs::write(&snapshot, &bytes).unwrap();

    assert!(Store::open_path(temp.path()).is_err());
}

#[test]
fn test_disk_size() {
    let temp = TempDir::new().unwrap();
    let store = open(temp.path());
    assert_eq!(store.disk_size().unwrap(), 0);

    put(&store, b"users", b"k1", b"v1");
    let size = store.disk_size().unwrap();
    assert!(size > 0);
    assert_eq!(store.data_dir(), Some(temp.path()));
    store.close().unwrap();

    assert!(disk_usage(temp.path()).unwrap() > 0);
    assert_eq!(Store::in_memory().disk_size().unwrap(), 0);
}

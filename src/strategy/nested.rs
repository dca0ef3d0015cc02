//! Bucket-per-record layout (NestedBucket)
//!
//! ## Key Layout
//! ```text
//! users_nested
//!   ├── id_key(1)/            (nested bucket)
//!   │     ├── "age"      -> "31"
//!   │     ├── "balance"  -> f64 LE bits
//!   │     └── ...
//!   └── id_key(2)/
//! ```

use crate::codec::field::{apply_entry, decode_numeric, encode_value, record_entries};
use crate::codec::{id_key, id_from_key};
use crate::error::{LayoutError, Result};
use crate::record::{FieldValue, Record, RecordBuilder};
use crate::store::{Bucket, Entry, Store, WriteTx};

use super::{summable_field, updatable_field, StorageStrategy};

const BUCKET: &[u8] = b"users_nested";

pub struct NestedBucketStrategy;

impl NestedBucketStrategy {
    fn root<'tx>(bucket: Option<Bucket<'tx>>) -> Result<Bucket<'tx>> {
        bucket.ok_or_else(|| LayoutError::bucket_not_found(BUCKET))
    }

    fn put_record(tx: &mut WriteTx<'_>, record: &Record) -> Result<()> {
        let mut root = tx
            .bucket_mut(BUCKET)
            .ok_or_else(|| LayoutError::bucket_not_found(BUCKET))?;
        let mut sub = root.create_bucket_if_not_exists(&id_key(record.id))?;
        for (name, payload) in record_entries(record) {
            sub.put(name.as_bytes(), &payload)?;
        }
        Ok(())
    }

    /// The record bucket found under a root key
    fn record_bucket<'tx>(key: &[u8], entry: Entry<'tx>) -> Result<Bucket<'tx>> {
        entry.bucket().ok_or_else(|| {
            LayoutError::Decode(format!(
                "expected a record bucket under key {:02x?}, found a value",
                key
            ))
        })
    }

    /// Decode every field entry of one record bucket
    fn decode_bucket(bucket: Bucket<'_>) -> Result<Record> {
        let mut builder = RecordBuilder::new();
        for (name, entry) in bucket.cursor() {
            let payload = entry.value().ok_or_else(|| {
                LayoutError::Decode(format!(
                    "nested bucket under field {:?}",
                    String::from_utf8_lossy(name)
                ))
            })?;
            apply_entry(&mut builder, name, payload)?;
        }
        builder.build()
    }
}

impl StorageStrategy for NestedBucketStrategy {
    fn name(&self) -> &'static str {
        "NestedBucket"
    }

    fn setup(&self, store: &Store) -> Result<()> {
        store.update(|tx| {
            tx.create_bucket_if_not_exists(BUCKET)?;
            Ok(())
        })?;
        tracing::debug!(strategy = self.name(), "layout ready");
        Ok(())
    }

    fn write(&self, store: &Store, record: &Record) -> Result<()> {
        store.update(|tx| Self::put_record(tx, record))
    }

    fn write_many(&self, store: &Store, records: &[Record]) -> Result<()> {
        store.update(|tx| {
            for record in records {
                Self::put_record(tx, record)?;
            }
            Ok(())
        })?;
        tracing::debug!(strategy = self.name(), records = records.len(), "bulk write committed");
        Ok(())
    }

    fn read(&self, store: &Store, id: i64) -> Result<Record> {
        store.view(|tx| {
            let root = Self::root(tx.bucket(BUCKET))?;
            let key = id_key(id);
            match root.bucket(&key) {
                Some(sub) => Self::decode_bucket(sub),
                None if root.get(&key).is_some() => Err(LayoutError::Decode(format!(
                    "record {} is stored as a value, not a bucket",
                    id
                ))),
                None => Err(LayoutError::NotFound { id }),
            }
        })
    }

    fn read_many(&self, store: &Store, start_id: i64, count: usize) -> Result<Vec<Record>> {
        store.view(|tx| {
            let root = Self::root(tx.bucket(BUCKET))?;
            let mut records = Vec::with_capacity(count.min(root.len()));
            if count == 0 {
                return Ok(records);
            }

            let mut cursor = root.cursor();
            let mut item = cursor.seek(&id_key(start_id));
            while let Some((key, entry)) = item {
                records.push(Self::decode_bucket(Self::record_bucket(key, entry)?)?);
                if records.len() == count {
                    break;
                }
                item = cursor.next();
            }
            Ok(records)
        })
    }

    fn update_field(&self, store: &Store, id: i64, field: &str, value: FieldValue) -> Result<()> {
        let target = updatable_field(field, &value)?;

        store.update(|tx| {
            let mut root = tx
                .bucket_mut(BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(BUCKET))?;
            let mut sub = root
                .bucket_mut(&id_key(id))
                .ok_or(LayoutError::NotFound { id })?;
            sub.put(target.name().as_bytes(), &encode_value(&value))
        })
    }

    fn read_field_sum(&self, store: &Store, field: &str, count: usize) -> Result<f64> {
        let target = summable_field(field)?;

        store.view(|tx| {
            let root = Self::root(tx.bucket(BUCKET))?;
            let mut sum = 0.0;
            for (key, entry) in root.cursor().take(count) {
                let sub = Self::record_bucket(key, entry)?;
                let payload = sub.get(target.name().as_bytes()).ok_or_else(|| {
                    let id = id_from_key(key)
                        .map_or_else(|_| format!("{:02x?}", key), |id| id.to_string());
                    LayoutError::Decode(format!("record {} has no {} field", id, target))
                })?;
                sum += decode_numeric(target, payload)?;
            }
            Ok(sum)
        })
    }
}

//! Field-per-key layout (MultiKV)
//!
//! ## Key Layout
//! ```text
//! users_multikv
//!   ├── id_key(1) ++ "age"          -> "31"
//!   ├── id_key(1) ++ "balance"      -> f64 LE bits
//!   ├── ...
//!   ├── id_key(1) ++ "username"     -> "user_1"
//!   ├── id_key(2) ++ "age"          -> ...
//! ```
//!
//! All keys of one record share the 8-byte id prefix and therefore sort
//! together. Field names inside a record sort alphabetically, so the decoder
//! never relies on field order.

use std::collections::HashSet;

use crate::codec::field::{apply_entry, decode_numeric, encode_value, record_entries};
use crate::codec::{id_from_key, id_key, ID_KEY_LEN};
use crate::error::{LayoutError, Result};
use crate::record::{Field, FieldValue, Record, RecordBuilder};
use crate::store::{Bucket, BucketMut, Entry, Store};

use super::{summable_field, updatable_field, StorageStrategy};

const BUCKET: &[u8] = b"users_multikv";

pub struct MultiKvStrategy;

impl MultiKvStrategy {
    fn field_key(id: i64, name: &str) -> Vec<u8> {
        let mut key = Vec::with_capacity(ID_KEY_LEN + name.len());
        key.extend_from_slice(&id_key(id));
        key.extend_from_slice(name.as_bytes());
        key
    }

    fn root<'tx>(bucket: Option<Bucket<'tx>>) -> Result<Bucket<'tx>> {
        bucket.ok_or_else(|| LayoutError::bucket_not_found(BUCKET))
    }

    fn put_record(bucket: &mut BucketMut<'_>, record: &Record) -> Result<()> {
        for (name, payload) in record_entries(record) {
            bucket.put(&Self::field_key(record.id, name), &payload)?;
        }
        Ok(())
    }

    /// Split a stored key into (id, field name) and require a plain value
    fn split_entry<'tx>(key: &'tx [u8], entry: Entry<'tx>) -> Result<(i64, &'tx [u8], &'tx [u8])> {
        let id = id_from_key(key)?;
        let payload = entry.value().ok_or_else(|| {
            LayoutError::Decode(format!("nested bucket under field key of record {}", id))
        })?;
        Ok((id, &key[ID_KEY_LEN..], payload))
    }
}

impl StorageStrategy for MultiKvStrategy {
    fn name(&self) -> &'static str {
        "MultiKV"
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
        store.update(|tx| {
            let mut bucket = tx
                .bucket_mut(BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(BUCKET))?;
            Self::put_record(&mut bucket, record)
        })
    }

    fn write_many(&self, store: &Store, records: &[Record]) -> Result<()> {
        store.update(|tx| {
            let mut bucket = tx
                .bucket_mut(BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(BUCKET))?;
            for record in records {
                Self::put_record(&mut bucket, record)?;
            }
            Ok(())
        })?;
        tracing::debug!(strategy = self.name(), records = records.len(), "bulk write committed");
        Ok(())
    }

    fn read(&self, store: &Store, id: i64) -> Result<Record> {
        store.view(|tx| {
            let bucket = Self::root(tx.bucket(BUCKET))?;
            let prefix = id_key(id);

            let mut builder: Option<RecordBuilder> = None;
            let mut cursor = bucket.cursor();
            let mut item = cursor.seek(&prefix);
            while let Some((key, entry)) = item {
                if !key.starts_with(&prefix) {
                    break;
                }
                let (_, name, payload) = Self::split_entry(key, entry)?;
                apply_entry(builder.get_or_insert_with(RecordBuilder::new), name, payload)?;
                item = cursor.next();
            }

            builder.ok_or(LayoutError::NotFound { id })?.build()
        })
    }

    fn read_many(&self, store: &Store, start_id: i64, count: usize) -> Result<Vec<Record>> {
        store.view(|tx| {
            let bucket = Self::root(tx.bucket(BUCKET))?;
            let mut records = Vec::new();
            if count == 0 {
                return Ok(records);
            }

            // Record being assembled from the current run of id-prefixed keys
            let mut current: Option<(i64, RecordBuilder)> = None;
            let mut cursor = bucket.cursor();
            let mut item = cursor.seek(&id_key(start_id));

            while let Some((key, entry)) = item {
                let (id, name, payload) = Self::split_entry(key, entry)?;

                let starts_new = current.as_ref().map_or(true, |(cur, _)| *cur != id);
                if starts_new {
                    if let Some((_, finished)) = current.take() {
                        records.push(finished.build()?);
                        if records.len() == count {
                            return Ok(records);
                        }
                    }
                    current = Some((id, RecordBuilder::new()));
                }

                if let Some((_, builder)) = current.as_mut() {
                    apply_entry(builder, name, payload)?;
                }
                item = cursor.next();
            }

            if let Some((_, finished)) = current {
                records.push(finished.build()?);
            }
            Ok(records)
        })
    }

    fn update_field(&self, store: &Store, id: i64, field: &str, value: FieldValue) -> Result<()> {
        let target = updatable_field(field, &value)?;

        store.update(|tx| {
            let mut bucket = tx
                .bucket_mut(BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(BUCKET))?;
            if bucket.get(&Self::field_key(id, Field::Id.name())).is_none() {
                return Err(LayoutError::NotFound { id });
            }
            bucket.put(&Self::field_key(id, target.name()), &encode_value(&value))
        })
    }

    fn read_field_sum(&self, store: &Store, field: &str, count: usize) -> Result<f64> {
        let target = summable_field(field)?;
        let suffix = target.name().as_bytes();

        store.view(|tx| {
            let bucket = Self::root(tx.bucket(BUCKET))?;
            let mut counted: HashSet<i64> = HashSet::new();
            let mut sum = 0.0;
            if count == 0 {
                return Ok(sum);
            }

            // Field suffixes are not indexed, so every key is visited
            for (key, entry) in bucket.cursor() {
                let (id, name, payload) = Self::split_entry(key, entry)?;
                if name != suffix || !counted.insert(id) {
                    continue;
                }
                sum += decode_numeric(target, payload)?;
                if counted.len() == count {
                    break;
                }
            }
            Ok(sum)
        })
    }
}

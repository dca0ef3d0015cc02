//! Single-blob layouts
//!
//! One value per record under `id_key(id)` in the codec's root bucket. The
//! four whole-record codecs differ only in how the blob is produced, so they
//! share this implementation. A field update decodes the whole blob, changes
//! one field and re-encodes it.

use std::marker::PhantomData;

use crate::codec::{id_key, RecordCodec};
use crate::error::{LayoutError, Result};
use crate::record::{FieldValue, Record};
use crate::store::{Bucket, Entry, Store};

use super::{summable_field, updatable_field, StorageStrategy};

/// Blob-per-record layout over codec `C`
pub struct BlobStrategy<C> {
    codec: PhantomData<fn() -> C>,
}

impl<C: RecordCodec> BlobStrategy<C> {
    pub fn new() -> Self {
        Self { codec: PhantomData }
    }

    fn root<'tx>(bucket: Option<Bucket<'tx>>) -> Result<Bucket<'tx>> {
        bucket.ok_or_else(|| LayoutError::bucket_not_found(C::BUCKET))
    }

    fn decode_entry(key: &[u8], entry: Entry<'_>) -> Result<Record> {
        let bytes = entry.value().ok_or_else(|| {
            LayoutError::Decode(format!(
                "{}: nested bucket under record key {:02x?}",
                C::NAME,
                key
            ))
        })?;
        C::decode(bytes)
    }
}

impl<C: RecordCodec> Default for BlobStrategy<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: RecordCodec> StorageStrategy for BlobStrategy<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn setup(&self, store: &Store) -> Result<()> {
        store.update(|tx| {
            tx.create_bucket_if_not_exists(C::BUCKET)?;
            Ok(())
        })?;
        tracing::debug!(strategy = C::NAME, "layout ready");
        Ok(())
    }

    fn write(&self, store: &Store, record: &Record) -> Result<()> {
        store.update(|tx| {
            let mut bucket = tx
                .bucket_mut(C::BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(C::BUCKET))?;
            bucket.put(&id_key(record.id), &C::encode(record)?)
        })
    }

    fn write_many(&self, store: &Store, records: &[Record]) -> Result<()> {
        store.update(|tx| {
            let mut bucket = tx
                .bucket_mut(C::BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(C::BUCKET))?;
            for record in records {
                bucket.put(&id_key(record.id), &C::encode(record)?)?;
            }
            Ok(())
        })?;
        tracing::debug!(strategy = C::NAME, records = records.len(), "bulk write committed");
        Ok(())
    }

    fn read(&self, store: &Store, id: i64) -> Result<Record> {
        store.view(|tx| {
            let bucket = Self::root(tx.bucket(C::BUCKET))?;
            let bytes = bucket
                .get(&id_key(id))
                .ok_or(LayoutError::NotFound { id })?;
            C::decode(bytes)
        })
    }

    fn read_many(&self, store: &Store, start_id: i64, count: usize) -> Result<Vec<Record>> {
        store.view(|tx| {
            let bucket = Self::root(tx.bucket(C::BUCKET))?;
            let mut records = Vec::with_capacity(count.min(bucket.len()));
            if count == 0 {
                return Ok(records);
            }

            let mut cursor = bucket.cursor();
            let mut item = cursor.seek(&id_key(start_id));
            while let Some((key, entry)) = item {
                records.push(Self::decode_entry(key, entry)?);
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
            let mut bucket = tx
                .bucket_mut(C::BUCKET)
                .ok_or_else(|| LayoutError::bucket_not_found(C::BUCKET))?;
            let key = id_key(id);

            let mut record = C::decode(bucket.get(&key).ok_or(LayoutError::NotFound { id })?)?;
            record.set(target, value)?;
            bucket.put(&key, &C::encode(&record)?)
        })
    }

    fn read_field_sum(&self, store: &Store, field: &str, count: usize) -> Result<f64> {
        let target = summable_field(field)?;

        store.view(|tx| {
            let bucket = Self::root(tx.bucket(C::BUCKET))?;
            let mut sum = 0.0;
            for (key, entry) in bucket.cursor().take(count) {
                let record = Self::decode_entry(key, entry)?;
                sum += record
                    .numeric(target)
                    .ok_or_else(|| LayoutError::not_summable(field))?;
            }
            Ok(sum)
        })
    }
}

//! Strategy Module
//!
//! The uniform storage contract and its six physical layouts.
//!
//! ## Layouts
//! ```text
//! Binary, Binary+Names, JSON, GOB   one blob per record
//!                                   users_xxx / id_key(id) -> blob
//!
//! MultiKV                           one key per field, shared bucket
//!                                   users_multikv / id_key(id) ++ name -> payload
//!
//! NestedBucket                      one sub-bucket per record
//!                                   users_nested / id_key(id) / name -> payload
//! ```
//!
//! Every layout keys by [`id_key`](crate::codec::id_key), so range scans see
//! records in ascending id order whatever the encoding.

mod blob;
mod multi_kv;
mod nested;
mod variant;

use std::fmt;
use std::str::FromStr;

pub use blob::BlobStrategy;
pub use multi_kv::MultiKvStrategy;
pub use nested::NestedBucketStrategy;
pub use variant::{insert_mode, StrategyVariant};

use crate::codec::{BinaryCodec, GobCodec, JsonCodec, TaggedCodec};
use crate::error::{LayoutError, Result};
use crate::record::{Field, FieldValue, Record};
use crate::store::Store;

/// Uniform contract satisfied by every layout
///
/// Each call runs in its own transaction: writes and updates are atomic,
/// reads see a consistent snapshot.
pub trait StorageStrategy: Send + Sync {
    /// Display name, e.g. `"Binary+Names"`
    fn name(&self) -> &'static str;

    /// Ensure the layout's root bucket exists (idempotent)
    fn setup(&self, store: &Store) -> Result<()>;

    /// Persist one record in its own write transaction
    fn write(&self, store: &Store, record: &Record) -> Result<()>;

    /// Persist `records` in one write transaction, all or nothing
    fn write_many(&self, store: &Store, records: &[Record]) -> Result<()>;

    /// Fetch the record with `id`
    fn read(&self, store: &Store, id: i64) -> Result<Record>;

    /// Up to `count` records with ids `>= start_id`, ascending
    fn read_many(&self, store: &Store, start_id: i64, count: usize) -> Result<Vec<Record>>;

    /// Overwrite one named field of the record with `id`
    fn update_field(&self, store: &Store, id: i64, field: &str, value: FieldValue) -> Result<()>;

    /// Sum of a numeric field over the first `count` records in id order
    fn read_field_sum(&self, store: &Store, field: &str, count: usize) -> Result<f64>;
}

// =============================================================================
// Field validation shared by every layout
// =============================================================================

/// Resolve an update target and check the value's type against it
pub(crate) fn updatable_field(name: &str, value: &FieldValue) -> Result<Field> {
    let field = Field::from_name(name)
        .filter(|f| f.is_updatable())
        .ok_or_else(|| LayoutError::not_updatable(name))?;

    if value.kind() != field.kind() {
        return Err(LayoutError::TypeMismatch {
            field: name.to_string(),
            expected: field.kind().name(),
            actual: value.kind().name(),
        });
    }
    Ok(field)
}

/// Resolve an aggregate target; only numeric fields can be summed
pub(crate) fn summable_field(name: &str) -> Result<Field> {
    Field::from_name(name)
        .filter(|f| f.kind().is_numeric())
        .ok_or_else(|| LayoutError::not_summable(name))
}

// =============================================================================
// Layout selection
// =============================================================================

/// Names every available layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyKind {
    Binary,
    BinaryNames,
    Json,
    Gob,
    MultiKv,
    NestedBucket,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Binary,
        StrategyKind::BinaryNames,
        StrategyKind::Json,
        StrategyKind::Gob,
        StrategyKind::MultiKv,
        StrategyKind::NestedBucket,
    ];

    pub fn name(self) -> &'static str {
        match self {
            StrategyKind::Binary => "Binary",
            StrategyKind::BinaryNames => "Binary+Names",
            StrategyKind::Json => "JSON",
            StrategyKind::Gob => "GOB",
            StrategyKind::MultiKv => "MultiKV",
            StrategyKind::NestedBucket => "NestedBucket",
        }
    }

    /// Instantiate the layout
    pub fn build(self) -> Box<dyn StorageStrategy> {
        match self {
            StrategyKind::Binary => Box::new(BlobStrategy::<BinaryCodec>::new()),
            StrategyKind::BinaryNames => Box::new(BlobStrategy::<TaggedCodec>::new()),
            StrategyKind::Json => Box::new(BlobStrategy::<JsonCodec>::new()),
            StrategyKind::Gob => Box::new(BlobStrategy::<GobCodec>::new()),
            StrategyKind::MultiKv => Box::new(MultiKvStrategy),
            StrategyKind::NestedBucket => Box::new(NestedBucketStrategy),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = LayoutError;

    /// Case-insensitive; accepts the display names
    fn from_str(s: &str) -> Result<Self> {
        StrategyKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<_> = StrategyKind::ALL.iter().map(|k| k.name()).collect();
                LayoutError::Config(format!(
                    "unknown strategy {:?} (expected one of: {})",
                    s,
                    names.join(", ")
                ))
            })
    }
}

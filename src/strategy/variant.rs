//! Insertion-mode wrapper
//!
//! Pairs a layout with how the driver loads it: one write transaction per
//! record (`Single`) or one transaction for the whole set (`Bulk`). Every
//! other operation is delegated unchanged.

use std::fmt;

use crate::error::Result;
use crate::record::{FieldValue, Record};
use crate::store::Store;

use super::{StorageStrategy, StrategyKind};

pub struct StrategyVariant {
    strategy: Box<dyn StorageStrategy>,
    bulk: bool,
}

impl StrategyVariant {
    pub fn new(strategy: Box<dyn StorageStrategy>, bulk: bool) -> Self {
        Self { strategy, bulk }
    }

    /// Single and bulk variants of every kind in `kinds`, in that order
    pub fn for_kinds(kinds: &[StrategyKind]) -> Vec<StrategyVariant> {
        kinds
            .iter()
            .flat_map(|kind| {
                [
                    StrategyVariant::new(kind.build(), false),
                    StrategyVariant::new(kind.build(), true),
                ]
            })
            .collect()
    }

    /// Single and bulk variants of all six layouts
    pub fn all() -> Vec<StrategyVariant> {
        Self::for_kinds(&StrategyKind::ALL)
    }

    pub fn is_bulk(&self) -> bool {
        self.bulk
    }

    /// `"Bulk"` or `"Single"`
    pub fn insert_mode(&self) -> &'static str {
        insert_mode(self.bulk)
    }

    /// Load `records` according to the insertion mode
    ///
    /// In single mode the first failing record stops the load; earlier
    /// records stay committed.
    pub fn write_all(&self, store: &Store, records: &[Record]) -> Result<()> {
        if self.bulk {
            return self.strategy.write_many(store, records);
        }
        for record in records {
            self.strategy.write(store, record)?;
        }
        Ok(())
    }
}

/// Display label for an insertion mode
pub fn insert_mode(bulk: bool) -> &'static str {
    if bulk {
        "Bulk"
    } else {
        "Single"
    }
}

impl fmt::Debug for StrategyVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyVariant")
            .field("strategy", &self.strategy.name())
            .field("bulk", &self.bulk)
            .finish()
    }
}

impl StorageStrategy for StrategyVariant {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    fn setup(&self, store: &Store) -> Result<()> {
        self.strategy.setup(store)
    }

    fn write(&self, store: &Store, record: &Record) -> Result<()> {
        self.strategy.write(store, record)
    }

    fn write_many(&self, store: &Store, records: &[Record]) -> Result<()> {
        self.strategy.write_many(store, records)
    }

    fn read(&self, store: &Store, id: i64) -> Result<Record> {
        self.strategy.read(store, id)
    }

    fn read_many(&self, store: &Store, start_id: i64, count: usize) -> Result<Vec<Record>> {
        self.strategy.read_many(store, start_id, count)
    }

    fn update_field(&self, store: &Store, id: i64, field: &str, value: FieldValue) -> Result<()> {
        self.strategy.update_field(store, id, field, value)
    }

    fn read_field_sum(&self, store: &Store, field: &str, count: usize) -> Result<f64> {
        self.strategy.read_field_sum(store, field, count)
    }
}

//! Tests for the storage strategies
//!
//! Every test runs against all six layouts. These tests verify:
//! - Round trips, including empty and >64 KiB text
//! - Identical results across layouts
//! - Range scans, aggregates and single-field updates
//! - Error behavior: missing ids, bad fields, malformed stored data
//! - Atomicity of bulk writes and durability across reopen

use layoutbench::codec::id_key;
use layoutbench::store::Store;
use layoutbench::{
    Field, FieldKind, FieldValue, LayoutError, Record, StorageStrategy, StrategyKind,
    StrategyVariant,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn record(id: i64) -> Record {
    Record {
        id,
        username: format!("user_{}", id),
        email: format!("user{}@example.com", id),
        first_name: format!("First_{}", id),
        last_name: format!("Last_{}", id),
        age: 20 + id as i32,
        height: 160.5 + id as f32,
        weight: 55.25,
        balance: 100.0 * id as f64 + 0.5,
        is_active: id % 2 == 0,
        created_at: 1_600_000_000 + id,
        updated_at: 1_700_000_000 + id,
        login_count: id as i32 * 10,
        score: id as f64 / 4.0,
        description: format!("Description for user {}", id),
    }
}

fn records(n: i64) -> Vec<Record> {
    (0..n).map(record).collect()
}

/// Run `f` once per layout against a fresh, set-up in-memory store
fn each_strategy(mut f: impl FnMut(&dyn StorageStrategy, &Store)) {
    for kind in StrategyKind::ALL {
        let strategy = kind.build();
        let store = Store::in_memory();
        strategy.setup(&store).unwrap();
        f(strategy.as_ref(), &store);
    }
}

fn bucket_name(kind: StrategyKind) -> &'static [u8] {
    match kind {
        StrategyKind::Binary => b"users_binary",
        StrategyKind::BinaryNames => b"users_binary_names",
        StrategyKind::Json => b"users_json",
        StrategyKind::Gob => b"users_gob",
        StrategyKind::MultiKv => b"users_multikv",
        StrategyKind::NestedBucket => b"users_nested",
    }
}

fn new_value(kind: FieldKind) -> FieldValue {
    match kind {
        FieldKind::Int64 => FieldValue::Int64(-123_456_789),
        FieldKind::Int32 => FieldValue::Int32(4242),
        FieldKind::Float32 => FieldValue::Float32(181.75),
        FieldKind::Float64 => FieldValue::Float64(12345.67),
        FieldKind::Bool => FieldValue::Bool(true),
        FieldKind::Text => FieldValue::Text("updated text".to_string()),
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_round_trip_edge_records() {
    let edge = vec![
        Record::default(),
        Record {
            id: 1,
            username: "a".to_string(),
            email: "b".to_string(),
            first_name: "c".to_string(),
            last_name: "d".to_string(),
            description: "e".to_string(),
            ..Record::default()
        },
        Record {
            id: 2,
            description: "long ".repeat(14_000),
            ..record(2)
        },
        Record {
            id: 3,
            age: i32::MIN,
            login_count: i32::MAX,
            created_at: i64::MIN,
            updated_at: i64::MAX,
            height: -0.001,
            weight: f32::MAX,
            balance: f64::MIN_POSITIVE,
            score: -1e300,
            ..record(3)
        },
        record(-7),
    ];

    each_strategy(|strategy, store| {
        for r in &edge {
            strategy.write(store, r).unwrap();
        }
        for r in &edge {
            let read = strategy.read(store, r.id).unwrap();
            assert_eq!(&read, r, "{} id {}", strategy.name(), r.id);
        }
    });
}

#[test]
fn test_cross_layout_equivalence() {
    let original = record(11);
    let mut results = Vec::new();

    each_strategy(|strategy, store| {
        strategy.write(store, &original).unwrap();
        results.push((strategy.name(), strategy.read(store, 11).unwrap()));
    });

    assert_eq!(results.len(), 6);
    for (name, read) in &results {
        assert_eq!(read, &original, "{}", name);
    }
}

#[test]
fn test_names_match_kinds() {
    for kind in StrategyKind::ALL {
        assert_eq!(kind.build().name(), kind.name());
    }
}

#[test]
fn test_setup_is_idempotent() {
    each_strategy(|strategy, store| {
        strategy.write(store, &record(1)).unwrap();
        strategy.setup(store).unwrap();
        assert_eq!(strategy.read(store, 1).unwrap(), record(1));
    });
}

// =============================================================================
// Range Scan Tests
// =============================================================================

#[test]
fn test_range_correctness() {
    const N: i64 = 20;

    each_strategy(|strategy, store| {
        strategy.write_many(store, &records(N)).unwrap();

        for start in [0i64, 1, 5, 19, 20, 25] {
            for count in [0usize, 1, 3, 20, 50] {
                let got = strategy.read_many(store, start, count).unwrap();
                let expected = count.min((N - start).max(0) as usize);

                assert_eq!(
                    got.len(),
                    expected,
                    "{} read_many({}, {})",
                    strategy.name(),
                    start,
                    count
                );
                for (i, r) in got.iter().enumerate() {
                    assert_eq!(r, &record(start + i as i64));
                }
            }
        }
    });
}

#[test]
fn test_read_many_from_gap() {
    each_strategy(|strategy, store| {
        for id in [2, 4, 6, 8] {
            strategy.write(store, &record(id)).unwrap();
        }
        let ids: Vec<i64> = strategy
            .read_many(store, 5, 10)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![6, 8], "{}", strategy.name());
    });
}

#[test]
fn test_read_many_orders_negative_ids() {
    each_strategy(|strategy, store| {
        for id in [3, -1, 0, -20] {
            strategy.write(store, &record(id)).unwrap();
        }
        let ids: Vec<i64> = strategy
            .read_many(store, i64::MIN, 10)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![-20, -1, 0, 3], "{}", strategy.name());
    });
}

#[test]
fn test_read_many_empty_store() {
    each_strategy(|strategy, store| {
        assert!(strategy.read_many(store, 0, 10).unwrap().is_empty());
    });
}

// =============================================================================
// Aggregate Tests
// =============================================================================

#[test]
fn test_aggregate_correctness() {
    let balances = [10.5, 20.25, 0.0, -5.75, 100.0];
    let data: Vec<Record> = balances
        .iter()
        .enumerate()
        .map(|(i, &balance)| Record {
            balance,
            ..record(i as i64)
        })
        .collect();

    each_strategy(|strategy, store| {
        strategy.write_many(store, &data).unwrap();
        let sum = strategy.read_field_sum(store, "balance", 5).unwrap();
        assert_eq!(sum, 125.0, "{}", strategy.name());
    });
}

#[test]
fn test_aggregate_respects_count() {
    each_strategy(|strategy, store| {
        strategy.write_many(store, &records(10)).unwrap();

        // login_count = 10 * id
        assert_eq!(strategy.read_field_sum(store, "login_count", 4).unwrap(), 60.0);
        assert_eq!(strategy.read_field_sum(store, "login_count", 100).unwrap(), 450.0);
        assert_eq!(strategy.read_field_sum(store, "login_count", 0).unwrap(), 0.0);
    });
}

#[test]
fn test_aggregate_every_numeric_field() {
    let data = records(6);
    each_strategy(|strategy, store| {
        strategy.write_many(store, &data).unwrap();
        for field in Field::ALL.into_iter().filter(|f| f.kind().is_numeric()) {
            let expected: f64 = data.iter().filter_map(|r| r.numeric(field)).sum();
            let sum = strategy.read_field_sum(store, field.name(), data.len()).unwrap();
            assert_eq!(sum, expected, "{} {}", strategy.name(), field);
        }
    });
}

#[test]
fn test_aggregate_unsupported_fields() {
    each_strategy(|strategy, store| {
        strategy.write(store, &record(1)).unwrap();
        for field in ["username", "is_active", "description", "nickname"] {
            let err = strategy.read_field_sum(store, field, 1).unwrap_err();
            assert!(
                matches!(err, LayoutError::UnsupportedField { .. }),
                "{} {}",
                strategy.name(),
                field
            );
        }
    });
}

// =============================================================================
// Update Tests
// =============================================================================

#[test]
fn test_update_every_field() {
    each_strategy(|strategy, store| {
        strategy.write(store, &record(4)).unwrap();
        let mut expected = record(4);

        for field in Field::ALL.into_iter().filter(|f| f.is_updatable()) {
            let value = new_value(field.kind());
            strategy
                .update_field(store, 4, field.name(), value.clone())
                .unwrap();
            expected.set(field, value).unwrap();

            assert_eq!(
                strategy.read(store, 4).unwrap(),
                expected,
                "{} after updating {}",
                strategy.name(),
                field
            );
        }
    });
}

#[test]
fn test_update_is_idempotent_and_isolated() {
    each_strategy(|strategy, store| {
        strategy.write_many(store, &records(3)).unwrap();

        strategy
            .update_field(store, 1, "balance", FieldValue::Float64(42.5))
            .unwrap();
        let once = strategy.read(store, 1).unwrap();
        strategy
            .update_field(store, 1, "balance", FieldValue::Float64(42.5))
            .unwrap();
        let twice = strategy.read(store, 1).unwrap();

        assert_eq!(once, twice);
        assert_eq!(once.balance, 42.5);
        assert_eq!(Record { balance: record(1).balance, ..once }, record(1));

        // Neighbors untouched
        assert_eq!(strategy.read(store, 0).unwrap(), record(0));
        assert_eq!(strategy.read(store, 2).unwrap(), record(2));
    });
}

#[test]
fn test_update_type_mismatch() {
    each_strategy(|strategy, store| {
        strategy.write(store, &record(1)).unwrap();

        let err = strategy
            .update_field(store, 1, "login_count", FieldValue::Float64(1.0))
            .unwrap_err();
        assert!(
            matches!(err, LayoutError::TypeMismatch { .. }),
            "{}: {:?}",
            strategy.name(),
            err
        );
        assert_eq!(strategy.read(store, 1).unwrap(), record(1));
    });
}

#[test]
fn test_update_unsupported_fields() {
    each_strategy(|strategy, store| {
        strategy.write(store, &record(1)).unwrap();

        for (field, value) in [
            ("id", FieldValue::Int64(99)),
            ("nickname", FieldValue::Text("x".to_string())),
        ] {
            let err = strategy.update_field(store, 1, field, value).unwrap_err();
            assert!(
                matches!(err, LayoutError::UnsupportedField { .. }),
                "{} {}",
                strategy.name(),
                field
            );
        }
        assert_eq!(strategy.read(store, 1).unwrap(), record(1));
    });
}

// =============================================================================
// Missing Key Tests
// =============================================================================

#[test]
fn test_missing_id() {
    each_strategy(|strategy, store| {
        strategy.write_many(store, &records(3)).unwrap();
        let before = strategy.read_many(store, 0, 10).unwrap();

        assert!(matches!(
            strategy.read(store, 99),
            Err(LayoutError::NotFound { id: 99 })
        ));
        assert!(matches!(
            strategy.update_field(store, 99, "score", FieldValue::Float64(1.0)),
            Err(LayoutError::NotFound { id: 99 })
        ));

        assert_eq!(strategy.read_many(store, 0, 10).unwrap(), before);
        assert!(matches!(
            strategy.read(store, 99),
            Err(LayoutError::NotFound { .. })
        ));
    });
}

#[test]
fn test_operations_before_setup() {
    for kind in StrategyKind::ALL {
        let strategy = kind.build();
        let store = Store::in_memory();

        assert!(matches!(
            strategy.write(&store, &record(1)),
            Err(LayoutError::Store(_))
        ));
        assert!(matches!(
            strategy.read(&store, 1),
            Err(LayoutError::Store(_))
        ));
        assert!(matches!(
            strategy.read_many(&store, 0, 1),
            Err(LayoutError::Store(_))
        ));
    }
}

// =============================================================================
// Scenario
// =============================================================================

#[test]
fn test_scenario() {
    each_strategy(|strategy, store| {
        strategy.write_many(store, &records(10)).unwrap();

        let ids: Vec<i64> = strategy
            .read_many(store, 5, 3)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);

        let expected: f64 = (0..10).map(|id| (id * 10) as f64).sum();
        assert_eq!(
            strategy.read_field_sum(store, "login_count", 10).unwrap(),
            expected
        );

        strategy
            .update_field(store, 3, "score", FieldValue::Float64(99.5))
            .unwrap();
        let updated = strategy.read(store, 3).unwrap();
        assert_eq!(updated.score, 99.5);
        assert_eq!(Record { score: record(3).score, ..updated }, record(3));
    });
}

// =============================================================================
// Atomicity & Decode Errors
// =============================================================================

/// Plant an entry that makes writing record 2 fail halfway through a batch
fn plant_conflict(kind: StrategyKind, store: &Store) {
    store
        .update(|tx| {
            let mut root = tx.create_bucket_if_not_exists(bucket_name(kind))?;
            match kind {
                StrategyKind::NestedBucket => root.put(&id_key(2), b"not a bucket"),
                StrategyKind::MultiKv => {
                    let mut key = id_key(2).to_vec();
                    key.extend_from_slice(b"age");
                    root.create_bucket_if_not_exists(&key)?;
                    Ok(())
                }
                _ => {
                    root.create_bucket_if_not_exists(&id_key(2))?;
                    Ok(())
                }
            }
        })
        .unwrap();
}

#[test]
fn test_write_many_is_all_or_nothing() {
    for kind in StrategyKind::ALL {
        let strategy = kind.build();
        let store = Store::in_memory();
        strategy.setup(&store).unwrap();
        plant_conflict(kind, &store);

        assert!(strategy.write_many(&store, &records(5)).is_err(), "{}", kind);

        for id in [0, 1, 3, 4] {
            assert!(
                matches!(strategy.read(&store, id), Err(LayoutError::NotFound { .. })),
                "{} left record {} behind",
                kind,
                id
            );
        }
    }
}

#[test]
fn test_malformed_stored_data_is_decode_error() {
    for kind in StrategyKind::ALL {
        let strategy = kind.build();
        let store = Store::in_memory();
        strategy.setup(&store).unwrap();

        store
            .update(|tx| {
                let mut root = tx.bucket_mut(bucket_name(kind)).unwrap();
                match kind {
                    StrategyKind::NestedBucket => {
                        let mut record = root.create_bucket_if_not_exists(&id_key(7))?;
                        record.put(b"id", b"7")?;
                    }
                    StrategyKind::MultiKv => {
                        let mut key = id_key(7).to_vec();
                        key.extend_from_slice(b"age");
                        root.put(&key, b"not a number")?;
                    }
                    _ => root.put(&id_key(7), &[0xff; 6])?,
                }
                Ok(())
            })
            .unwrap();

        let err = strategy.read(&store, 7).unwrap_err();
        assert!(matches!(err, LayoutError::Decode(_)), "{}: {:?}", kind, err);
        assert!(strategy.read_many(&store, 0, 10).is_err(), "{}", kind);
    }
}

// =============================================================================
// Persistence & Variants
// =============================================================================

#[test]
fn test_reopen_preserves_every_layout() {
    let temp = TempDir::new().unwrap();
    let data = records(25);

    {
        let store = Store::open_path(temp.path()).unwrap();
        for kind in StrategyKind::ALL {
            let strategy = kind.build();
            strategy.setup(&store).unwrap();
            strategy.write_many(&store, &data).unwrap();
            strategy
                .update_field(&store, 7, "email", FieldValue::Text("new@example.com".into()))
                .unwrap();
        }
        store.close().unwrap();
    }

    let store = Store::open_path(temp.path()).unwrap();
    let mut expected = data.clone();
    expected[7].email = "new@example.com".to_string();

    for kind in StrategyKind::ALL {
        let strategy = kind.build();
        assert_eq!(strategy.read_many(&store, 0, 100).unwrap(), expected, "{}", kind);
    }
}

#[test]
fn test_variants_load_every_record() {
    let data = records(12);
    let variants = StrategyVariant::all();
    assert_eq!(variants.len(), 12);

    for variant in &variants {
        let store = Store::in_memory();
        variant.setup(&store).unwrap();
        variant.write_all(&store, &data).unwrap();

        assert_eq!(
            variant.read_many(&store, 0, 100).unwrap(),
            data,
            "{} ({})",
            variant.name(),
            variant.insert_mode()
        );
    }

    let bulk: Vec<bool> = variants.iter().map(|v| v.is_bulk()).collect();
    assert_eq!(&bulk[..2], &[false, true]);
    assert_eq!(variants[0].insert_mode(), "Single");
    assert_eq!(variants[1].insert_mode(), "Bulk");
}

#[test]
fn test_single_mode_keeps_records_before_failure() {
    let kind = StrategyKind::Binary;
    let store = Store::in_memory();
    let variant = StrategyVariant::new(kind.build(), false);
    variant.setup(&store).unwrap();
    plant_conflict(kind, &store);

    assert!(variant.write_all(&store, &records(5)).is_err());

    // Each record had its own transaction: 0 and 1 committed, 3 and 4 never ran
    assert_eq!(variant.read(&store, 1).unwrap(), record(1));
    assert!(matches!(variant.read(&store, 3), Err(LayoutError::NotFound { .. })));
}

//! Property-based tests for reconciliation invariants
//!
//! These tests verify properties that must hold for all table pairs, not just
//! specific fixtures.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use sync_core::changeset::batch;
use sync_core::reconcile::diff;
use sync_core::{DataAction, SourceSnapshot, Table};

type Record = HashMap<String, String>;

fn table(columns: &[&str], rows: &BTreeMap<u8, (u8, u8)>) -> Table {
    let cells = rows
        .iter()
        .map(|(id, (a, b))| {
            columns
                .iter()
                .map(|c| match *c {
                    "id" => id.to_string(),
                    "a" => a.to_string(),
                    _ => b.to_string(),
                })
                .collect()
        })
        .collect();

    Table::from_source(SourceSnapshot {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        rows: cells,
        primary_key: Some("id".to_string()),
    })
    .unwrap()
}

fn records(rows: &BTreeMap<u8, (u8, u8)>) -> BTreeMap<String, Record> {
    rows.iter()
        .map(|(id, (a, b))| {
            let record = [
                ("id".to_string(), id.to_string()),
                ("a".to_string(), a.to_string()),
                ("b".to_string(), b.to_string()),
            ]
            .into_iter()
            .collect();
            (id.to_string(), record)
        })
        .collect()
}

fn apply(state: &mut BTreeMap<String, Record>, actions: &[DataAction]) {
    for action in actions {
        match action {
            DataAction::Delete { key, .. } => {
                state.remove(key);
            }
            DataAction::Insert { columns, .. } => {
                let record: Record = columns
                    .iter()
                    .map(|c| (c.name.clone(), c.data.clone()))
                    .collect();
                state.insert(record["id"].clone(), record);
            }
            DataAction::Update { key, columns, .. } => {
                let record = state.get_mut(key).expect("update of a missing key");
                for column in columns {
                    record.insert(column.name.clone(), column.data.clone());
                }
            }
        }
    }
}

fn rows_strategy() -> impl Strategy<Value = BTreeMap<u8, (u8, u8)>> {
    prop::collection::btree_map(0u8..40, (0u8..3, 0u8..3), 0..30)
}

// ============================================================================
// Reconciliation Invariants
// ============================================================================

proptest! {
    /// Property: replaying the diff onto the base yields the comparative table
    #[test]
    fn replaying_diff_converges(base in rows_strategy(), other in rows_strategy()) {
        let base_table = table(&["id", "a", "b"], &base);
        let other_table = table(&["b", "id", "a"], &other);

        let actions = diff("t", &base_table, &other_table).unwrap().into_actions();

        let mut state = records(&base);
        apply(&mut state, &actions);
        prop_assert_eq!(state, records(&other));
    }

    /// Property: a table never differs from itself, whatever its column order
    #[test]
    fn self_diff_is_empty(rows in rows_strategy()) {
        let left = table(&["id", "a", "b"], &rows);
        let right = table(&["a", "b", "id"], &rows);

        prop_assert!(diff("t", &left, &right).unwrap().is_empty());
    }

    /// Property: updates never carry unchanged columns or the key column
    #[test]
    fn updates_are_minimal(base in rows_strategy(), other in rows_strategy()) {
        let base_table = table(&["id", "a", "b"], &base);
        let other_table = table(&["id", "a", "b"], &other);

        for action in diff("t", &base_table, &other_table).unwrap().modified {
            if let DataAction::Update { key, columns, .. } = action {
                let id: u8 = key.parse().unwrap();
                let (old_a, old_b) = base[&id];
                prop_assert!(!columns.is_empty());
                for column in columns {
                    let old = if column.name == "a" { old_a } else { old_b };
                    prop_assert_ne!(column.name.as_str(), "id");
                    prop_assert_ne!(column.data, old.to_string());
                }
            }
        }
    }

    /// Property: batching keeps every action in order and bounds batch size
    #[test]
    fn batching_preserves_order(base in rows_strategy(), other in rows_strategy(), size in 1usize..15) {
        let actions = diff("t", &table(&["id", "a", "b"], &base), &table(&["id", "a", "b"], &other))
            .unwrap()
            .into_actions();

        let batches = batch(actions.clone(), size);
        prop_assert_eq!(batches.len(), actions.len().div_ceil(size));
        prop_assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= size));
        prop_assert_eq!(batches.concat(), actions);
    }
}

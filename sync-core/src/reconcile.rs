//! Table reconciliation
//!
//! Compares a base table (the ledger, the "before" state) against a
//! comparative table (the relational store, the authoritative "after" state)
//! and produces the actions that turn one into the other.
//!
//! The three scans are independent; each yields a single action kind:
//!
//! | scan            | key in base | key in other | rows equal | action |
//! |-----------------|-------------|--------------|------------|--------|
//! | `find_removed`  | yes         | no           | –          | Delete |
//! | `find_added`    | no          | yes          | –          | Insert |
//! | `find_modified` | yes         | yes          | no         | Update |

use crate::changeset::ChangeSet;
use crate::table::Table;
use crate::types::{ColumnData, DataAction};
use crate::{Error, Result};
use std::collections::HashSet;
use tracing::debug;

/// Whether two tables can be diffed: same key column, same header set
pub fn compare_schema(a: &Table, b: &Table) -> bool {
    if a.primary_key_name() != b.primary_key_name() {
        return false;
    }
    if a.headers().len() != b.headers().len() {
        return false;
    }

    let other: HashSet<&str> = b.headers().iter().map(String::as_str).collect();
    a.headers().iter().all(|h| other.contains(h.as_str()))
}

fn ensure_schema(base: &Table, other: &Table) -> Result<()> {
    if compare_schema(base, other) {
        Ok(())
    } else {
        Err(Error::SchemaMismatch {
            base_headers: base.headers().to_vec(),
            other_headers: other.headers().to_vec(),
        })
    }
}

/// Delete actions for keys present in `base` but absent in `other`
pub fn find_removed(table_name: &str, base: &Table, other: &Table) -> Result<Vec<DataAction>> {
    ensure_schema(base, other)?;

    Ok(base
        .rows()
        .filter(|row| !other.contains_key(row.key()))
        .map(|row| DataAction::Delete {
            table_name: table_name.to_string(),
            key: row.key().to_string(),
        })
        .collect())
}

/// Insert actions, with every column, for keys present only in `other`
pub fn find_added(table_name: &str, base: &Table, other: &Table) -> Result<Vec<DataAction>> {
    ensure_schema(base, other)?;

    Ok(other
        .rows()
        .filter(|row| !base.contains_key(row.key()))
        .map(|row| DataAction::Insert {
            table_name: table_name.to_string(),
            columns: row
                .columns()
                .map(|(name, data)| ColumnData::new(name, data))
                .collect(),
        })
        .collect())
}

/// Update actions for keys present in both tables whose rows differ
///
/// Each update carries only the differing columns, valued from `other`.
pub fn find_modified(table_name: &str, base: &Table, other: &Table) -> Result<Vec<DataAction>> {
    ensure_schema(base, other)?;

    let mut actions = Vec::new();
    for base_row in base.rows() {
        let Some(other_row) = other.get(base_row.key()) else {
            continue;
        };
        if base_row == other_row {
            continue;
        }

        let columns = base_row
            .columns()
            .filter_map(|(name, before)| match other_row.cell(name) {
                Some(after) if after != before => Some(ColumnData::new(name, after)),
                _ => None,
            })
            .collect();

        actions.push(DataAction::Update {
            table_name: table_name.to_string(),
            key: base_row.key().to_string(),
            columns,
        });
    }

    Ok(actions)
}

/// Run all three scans
pub fn diff(table_name: &str, base: &Table, other: &Table) -> Result<ChangeSet> {
    ensure_schema(base, other)?;

    let changes = ChangeSet {
        removed: find_removed(table_name, base, other)?,
        added: find_added(table_name, base, other)?,
        modified: find_modified(table_name, base, other)?,
    };

    debug!(
        table = table_name,
        base_rows = base.len(),
        other_rows = other.len(),
        removed = changes.removed.len(),
        added = changes.added.len(),
        modified = changes.modified.len(),
        "Reconciled tables"
    );

    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LedgerRow, LedgerSnapshot, SourceSnapshot};

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn ledger(headers: &[&str], key: &str, rows: &[&[&str]]) -> Table {
        Table::from_ledger(LedgerSnapshot {
            headers: strings(headers),
            primary_key_name: key.to_string(),
            rows: rows.iter().map(|r| LedgerRow::new(r.iter().copied())).collect(),
        })
        .unwrap()
    }

    fn source(headers: &[&str], key: &str, rows: &[&[&str]]) -> Table {
        Table::from_source(SourceSnapshot {
            columns: strings(headers),
            rows: rows.iter().map(|r| strings(r)).collect(),
            primary_key: Some(key.to_string()),
        })
        .unwrap()
    }

    #[test]
    fn test_added_row() {
        let base = ledger(&["id", "x"], "id", &[&["1", "a"]]);
        let other = source(&["id", "x"], "id", &[&["1", "a"], &["2", "b"]]);

        let added = find_added("t", &base, &other).unwrap();
        assert_eq!(
            added,
            vec![DataAction::Insert {
                table_name: "t".to_string(),
                columns: vec![ColumnData::new("id", "2"), ColumnData::new("x", "b")],
            }]
        );
        assert!(find_removed("t", &base, &other).unwrap().is_empty());
        assert!(find_modified("t", &base, &other).unwrap().is_empty());
    }

    #[test]
    fn test_removed_row() {
        let base = ledger(&["id", "x"], "id", &[&["1", "a"], &["2", "b"]]);
        let other = source(&["id", "x"], "id", &[&["2", "b"]]);

        let removed = find_removed("t", &base, &other).unwrap();
        assert_eq!(
            removed,
            vec![DataAction::Delete {
                table_name: "t".to_string(),
                key: "1".to_string(),
            }]
        );
        assert!(find_added("t", &base, &other).unwrap().is_empty());
    }

    #[test]
    fn test_modified_carries_only_changed_columns() {
        let base = ledger(&["id", "x", "y"], "id", &[&["1", "a", "1"]]);
        let other = source(&["id", "x", "y"], "id", &[&["1", "a", "2"]]);

        let modified = find_modified("t", &base, &other).unwrap();
        assert_eq!(
            modified,
            vec![DataAction::Update {
                table_name: "t".to_string(),
                key: "1".to_string(),
                columns: vec![ColumnData::new("y", "2")],
            }]
        );
    }

    #[test]
    fn test_modified_with_permuted_columns() {
        let base = ledger(&["id", "x", "y"], "id", &[&["1", "a", "1"]]);
        let other = source(&["y", "id", "x"], "id", &[&["1", "1", "b"]]);

        let modified = find_modified("t", &base, &other).unwrap();
        assert_eq!(modified.len(), 1);
        match &modified[0] {
            DataAction::Update { columns, .. } => {
                assert_eq!(columns, &vec![ColumnData::new("x", "b")]);
            }
            other => panic!("unexpected action {:?}", other),
        }
    }

    #[test]
    fn test_permuted_identical_tables_produce_nothing() {
        let base = ledger(&["id", "x"], "id", &[&["1", "a"], &["2", "b"]]);
        let other = source(&["x", "id"], "id", &[&["b", "2"], &["a", "1"]]);

        let changes = diff("t", &base, &other).unwrap();
        assert!(changes.is_empty());
    }

    #[test]
    fn test_schema_mismatch_on_key_name() {
        let base = ledger(&["id", "x"], "id", &[&["1", "a"]]);
        let other = source(&["id", "x"], "x", &[&["1", "a"]]);

        assert!(!compare_schema(&base, &other));
        assert!(matches!(
            find_added("t", &base, &other),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            find_removed("t", &base, &other),
            Err(Error::SchemaMismatch { .. })
        ));
        assert!(matches!(
            find_modified("t", &base, &other),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_schema_mismatch_on_headers() {
        let base = ledger(&["id", "x"], "id", &[]);
        let other = source(&["id", "y"], "id", &[&["1", "a"]]);

        let err = diff("t", &base, &other).unwrap_err();
        assert!(err.to_string().contains("base [id,x]"));
        assert!(err.to_string().contains("other [id,y]"));
    }

    #[test]
    fn test_schema_mismatch_on_extra_column() {
        let base = ledger(&["id", "x"], "id", &[]);
        let other = source(&["id", "x", "y"], "id", &[]);

        assert!(!compare_schema(&base, &other));
        assert!(!compare_schema(&other, &base));
    }
}

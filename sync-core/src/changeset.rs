//! Action ordering and batching
//!
//! Actions are always replayed deletes first, then inserts, then updates,
//! and split into fixed-size batches that each become one ledger transaction.

use crate::types::DataAction;
use std::fmt;
use std::ops::AddAssign;

/// Result of one reconciliation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Delete actions
    pub removed: Vec<DataAction>,

    /// Insert actions
    pub added: Vec<DataAction>,

    /// Update actions
    pub modified: Vec<DataAction>,
}

impl ChangeSet {
    /// Total number of actions
    pub fn len(&self) -> usize {
        self.removed.len() + self.added.len() + self.modified.len()
    }

    /// Whether nothing needs to be written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Per-kind counts
    pub fn counts(&self) -> ActionCounts {
        ActionCounts {
            added: self.added.len(),
            removed: self.removed.len(),
            modified: self.modified.len(),
        }
    }

    /// Concatenate removed, added, modified in that order
    pub fn into_actions(self) -> Vec<DataAction> {
        let mut actions = Vec::with_capacity(self.len());
        actions.extend(self.removed);
        actions.extend(self.added);
        actions.extend(self.modified);
        actions
    }

    /// Ordered actions split into batches of at most `batch_size`
    pub fn into_batches(self, batch_size: usize) -> Vec<Vec<DataAction>> {
        batch(self.into_actions(), batch_size)
    }
}

/// Split actions into consecutive batches, preserving order
///
/// A zero batch size is treated as one.
pub fn batch(actions: Vec<DataAction>, batch_size: usize) -> Vec<Vec<DataAction>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(actions.len().div_ceil(batch_size));
    let mut iter = actions.into_iter().peekable();

    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }

    batches
}

/// Added/removed/modified tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActionCounts {
    /// Inserted rows
    pub added: usize,

    /// Deleted rows
    pub removed: usize,

    /// Updated rows
    pub modified: usize,
}

impl ActionCounts {
    /// Tally a slice of actions by kind
    pub fn tally<'a>(actions: impl IntoIterator<Item = &'a DataAction>) -> Self {
        actions
            .into_iter()
            .fold(Self::default(), |mut counts, action| {
                match action {
                    DataAction::Insert { .. } => counts.added += 1,
                    DataAction::Delete { .. } => counts.removed += 1,
                    DataAction::Update { .. } => counts.modified += 1,
                }
                counts
            })
    }

    /// Sum of all kinds
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

impl AddAssign for ActionCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.removed += other.removed;
        self.modified += other.modified;
    }
}

impl fmt::Display for ActionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} record(s) added, {} record(s) removed, {} record(s) modified",
            self.added, self.removed, self.modified
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnData;

    fn delete(key: usize) -> DataAction {
        DataAction::Delete {
            table_name: "t".to_string(),
            key: key.to_string(),
        }
    }

    fn insert(key: usize) -> DataAction {
        DataAction::Insert {
            table_name: "t".to_string(),
            columns: vec![ColumnData::new("id", key.to_string())],
        }
    }

    fn update(key: usize) -> DataAction {
        DataAction::Update {
            table_name: "t".to_string(),
            key: key.to_string(),
            columns: vec![ColumnData::new("x", "changed")],
        }
    }

    #[test]
    fn test_batch_counts() {
        for n in [0usize, 1, 9, 10, 11, 25, 100] {
            let actions: Vec<_> = (0..n).map(delete).collect();
            let batches = batch(actions, 10);

            assert_eq!(batches.len(), n.div_ceil(10), "n = {}", n);
            assert!(batches.iter().all(|b| !b.is_empty() && b.len() <= 10));
            assert_eq!(batches.iter().map(Vec::len).sum::<usize>(), n);
        }
    }

    #[test]
    fn test_batches_preserve_kind_order() {
        let changes = ChangeSet {
            removed: (0..4).map(delete).collect(),
            added: (0..8).map(insert).collect(),
            modified: (0..5).map(update).collect(),
        };

        let batches = changes.into_batches(10);
        assert_eq!(batches.len(), 2);

        let kinds: Vec<&str> = batches.iter().flatten().map(DataAction::kind).collect();
        let mut expected = vec!["delete"; 4];
        expected.extend(vec!["insert"; 8]);
        expected.extend(vec!["update"; 5]);
        assert_eq!(kinds, expected);
    }

    #[test]
    fn test_zero_batch_size() {
        let batches = batch((0..3).map(delete).collect(), 0);
        assert_eq!(batches.len(), 3);
    }

    #[test]
    fn test_tally() {
        let actions = vec![delete(1), insert(2), insert(3), update(4)];
        let counts = ActionCounts::tally(&actions);

        assert_eq!(
            counts,
            ActionCounts {
                added: 2,
                removed: 1,
                modified: 1
            }
        );
        assert_eq!(counts.total(), 4);
        assert_eq!(
            counts.to_string(),
            "2 record(s) added, 1 record(s) removed, 1 record(s) modified"
        );
    }
}

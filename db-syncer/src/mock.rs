//! In-memory collaborators for tests and dry runs
//!
//! [`MockLedgerClient`] applies submitted actions to its own tables, so a
//! second cycle against it observes the first cycle's writes.

use crate::ledger::{LedgerClient, LedgerStatus};
use crate::source::SourceStore;
use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use sync_core::{DataAction, LedgerRow, LedgerSnapshot, SignedTransaction, SourceSnapshot};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Source store serving fixed snapshots keyed by connection string
#[derive(Debug, Default, Clone)]
pub struct MockSourceStore {
    snapshots: Arc<RwLock<HashMap<String, SourceSnapshot>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MockSourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `columns`/`rows` for `connection`
    pub async fn set_rows(&self, connection: &str, columns: &[&str], rows: Vec<Vec<String>>) {
        let snapshot = SourceSnapshot {
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
            primary_key: None,
        };

        self.snapshots
            .write()
            .await
            .insert(connection.to_string(), snapshot);
    }

    /// Make every fetch on `connection` fail
    pub async fn fail(&self, connection: &str) {
        self.failing.write().await.insert(connection.to_string());
    }
}

#[async_trait]
impl SourceStore for MockSourceStore {
    async fn fetch(
        &self,
        connection: &str,
        _query: &str,
        primary_key: &str,
    ) -> Result<SourceSnapshot> {
        if self.failing.read().await.contains(connection) {
            return Err(Error::DataAccess(format!(
                "Mock source: connection {} refused",
                connection
            )));
        }

        let mut snapshot = self
            .snapshots
            .read()
            .await
            .get(connection)
            .cloned()
            .ok_or_else(|| Error::DataAccess(format!("Mock source: unknown {}", connection)))?;

        if snapshot.columns.iter().any(|c| c == primary_key) {
            snapshot.primary_key = Some(primary_key.to_string());
        }

        Ok(snapshot)
    }
}

#[derive(Debug, Clone)]
struct MockTable {
    headers: Vec<String>,
    primary_key_name: String,
    rows: Vec<Vec<String>>,
}

impl MockTable {
    fn key_index(&self) -> usize {
        self.headers
            .iter()
            .position(|h| *h == self.primary_key_name)
            .unwrap_or(0)
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn apply(&mut self, action: &DataAction) {
        let key_idx = self.key_index();

        match action {
            DataAction::Delete { key, .. } => self.rows.retain(|r| r[key_idx] != *key),
            DataAction::Insert { columns, .. } => {
                let mut row = vec![String::new(); self.headers.len()];
                for column in columns {
                    if let Some(idx) = self.column_index(&column.name) {
                        row[idx] = column.data.clone();
                    }
                }
                self.rows.push(row);
            }
            DataAction::Update { key, columns, .. } => {
                let indexes: Vec<_> = columns
                    .iter()
                    .map(|c| (self.column_index(&c.name), c.data.clone()))
                    .collect();

                if let Some(row) = self.rows.iter_mut().find(|r| r[key_idx] == *key) {
                    for (idx, data) in indexes {
                        if let Some(idx) = idx {
                            row[idx] = data;
                        }
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    tables: HashMap<String, MockTable>,
    unreachable: HashSet<String>,
    submitted: Vec<SignedTransaction>,
    reject_after: Option<usize>,
    pages_served: usize,
    height: u64,
}

/// Ledger client backed by in-memory tables
#[derive(Debug, Default, Clone)]
pub struct MockLedgerClient {
    state: Arc<RwLock<LedgerState>>,
}

impl MockLedgerClient {
    /// Create a ledger with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a table with its headers and primary-key column
    pub async fn create_table(&self, name: &str, headers: &[&str], primary_key_name: &str) {
        let table = MockTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            primary_key_name: primary_key_name.to_string(),
            rows: Vec::new(),
        };

        self.state
            .write()
            .await
            .tables
            .insert(name.to_string(), table);
    }

    /// Append a row to an existing table
    pub async fn insert_row(&self, table: &str, cells: Vec<String>) {
        if let Some(table) = self.state.write().await.tables.get_mut(table) {
            table.rows.push(cells);
        }
    }

    /// Current rows of a table
    pub async fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.state
            .read()
            .await
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Transactions accepted so far
    pub async fn submitted(&self) -> Vec<SignedTransaction> {
        self.state.read().await.submitted.clone()
    }

    /// Accept `accepted` more transactions, then reject every submission
    pub async fn reject_after(&self, accepted: usize) {
        let mut state = self.state.write().await;
        state.reject_after = Some(state.submitted.len() + accepted);
    }

    /// Fail every call addressed to `address`
    pub async fn set_unreachable(&self, address: &str) {
        self.state
            .write()
            .await
            .unreachable
            .insert(address.to_string());
    }

    /// Number of `query_data` calls answered
    pub async fn pages_served(&self) -> usize {
        self.state.read().await.pages_served
    }

    /// Tail hash the next status call returns
    pub async fn tail_hash(&self) -> String {
        tail_hash(self.state.read().await.height)
    }

    async fn check_reachable(&self, address: &str) -> Result<()> {
        if self.state.read().await.unreachable.contains(address) {
            return Err(Error::Connection(format!(
                "Cannot connect to server {}, due to mock outage",
                address
            )));
        }
        Ok(())
    }
}

fn tail_hash(height: u64) -> String {
    format!("{:064x}", height)
}

#[async_trait]
impl LedgerClient for MockLedgerClient {
    async fn list_tables(&self, address: &str) -> Result<Vec<String>> {
        self.check_reachable(address).await?;

        let mut names: Vec<String> = self.state.read().await.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn query_data(
        &self,
        address: &str,
        table_name: &str,
        start: usize,
        count: usize,
    ) -> Result<LedgerSnapshot> {
        self.check_reachable(address).await?;

        let mut state = self.state.write().await;
        state.pages_served += 1;

        let table = state.tables.get(table_name).ok_or_else(|| Error::Rpc {
            code: -32602,
            message: format!("unknown table {}", table_name),
        })?;

        let rows = table
            .rows
            .iter()
            .skip(start)
            .take(count)
            .map(|cells| LedgerRow::new(cells.iter().cloned()))
            .collect();

        Ok(LedgerSnapshot {
            headers: table.headers.clone(),
            primary_key_name: table.primary_key_name.clone(),
            rows,
        })
    }

    async fn status(&self, address: &str) -> Result<LedgerStatus> {
        self.check_reachable(address).await?;

        Ok(LedgerStatus {
            tail_hash: tail_hash(self.state.read().await.height),
        })
    }

    async fn submit_transaction(
        &self,
        address: &str,
        transaction: &SignedTransaction,
    ) -> Result<String> {
        self.check_reachable(address).await?;

        let mut state = self.state.write().await;

        if let Some(limit) = state.reject_after {
            if state.submitted.len() >= limit {
                warn!("Mock ledger: rejecting transaction");
                return Err(Error::Transaction {
                    code: 500,
                    message: "Simulated ledger rejection".to_string(),
                });
            }
        }

        for action in &transaction.actions {
            if let Some(table) = state.tables.get_mut(action.table_name()) {
                table.apply(action);
            }
        }

        state.height += 1;
        state.submitted.push(transaction.clone());

        let id = format!("MOCK-TX-{}", state.height);
        debug!(id = %id, actions = transaction.actions.len(), "Mock ledger: accepted");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_core::ColumnData;

    #[tokio::test]
    async fn test_query_pagination() {
        let ledger = MockLedgerClient::new();
        ledger.create_table("t", &["id", "v"], "id").await;
        for i in 0..5 {
            ledger.insert_row("t", vec![i.to_string(), "x".into()]).await;
        }

        let page = ledger.query_data("addr", "t", 3, 10).await.unwrap();
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].cells[0], "3");

        let empty = ledger.query_data("addr", "t", 5, 10).await.unwrap();
        assert!(empty.rows.is_empty());
        assert_eq!(empty.headers, vec!["id", "v"]);
        assert_eq!(ledger.pages_served().await, 2);
    }

    #[test]
    fn test_table_apply() {
        let mut table = MockTable {
            headers: vec!["v".into(), "id".into()],
            primary_key_name: "id".into(),
            rows: vec![vec!["a".into(), "1".into()], vec!["b".into(), "2".into()]],
        };

        table.apply(&DataAction::Delete {
            table_name: "t".into(),
            key: "1".into(),
        });
        table.apply(&DataAction::Insert {
            table_name: "t".into(),
            columns: vec![ColumnData::new("id", "3"), ColumnData::new("v", "c")],
        });
        table.apply(&DataAction::Update {
            table_name: "t".into(),
            key: "2".into(),
            columns: vec![ColumnData::new("v", "B")],
        });

        assert_eq!(
            table.rows,
            vec![
                vec!["B".to_string(), "2".to_string()],
                vec!["c".to_string(), "3".to_string()],
            ]
        );
    }

    #[tokio::test]
    async fn test_source_primary_key_designation() {
        let source = MockSourceStore::new();
        source.set_rows("db", &["id", "v"], vec![]).await;

        let with_key = source.fetch("db", "select", "id").await.unwrap();
        assert_eq!(with_key.primary_key.as_deref(), Some("id"));

        let without_key = source.fetch("db", "select", "uid").await.unwrap();
        assert!(without_key.primary_key.is_none());

        source.fail("db").await;
        assert!(matches!(
            source.fetch("db", "select", "id").await,
            Err(Error::DataAccess(_))
        ));
    }
}

//! Schema-tagged row collections
//!
//! A table is built once per sync cycle from either side and discarded after
//! one reconciliation.

use crate::row::Row;
use crate::types::{LedgerSnapshot, SourceSnapshot};
use crate::{Error, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Table snapshot keyed by primary key
#[derive(Debug, Clone)]
pub struct Table {
    headers: Arc<[String]>,
    rows: BTreeMap<String, Row>,
    primary_key_name: String,
}

impl Table {
    /// Create a table from rows sharing `headers`
    ///
    /// Fails if the primary key is not a header or two rows share a key.
    pub fn new(
        headers: Arc<[String]>,
        rows: impl IntoIterator<Item = Row>,
        primary_key_name: impl Into<String>,
    ) -> Result<Self> {
        let primary_key_name = primary_key_name.into();
        if !headers.iter().any(|h| *h == primary_key_name) {
            return Err(Error::schema(format!(
                "primary key [{}] is not one of [{}]",
                primary_key_name,
                headers.join(",")
            )));
        }

        let mut by_key = BTreeMap::new();
        for row in rows {
            let key = row.key().to_string();
            if by_key.insert(key.clone(), row).is_some() {
                return Err(Error::schema(format!("duplicate primary key value [{}]", key)));
            }
        }

        Ok(Self {
            headers,
            rows: by_key,
            primary_key_name,
        })
    }

    /// Build from a relational result set, which must designate a primary key
    pub fn from_source(snapshot: SourceSnapshot) -> Result<Self> {
        let primary_key_name = snapshot
            .primary_key
            .ok_or_else(|| Error::schema("missing primary key"))?;

        let headers: Arc<[String]> = snapshot.columns.into();
        let key_idx = key_index(&headers, &primary_key_name)?;

        let rows = snapshot
            .rows
            .into_iter()
            .map(|cells| {
                let key = cells.get(key_idx).cloned().unwrap_or_default();
                Row::new(headers.clone(), cells, key)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(headers, rows, primary_key_name)
    }

    /// Build from a (possibly accumulated) ledger query response
    pub fn from_ledger(snapshot: LedgerSnapshot) -> Result<Self> {
        let headers: Arc<[String]> = snapshot.headers.into();
        let key_idx = key_index(&headers, &snapshot.primary_key_name)?;

        let rows = snapshot
            .rows
            .into_iter()
            .map(|row| {
                let key = row.cells.get(key_idx).cloned().ok_or_else(|| {
                    Error::schema(format!(
                        "ledger row has {} cells, primary key is column {}",
                        row.cells.len(),
                        key_idx
                    ))
                })?;
                Row::new(headers.clone(), row.cells, key)
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(headers, rows, snapshot.primary_key_name)
    }

    /// Column names
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Primary-key column name
    pub fn primary_key_name(&self) -> &str {
        &self.primary_key_name
    }

    /// Look up a row by key
    pub fn get(&self, key: &str) -> Option<&Row> {
        self.rows.get(key)
    }

    /// Whether a key is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Iterate rows in key order
    pub fn rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.rows.values()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn key_index(headers: &[String], primary_key_name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == primary_key_name)
        .ok_or_else(|| {
            Error::schema(format!(
                "primary key [{}] is not one of [{}]",
                primary_key_name,
                headers.join(",")
            ))
        })
}

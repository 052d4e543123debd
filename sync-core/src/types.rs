//! Core types shared by the reconciler and the ledger write path
//!
//! Snapshots arrive from two sides with the same logical schema but
//! different representations:
//! - the relational store returns a rectangular result set
//! - the ledger returns a header list plus flattened cell arrays

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single column value carried by an insert or update
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnData {
    /// Column name
    pub name: String,

    /// Cell value rendered as text
    pub data: String,
}

impl ColumnData {
    /// Create new column data
    pub fn new(name: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }
}

/// Write action against a ledger table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DataAction {
    /// Insert a full row
    #[serde(rename_all = "camelCase")]
    Insert {
        /// Ledger table name
        table_name: String,
        /// Every column of the new row
        columns: Vec<ColumnData>,
    },

    /// Update the changed columns of an existing row
    #[serde(rename_all = "camelCase")]
    Update {
        /// Ledger table name
        table_name: String,
        /// Primary key value
        key: String,
        /// Only the columns whose values changed
        columns: Vec<ColumnData>,
    },

    /// Delete a row by primary key
    #[serde(rename_all = "camelCase")]
    Delete {
        /// Ledger table name
        table_name: String,
        /// Primary key value
        key: String,
    },
}

impl DataAction {
    /// Table this action targets
    pub fn table_name(&self) -> &str {
        match self {
            DataAction::Insert { table_name, .. }
            | DataAction::Update { table_name, .. }
            | DataAction::Delete { table_name, .. } => table_name,
        }
    }

    /// Short kind label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            DataAction::Insert { .. } => "insert",
            DataAction::Update { .. } => "update",
            DataAction::Delete { .. } => "delete",
        }
    }
}

impl fmt::Display for DataAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataAction::Insert { table_name, columns } => {
                write!(f, "insert into {} ({} columns)", table_name, columns.len())
            }
            DataAction::Update {
                table_name,
                key,
                columns,
            } => write!(
                f,
                "update {}[{}] ({} columns)",
                table_name,
                key,
                columns.len()
            ),
            DataAction::Delete { table_name, key } => write!(f, "delete {}[{}]", table_name, key),
        }
    }
}

/// Rectangular result set from the relational store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSnapshot {
    /// Column names in result order
    pub columns: Vec<String>,

    /// Cells per row, positionally aligned with `columns`
    pub rows: Vec<Vec<String>>,

    /// Column designated as primary key, if any
    pub primary_key: Option<String>,
}

/// Flattened ledger row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    /// Cells aligned with the response headers
    pub cells: Vec<String>,
}

impl LedgerRow {
    /// Create a ledger row from cells
    pub fn new<I, S>(cells: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ledger query response, one page or an accumulated snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerSnapshot {
    /// Declared headers
    #[serde(default)]
    pub headers: Vec<String>,

    /// Declared primary-key column name
    #[serde(default)]
    pub primary_key_name: String,

    /// Rows of this page
    #[serde(default)]
    pub rows: Vec<LedgerRow>,
}

//! Column-order-independent comparable rows
//!
//! Two rows are equal when their keys match and every header of one side
//! resolves, by name, to the same cell on the other side. The relative
//! column order of the two sides does not matter, so a ledger row and a
//! relational row with permuted columns still compare equal.

use crate::{Error, Result};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Immutable row snapshot
#[derive(Debug, Clone)]
pub struct Row {
    headers: Arc<[String]>,
    cells: Vec<String>,
    key: String,
}

impl Row {
    /// Create a row; headers and cells must have the same length
    pub fn new(headers: Arc<[String]>, cells: Vec<String>, key: impl Into<String>) -> Result<Self> {
        if headers.len() != cells.len() {
            return Err(Error::schema(format!(
                "row has {} cells for {} headers",
                cells.len(),
                headers.len()
            )));
        }

        Ok(Self {
            headers,
            cells,
            key: key.into(),
        })
    }

    /// Primary key value
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Column names in this row's own order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Cells aligned with `headers`
    pub fn cells(&self) -> &[String] {
        &self.cells
    }

    /// Resolve a cell by column name
    pub fn cell(&self, header: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == header)
            .map(|idx| self.cells[idx].as_str())
    }

    /// Iterate (header, cell) pairs
    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.headers
            .iter()
            .zip(self.cells.iter())
            .map(|(h, c)| (h.as_str(), c.as_str()))
    }

    /// Value equality, independent of column order
    pub fn matches(&self, other: &Row) -> bool {
        if self.key != other.key || self.cells.len() != other.cells.len() {
            return false;
        }

        self.columns()
            .all(|(header, cell)| other.cell(header) == Some(cell))
    }
}

impl PartialEq for Row {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Row {}

impl Hash for Row {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Wrapping sum keeps the accumulation independent of column order.
        let columns = self.columns().fold(0u64, |acc, (header, cell)| {
            let mut hasher = DefaultHasher::new();
            header.hash(&mut hasher);
            cell.hash(&mut hasher);
            acc.wrapping_add(hasher.finish())
        });

        self.key.hash(state);
        state.write_u64(columns);
    }
}

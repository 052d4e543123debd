//! Sync Core
//!
//! Reconciliation engine for keeping a ledger table in step with a
//! relational source-of-truth table.
//!
//! # Architecture
//!
//! - **Row / Table**: column-order-independent snapshots keyed by primary key
//! - **Reconciler**: three independent scans producing delete, insert and update actions
//! - **ChangeSet**: fixed action ordering (deletes, inserts, updates) and batching
//! - **Config**: per-target settings merged against defaults once at startup
//! - **Transactions**: Ed25519-signed data transactions anchored to a witness block
//!
//! # Invariants
//!
//! - Schema guard: tables are only diffed when key name and header set match
//! - Minimal updates: an update carries only the columns whose values differ
//! - Idempotence: diffing identical snapshots yields no actions

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod changeset;
pub mod config;
pub mod crypto;
pub mod error;
pub mod reconcile;
pub mod row;
pub mod table;
pub mod transaction;
pub mod types;

// Re-exports
pub use changeset::{ActionCounts, ChangeSet};
pub use config::{AppSettings, SyncOptions, SyncTarget};
pub use crypto::KeyPair;
pub use error::{Error, Result};
pub use row::Row;
pub use table::Table;
pub use transaction::{DataTransaction, SignedTransaction};
pub use types::{ColumnData, DataAction, LedgerRow, LedgerSnapshot, SourceSnapshot};

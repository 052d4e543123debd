//! DB Syncer
//!
//! Periodically replays the difference between relational source tables and
//! their ledger counterparts as signed, batched ledger transactions.
//!
//! # Pipeline
//!
//! Each sync target runs independently through:
//!
//! 1. fetch the relational snapshot
//! 2. fetch the ledger table page by page
//! 3. reconcile (ledger is the base, source is the comparative)
//! 4. batch deletes, inserts and updates
//! 5. acquire the chain tail as witness
//! 6. sign and submit each batch sequentially
//!
//! A failing stage ends the cycle for that target only; every cycle yields a
//! [`CycleReport`].

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod ledger;
pub mod mock;
pub mod scheduler;
pub mod source;
pub mod syncer;
pub mod telemetry;

pub use error::{Error, Result};
pub use ledger::{JsonRpcLedgerClient, LedgerClient, LedgerStatus};
pub use scheduler::Scheduler;
pub use source::{PgSourceStore, SourceStore};
pub use syncer::{CycleOutcome, CycleReport, SyncStage, Syncer};

/// Environment variable naming the settings file
pub const CONFIG_PATH_ENV: &str = "DB_SYNCER_CONFIG";

/// Settings file used when [`CONFIG_PATH_ENV`] is unset
pub const DEFAULT_CONFIG_PATH: &str = "appsettings.toml";

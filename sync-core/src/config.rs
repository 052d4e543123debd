//! Settings and sync target resolution
//!
//! Each configured target is merged field-by-field against the default
//! record once at startup. A field set (and non-empty) on the target wins,
//! otherwise the default applies. The resolved [`SyncTarget`]s are immutable
//! for the lifetime of the process.

use crate::crypto::KeyPair;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable overriding `sync_delay_seconds`
pub const SYNC_DELAY_ENV: &str = "SYNC_DELAY_SECONDS";

/// Settings file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    /// Delay between sync iterations; zero runs a single iteration
    #[serde(default)]
    pub sync_delay_seconds: u64,

    /// Rows requested per ledger query page
    #[serde(default)]
    pub page_size: Option<usize>,

    /// Actions per ledger transaction
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Pause after each transaction submission (milliseconds)
    #[serde(default)]
    pub submit_pacing_ms: Option<u64>,

    /// Per-target overrides
    #[serde(default)]
    pub sync_configurations: Vec<SyncConfiguration>,

    /// Defaults for unset target fields
    #[serde(default)]
    pub sync_configuration_default: SyncConfiguration,
}

/// One (source table, ledger table) pair, possibly partial
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfiguration {
    /// Display name used in logs
    #[serde(default)]
    pub name: Option<String>,

    /// Ledger side
    #[serde(default)]
    pub chain: ChainSettings,

    /// Relational side
    #[serde(default)]
    pub database: DatabaseSettings,
}

/// Ledger connection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Ledger table name
    #[serde(default)]
    pub table_name: Option<String>,

    /// Ledger RPC address
    #[serde(default)]
    pub address: Option<String>,

    /// Hex-encoded Ed25519 seed
    #[serde(default)]
    pub private_key: Option<String>,
}

/// Relational store settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// Connection string
    #[serde(default)]
    pub connection_string: Option<String>,

    /// Primary-key column name
    #[serde(default)]
    pub pk_name: Option<String>,

    /// SQL fragments, joined with single spaces
    #[serde(default)]
    pub sql_select: Option<Vec<String>>,
}

/// Fully resolved sync target
#[derive(Debug, Clone)]
pub struct SyncTarget {
    /// Name used in logs
    pub name: String,

    /// SQL select statement
    pub source_query: String,

    /// Relational connection string
    pub source_connection: String,

    /// Primary-key column in the source result
    pub source_primary_key_name: String,

    /// Ledger RPC address
    pub ledger_address: String,

    /// Ledger table name
    pub ledger_table_name: String,

    /// Key used to sign transactions
    pub signing_key: KeyPair,
}

/// Pipeline tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Rows requested per ledger query page
    pub page_size: usize,

    /// Actions per transaction
    pub batch_size: usize,

    /// Pause after each submission
    pub submit_pacing: Duration,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 10,
            submit_pacing: Duration::from_millis(100),
        }
    }
}

impl AppSettings {
    /// Load from a TOML file, or JSON when the extension is `.json`
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            serde_json::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse settings: {}", e)))
        } else {
            Ok(toml::from_str(&content)?)
        }
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(delay) = std::env::var(SYNC_DELAY_ENV) {
            self.sync_delay_seconds = delay.trim().parse().map_err(|e| {
                Error::Config(format!("{} must be a number of seconds: {}", SYNC_DELAY_ENV, e))
            })?;
        }

        Ok(())
    }

    /// Delay between iterations
    pub fn sync_delay(&self) -> Duration {
        Duration::from_secs(self.sync_delay_seconds)
    }

    /// Pipeline tunables with defaults filled in
    pub fn sync_options(&self) -> SyncOptions {
        let defaults = SyncOptions::default();
        SyncOptions {
            page_size: self.page_size.unwrap_or(defaults.page_size),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            submit_pacing: self
                .submit_pacing_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.submit_pacing),
        }
    }

    /// Merge every target against the defaults
    pub fn resolve_targets(&self) -> Result<Vec<SyncTarget>> {
        self.sync_configurations
            .iter()
            .enumerate()
            .map(|(idx, config)| config.resolve(idx, &self.sync_configuration_default))
            .collect()
    }
}

impl SyncConfiguration {
    /// Resolve against `defaults`; `index` names unnamed targets
    pub fn resolve(&self, index: usize, defaults: &SyncConfiguration) -> Result<SyncTarget> {
        let name = pick(&self.name, &None).unwrap_or_else(|| format!("Sync {}", index));

        let require = |field: &str, value: Option<String>| {
            value.ok_or_else(|| Error::Config(format!("[{}] missing required setting {}", name, field)))
        };

        let sql_select = match &self.database.sql_select {
            Some(parts) if parts.iter().any(|p| !p.trim().is_empty()) => Some(parts),
            _ => defaults.database.sql_select.as_ref(),
        };
        let source_query = sql_select
            .map(|parts| parts.join(" "))
            .filter(|q| !q.trim().is_empty());

        let private_key = require(
            "chain.private_key",
            pick(&self.chain.private_key, &defaults.chain.private_key),
        )?;
        let signing_key = KeyPair::from_hex(&private_key)
            .map_err(|e| Error::Config(format!("[{}] invalid chain.private_key: {}", name, e)))?;

        Ok(SyncTarget {
            source_query: require("database.sql_select", source_query)?,
            source_connection: require(
                "database.connection_string",
                pick(&self.database.connection_string, &defaults.database.connection_string),
            )?,
            source_primary_key_name: require(
                "database.pk_name",
                pick(&self.database.pk_name, &defaults.database.pk_name),
            )?,
            ledger_address: require(
                "chain.address",
                pick(&self.chain.address, &defaults.chain.address),
            )?,
            ledger_table_name: require(
                "chain.table_name",
                pick(&self.chain.table_name, &defaults.chain.table_name),
            )?,
            signing_key,
            name,
        })
    }
}

fn pick(value: &Option<String>, default: &Option<String>) -> Option<String> {
    let non_empty = |v: &&String| !v.trim().is_empty();
    value
        .as_ref()
        .filter(non_empty)
        .or_else(|| default.as_ref().filter(non_empty))
        .cloned()
}

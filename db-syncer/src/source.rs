//! Relational source of truth
//!
//! The source store runs the configured select statement and returns a
//! rectangular, text-rendered result set. SQL `NULL` renders as the empty
//! string so that it compares equal to an empty ledger cell.

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column, Executor, Row, Statement, TypeInfo, ValueRef};
use std::collections::HashMap;
use std::time::Duration;
use sync_core::SourceSnapshot;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Query capability against the relational store
#[async_trait]
pub trait SourceStore: Send + Sync {
    /// Run `query` on `connection` and designate `primary_key` when the
    /// result carries that column
    async fn fetch(
        &self,
        connection: &str,
        query: &str,
        primary_key: &str,
    ) -> Result<SourceSnapshot>;
}

/// Connections kept per connection string
pub const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// PostgreSQL source store with one lazily created pool per connection string
#[derive(Debug)]
pub struct PgSourceStore {
    max_connections: u32,
    acquire_timeout: Duration,
    pools: Mutex<HashMap<String, PgPool>>,
}

impl Default for PgSourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PgSourceStore {
    /// Create new store
    pub fn new() -> Self {
        Self::with_max_connections(DEFAULT_MAX_CONNECTIONS)
    }

    /// Create a store whose pools hold at most `max_connections`
    pub fn with_max_connections(max_connections: u32) -> Self {
        Self {
            max_connections: max_connections.max(1),
            acquire_timeout: Duration::from_secs(30),
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Pool for `connection`, created on first use
    async fn pool(&self, connection: &str) -> Result<PgPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(connection) {
            return Ok(pool.clone());
        }

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy(connection)?;

        info!(max_connections = self.max_connections, "Source connection pool created");

        pools.insert(connection.to_string(), pool.clone());
        Ok(pool)
    }

    /// Number of pools created so far
    pub async fn pool_count(&self) -> usize {
        self.pools.lock().await.len()
    }
}

#[async_trait]
impl SourceStore for PgSourceStore {
    async fn fetch(
        &self,
        connection: &str,
        query: &str,
        primary_key: &str,
    ) -> Result<SourceSnapshot> {
        let pool = self.pool(connection).await?;
        let mut conn = pool.acquire().await?;

        let statement = (&mut *conn).prepare(query).await?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let rows = statement.query().fetch_all(&mut *conn).await?;
        let cells = rows
            .iter()
            .map(|row| (0..columns.len()).map(|idx| cell_text(row, idx)).collect())
            .collect::<Result<Vec<Vec<String>>>>()?;

        debug!(
            columns = columns.len(),
            rows = cells.len(),
            "Fetched source snapshot"
        );

        Ok(SourceSnapshot {
            primary_key: columns
                .iter()
                .any(|c| c == primary_key)
                .then(|| primary_key.to_string()),
            columns,
            rows: cells,
        })
    }
}

/// Render one cell as text according to its column type
fn cell_text(row: &PgRow, idx: usize) -> Result<String> {
    let type_name = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(String::new());
        }
        raw.type_info().name().to_string()
    };

    let text = match type_name.as_str() {
        "BOOL" => row.try_get::<bool, _>(idx)?.to_string(),
        "INT2" => row.try_get::<i16, _>(idx)?.to_string(),
        "INT4" => row.try_get::<i32, _>(idx)?.to_string(),
        "INT8" => row.try_get::<i64, _>(idx)?.to_string(),
        "FLOAT4" => row.try_get::<f32, _>(idx)?.to_string(),
        "FLOAT8" => row.try_get::<f64, _>(idx)?.to_string(),
        "NUMERIC" => row.try_get::<Decimal, _>(idx)?.to_string(),
        "UUID" => row.try_get::<Uuid, _>(idx)?.to_string(),
        "DATE" => row.try_get::<NaiveDate, _>(idx)?.to_string(),
        "TIME" => row.try_get::<NaiveTime, _>(idx)?.to_string(),
        "TIMESTAMP" => row.try_get::<NaiveDateTime, _>(idx)?.to_string(),
        "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(idx)?.to_rfc3339(),
        "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
        other => row.try_get::<String, _>(idx).map_err(|e| {
            Error::DataAccess(format!(
                "column {} has unsupported type {}: {}",
                idx, other, e
            ))
        })?,
    };

    Ok(text)
}

//! # Coinpipe Warehouse
//!
//! DuckDB staging table for normalized listings.
//!
//! ## Overview
//!
//! The staging table `crypto_prices_staging` mirrors the 17-column listing
//! schema plus a `loaded_at` column. Each load replaces the full table
//! contents inside one transaction, so readers see either the previous load
//! or the new one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coinpipe_core::ResultTable;
//! use coinpipe_warehouse::Warehouse;
//!
//! let warehouse = Warehouse::open_default()?;
//! let report = warehouse.load_staging(&ResultTable::default())?;
//! println!("{} rows staged", report.rows_loaded);
//! # Ok::<(), coinpipe_warehouse::WarehouseError>(())
//! ```
//!
//! ## Security
//!
//! Row values are always bound as query parameters, never interpolated.

pub mod duckdb;
pub mod migrations;
pub mod task;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use ::duckdb::{Connection, ToSql};
use coinpipe_core::ResultTable;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

pub use self::duckdb::{DuckDbConnectionManager, PooledConnection};
pub use migrations::STAGING_TABLE;
pub use task::{LoadError, StagingLoadTask, STAGING_TASK_NAME};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Location of the warehouse database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    /// Root directory for coinpipe data.
    pub coinpipe_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self::at_home(resolve_coinpipe_home())
    }
}

impl WarehouseConfig {
    /// Place the database file at `<home>/warehouse.duckdb`.
    pub fn at_home(coinpipe_home: impl Into<PathBuf>) -> Self {
        let coinpipe_home = coinpipe_home.into();
        let db_path = coinpipe_home.join("warehouse.duckdb");
        Self {
            coinpipe_home,
            db_path,
        }
    }
}

/// Outcome of one staging load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub table: &'static str,
    pub rows_loaded: usize,
    pub rows_replaced: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retrieved_timestamp: Option<String>,
}

/// Selected columns of a staged row, as stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagedListing {
    pub id: i64,
    pub symbol: String,
    pub cmc_rank: i64,
    pub price_usd: f64,
    pub max_supply: Option<f64>,
    pub last_updated: String,
    pub retrieved_timestamp: String,
}

/// DuckDB-backed staging store.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) the database and apply migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::new(config.db_path.clone());
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        debug!(db_path = %self.db_path().display(), "warehouse migrations applied");
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    /// Replace the staging table contents with `table`.
    ///
    /// The delete and every insert share one transaction; on any failure the
    /// previous contents are kept.
    pub fn load_staging(&self, table: &ResultTable) -> Result<LoadReport, WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            let replaced = connection.execute("DELETE FROM crypto_prices_staging", [])?;

            let mut statement = connection.prepare(
                "INSERT INTO crypto_prices_staging \
                 (id, name, symbol, slug, cmc_rank, num_market_pairs, circulating_supply, \
                  total_supply, max_supply, price_usd, volume_24h_usd, percent_change_1h, \
                  percent_change_24h, percent_change_7d, market_cap_usd, last_updated, \
                  retrieved_timestamp, loaded_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CAST(? AS TIMESTAMP), ?, CURRENT_TIMESTAMP)",
            )?;

            for row in table.rows() {
                let last_updated = timestamp_literal(&row.last_updated.format_rfc3339());
                let params: [&dyn ToSql; 17] = [
                    &row.id,
                    &row.name,
                    &row.symbol,
                    &row.slug,
                    &row.cmc_rank,
                    &row.num_market_pairs,
                    &row.circulating_supply,
                    &row.total_supply,
                    &row.max_supply,
                    &row.price_usd,
                    &row.volume_24h_usd,
                    &row.percent_change_1h,
                    &row.percent_change_24h,
                    &row.percent_change_7d,
                    &row.market_cap_usd,
                    &last_updated,
                    &row.retrieved_timestamp,
                ];
                statement.execute(params.as_slice())?;
            }

            Ok(replaced)
        })();

        let rows_replaced = finalize_transaction(&connection, result)?;
        let report = LoadReport {
            table: STAGING_TABLE,
            rows_loaded: table.len(),
            rows_replaced,
            retrieved_timestamp: table.retrieved_timestamp().map(str::to_owned),
        };
        info!(
            table = STAGING_TABLE,
            rows = report.rows_loaded,
            replaced = report.rows_replaced,
            "staging table loaded"
        );
        Ok(report)
    }

    pub fn staging_row_count(&self) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count = connection.query_row(
            "SELECT COUNT(*) FROM crypto_prices_staging",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Staged rows ordered by rank, then id.
    pub fn staged_listings(&self) -> Result<Vec<StagedListing>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT id, symbol, cmc_rank, price_usd, max_supply, \
                    CAST(last_updated AS VARCHAR), retrieved_timestamp \
             FROM crypto_prices_staging ORDER BY cmc_rank, id",
        )?;

        let rows = statement.query_map([], |row| {
            Ok(StagedListing {
                id: row.get(0)?,
                symbol: row.get(1)?,
                cmc_rank: row.get(2)?,
                price_usd: row.get(3)?,
                max_supply: row.get(4)?,
                last_updated: row.get(5)?,
                retrieved_timestamp: row.get(6)?,
            })
        })?;

        let mut listings = Vec::new();
        for row in rows {
            listings.push(row?);
        }
        Ok(listings)
    }
}

fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

// DuckDB TIMESTAMP literal: `2025-01-01T00:00:00Z` becomes `2025-01-01 00:00:00`.
fn timestamp_literal(rfc3339: &str) -> String {
    rfc3339.trim_end_matches('Z').replacen('T', " ", 1)
}

/// `COINPIPE_HOME`, else `$HOME/.coinpipe`, else `.coinpipe`.
fn resolve_coinpipe_home() -> PathBuf {
    if let Some(path) = env::var_os("COINPIPE_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".coinpipe");
    }

    PathBuf::from(".coinpipe")
}

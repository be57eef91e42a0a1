//! Append-only history store for spot status and pricing.
//!
//! Both tables are insert-only; "current value" for a spot is always the most
//! recent record by timestamp. Readers therefore always see a consistent
//! prior record even while a write is in flight.

use rusqlite::{Connection, params};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusRecord {
    pub spot_name: String,
    pub occupied: bool,
    pub timestamp: SystemTime,
    pub cumulative_occupied_hours: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PriceRecord {
    pub spot_name: String,
    pub price: f64,
    pub timestamp: SystemTime,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("timestamp before unix epoch")]
    TimestampRange,
}

/// Persistence gateway consumed by the duration ledger and the pricing
/// engine. Accessed only from the detection loop.
pub trait LotStore {
    fn append_status(&mut self, record: &StatusRecord) -> Result<(), StoreError>;
    fn latest_status(&mut self, spot_name: &str) -> Result<Option<StatusRecord>, StoreError>;
    fn append_price(&mut self, record: &PriceRecord) -> Result<(), StoreError>;
    fn latest_price(&mut self, spot_name: &str) -> Result<Option<PriceRecord>, StoreError>;
}

pub struct SqliteLotStore {
    conn: Connection,
}

impl SqliteLotStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS spot_status (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              spot_name TEXT NOT NULL,
              occupied INTEGER NOT NULL,
              timestamp REAL NOT NULL,
              cumulative_occupied_hours REAL NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS spot_pricing (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              spot_name TEXT NOT NULL,
              price REAL NOT NULL,
              timestamp REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_status_spot_ts
              ON spot_status(spot_name, timestamp);
            CREATE INDEX IF NOT EXISTS idx_pricing_spot_ts
              ON spot_pricing(spot_name, timestamp);
            "#,
        )?;
        Ok(())
    }
}

impl LotStore for SqliteLotStore {
    fn append_status(&mut self, record: &StatusRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO spot_status (spot_name, occupied, timestamp, cumulative_occupied_hours)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.spot_name,
                record.occupied,
                to_unix_seconds(record.timestamp)?,
                record.cumulative_occupied_hours,
            ],
        )?;
        Ok(())
    }

    fn latest_status(&mut self, spot_name: &str) -> Result<Option<StatusRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT occupied, timestamp, cumulative_occupied_hours
             FROM spot_status WHERE spot_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![spot_name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(StatusRecord {
                spot_name: spot_name.to_string(),
                occupied: row.get(0)?,
                timestamp: from_unix_seconds(row.get(1)?),
                cumulative_occupied_hours: row.get(2)?,
            }))
        } else {
            Ok(None)
        }
    }

    fn append_price(&mut self, record: &PriceRecord) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO spot_pricing (spot_name, price, timestamp) VALUES (?1, ?2, ?3)",
            params![
                record.spot_name,
                record.price,
                to_unix_seconds(record.timestamp)?,
            ],
        )?;
        Ok(())
    }

    fn latest_price(&mut self, spot_name: &str) -> Result<Option<PriceRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT price, timestamp FROM spot_pricing WHERE spot_name = ?1
             ORDER BY timestamp DESC, id DESC LIMIT 1",
        )?;
        let mut rows = stmt.query(params![spot_name])?;
        if let Some(row) = rows.next()? {
            Ok(Some(PriceRecord {
                spot_name: spot_name.to_string(),
                price: row.get(0)?,
                timestamp: from_unix_seconds(row.get(1)?),
            }))
        } else {
            Ok(None)
        }
    }
}

fn to_unix_seconds(timestamp: SystemTime) -> Result<f64, StoreError> {
    timestamp
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs_f64())
        .map_err(|_| StoreError::TimestampRange)
}

fn from_unix_seconds(seconds: f64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs_f64(seconds)
}

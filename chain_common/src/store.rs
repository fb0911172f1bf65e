//! Append-only SQLite store for enriched snapshots.
//!
//! Every cycle appends its batch in one transaction; rows are never updated or
//! deleted. The latest snapshot is whatever rows carry the maximum ingestion
//! timestamp, so timestamps are stored as fixed-width UTC text that sorts
//! chronologically.

use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, Utc};
use log::{debug, info};
use rusqlite::{Connection, params};

use crate::error::ChainError;
use crate::model::{ContractType, EnrichedQuote, GreeksResult, OptionQuote, Snapshot};
use crate::result::Result;

/// Table holding every persisted row.
pub const TABLE: &str = "option_greeks_realtime";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";
const TIMESTAMP_PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Current time truncated to the precision the store keeps.
pub fn ingestion_timestamp(now: DateTime<Utc>) -> DateTime<Utc> {
    now.trunc_subsecs(6)
}

/// Encode a timestamp as stored, e.g. `2024-12-20T10:00:00.000000Z`.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Decode a stored timestamp.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_PARSE_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| ChainError::Parse(format!("bad timestamp {:?}: {}", raw, e)))
}

/// Row as read back from SQLite, before domain conversion.
struct StoredRow {
    contract_type: String,
    strike: f64,
    premium: f64,
    open_interest: i64,
    underlying: f64,
    expiry: String,
    time_to_expiry: f64,
    implied_vol: Option<f64>,
    delta: f64,
    gamma: f64,
    ingestion_timestamp: String,
}

impl StoredRow {
    fn into_enriched(self) -> Result<EnrichedQuote> {
        let contract_type: ContractType = self
            .contract_type
            .parse()
            .map_err(|_| ChainError::Parse(format!("bad contract type {:?}", self.contract_type)))?;
        let expiry = NaiveDate::parse_from_str(&self.expiry, DATE_FORMAT)
            .map_err(|e| ChainError::Parse(format!("bad expiry {:?}: {}", self.expiry, e)))?;

        Ok(EnrichedQuote {
            quote: OptionQuote {
                contract_type,
                strike: self.strike,
                premium: self.premium,
                open_interest: u64::try_from(self.open_interest).unwrap_or(0),
                underlying: self.underlying,
                expiry,
                time_to_expiry: self.time_to_expiry,
            },
            greeks: GreeksResult {
                implied_vol: self.implied_vol,
                delta: self.delta,
                gamma: self.gamma,
            },
            ingested_at: parse_timestamp(&self.ingestion_timestamp)?,
        })
    }
}

/// Durable snapshot store backed by a single SQLite connection.
pub struct SnapshotStore {
    conn: Connection,
}

impl SnapshotStore {
    /// Open (or create) the database file at `path` and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        info!("Snapshot store opened at {}", path.as_ref().display());
        Self::with_connection(conn)
    }

    /// Store over a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE} (
                contract_type TEXT NOT NULL,
                strike REAL NOT NULL,
                premium REAL NOT NULL,
                open_interest INTEGER NOT NULL,
                underlying REAL NOT NULL,
                expiry TEXT NOT NULL,
                time_to_expiry REAL NOT NULL,
                flag TEXT NOT NULL,
                implied_vol REAL,
                delta REAL NOT NULL,
                gamma REAL NOT NULL,
                ingestion_timestamp TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{TABLE}_ts ON {TABLE} (ingestion_timestamp);"
        ))?;
        Ok(Self { conn })
    }

    /// Append all rows in one transaction and return how many were written.
    pub fn persist(&mut self, rows: &[EnrichedQuote]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {TABLE} (contract_type, strike, premium, open_interest, underlying,
                    expiry, time_to_expiry, flag, implied_vol, delta, gamma, ingestion_timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ))?;
            for row in rows {
                let q = &row.quote;
                let open_interest = i64::try_from(q.open_interest).unwrap_or(i64::MAX);
                stmt.execute(params![
                    q.contract_type.to_string(),
                    q.strike,
                    q.premium,
                    open_interest,
                    q.underlying,
                    q.expiry.format(DATE_FORMAT).to_string(),
                    q.time_to_expiry,
                    q.contract_type.flag(),
                    row.greeks.implied_vol,
                    row.greeks.delta,
                    row.greeks.gamma,
                    format_timestamp(&row.ingested_at),
                ])?;
            }
        }
        tx.commit()?;
        debug!("Appended {} rows to {}", rows.len(), TABLE);
        Ok(rows.len())
    }

    /// Total number of rows ever appended.
    pub fn row_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {TABLE}"), [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Rows carrying the maximum ingestion timestamp, or `None` for an empty store.
    pub fn latest_snapshot(&self) -> Result<Option<Snapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT contract_type, strike, premium, open_interest, underlying, expiry,
                    time_to_expiry, implied_vol, delta, gamma, ingestion_timestamp
             FROM {TABLE}
             WHERE ingestion_timestamp = (SELECT MAX(ingestion_timestamp) FROM {TABLE})
             ORDER BY strike, contract_type"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok(StoredRow {
                contract_type: row.get(0)?,
                strike: row.get(1)?,
                premium: row.get(2)?,
                open_interest: row.get(3)?,
                underlying: row.get(4)?,
                expiry: row.get(5)?,
                time_to_expiry: row.get(6)?,
                implied_vol: row.get(7)?,
                delta: row.get(8)?,
                gamma: row.get(9)?,
                ingestion_timestamp: row.get(10)?,
            })
        })?;

        let mut quotes = Vec::new();
        for row in rows {
            quotes.push(row?.into_enriched()?);
        }
        Snapshot::from_quotes(quotes)
    }
}

//! SQLite price store and relative-strength sink.

use crate::domain::error::StrengthError;
use crate::domain::price::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use crate::ports::sink_port::{RelativeStrengthSink, RsRow};
use chrono::NaiveDate;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_err(e: r2d2::Error) -> StrengthError {
    StrengthError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> StrengthError {
    StrengthError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_date(idx: usize, text: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(text, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, StrengthError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| StrengthError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;
        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, StrengthError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(pool_err)?;
        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, StrengthError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), StrengthError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS price_data (
                    symbol TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    adjusted_close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    PRIMARY KEY (symbol, date)
                );
                CREATE INDEX IF NOT EXISTS idx_price_data_date ON price_data(date);
                CREATE TABLE IF NOT EXISTS relative_strength (
                    date TEXT NOT NULL,
                    symbol TEXT NOT NULL,
                    benchmark_symbol TEXT NOT NULL,
                    relative_strength REAL NOT NULL,
                    PRIMARY KEY (date, symbol, benchmark_symbol)
                );",
            )
            .map_err(query_err)
    }

    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<(), StrengthError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO price_data
                 (symbol, date, open, high, low, close, adjusted_close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.adjusted_close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }
        tx.commit().map_err(query_err)
    }

    /// Stored RS rows for one symbol against one benchmark, by date.
    pub fn relative_strength_rows(
        &self,
        symbol: &str,
        benchmark_symbol: &str,
    ) -> Result<Vec<RsRow>, StrengthError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT date, symbol, benchmark_symbol, relative_strength
                 FROM relative_strength
                 WHERE symbol = ?1 AND benchmark_symbol = ?2
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![symbol, benchmark_symbol], |row| {
                let date: String = row.get(0)?;
                Ok(RsRow {
                    date: parse_date(0, &date)?,
                    symbol: row.get(1)?,
                    benchmark_symbol: row.get(2)?,
                    relative_strength: row.get(3)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }
}

impl PriceDataPort for SqliteAdapter {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, StrengthError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, adjusted_close, volume
                 FROM price_data
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(
                params![
                    symbol,
                    start_date.format(DATE_FORMAT).to_string(),
                    end_date.format(DATE_FORMAT).to_string()
                ],
                |row| {
                    let date: String = row.get(1)?;
                    Ok(PriceBar {
                        symbol: row.get(0)?,
                        date: parse_date(1, &date)?,
                        open: row.get(2)?,
                        high: row.get(3)?,
                        low: row.get(4)?,
                        close: row.get(5)?,
                        adjusted_close: row.get(6)?,
                        volume: row.get(7)?,
                    })
                },
            )
            .map_err(query_err)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_symbols(&self) -> Result<Vec<String>, StrengthError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM price_data ORDER BY symbol")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrengthError> {
        let (min, max, count): (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM price_data WHERE symbol = ?1",
                params![symbol],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => {
                let first = parse_date(0, &min).map_err(query_err)?;
                let last = parse_date(1, &max).map_err(query_err)?;
                Ok(Some((first, last, count as usize)))
            }
            _ => Ok(None),
        }
    }
}

impl RelativeStrengthSink for SqliteAdapter {
    fn upsert(&self, rows: &[RsRow]) -> Result<usize, StrengthError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT INTO relative_strength (date, symbol, benchmark_symbol, relative_strength)
                     VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT (date, symbol, benchmark_symbol)
                     DO UPDATE SET relative_strength = excluded.relative_strength",
                )
                .map_err(query_err)?;
            for row in rows {
                stmt.execute(params![
                    row.date.format(DATE_FORMAT).to_string(),
                    row.symbol,
                    row.benchmark_symbol,
                    row.relative_strength
                ])
                .map_err(query_err)?;
            }
        }
        tx.commit().map_err(query_err)?;
        Ok(rows.len())
    }
}

//! Durable sink for computed relative-strength rows.

use crate::domain::error::StrengthError;
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RsRow {
    pub date: NaiveDate,
    pub symbol: String,
    pub benchmark_symbol: String,
    pub relative_strength: f64,
}

/// Writes must be idempotent upserts keyed by
/// `(date, symbol, benchmark_symbol)`: rewriting an overlapping range
/// replaces values instead of failing.
pub trait RelativeStrengthSink {
    /// Returns the number of rows written.
    fn upsert(&self, rows: &[RsRow]) -> Result<usize, StrengthError>;
}

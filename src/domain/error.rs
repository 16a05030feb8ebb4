//! Domain error types.
//!
//! Undefined numeric results (zero variance, zero volume average) are not
//! errors: they surface as `None` in the affected column.

use chrono::NaiveDate;

/// Top-level error type for sectorstrength.
#[derive(Debug, thiserror::Error)]
pub enum StrengthError {
    #[error("no data for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    #[error("unknown normalization method: {method}")]
    UnknownMethod { method: String },

    #[error("invalid date range: {start} to {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("rebalance on {date} failed: {reason}")]
    RebalanceFailed { date: NaiveDate, reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("database query error: {reason}")]
    DatabaseQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StrengthError {
    pub fn data_unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        StrengthError::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    /// Fails with `InvalidDateRange` unless `start < end`.
    pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<(), Self> {
        if end <= start {
            return Err(StrengthError::InvalidDateRange { start, end });
        }
        Ok(())
    }
}

impl From<&StrengthError> for std::process::ExitCode {
    fn from(err: &StrengthError) -> Self {
        let code: u8 = match err {
            StrengthError::Io(_) | StrengthError::Csv(_) => 1,
            StrengthError::ConfigParse { .. }
            | StrengthError::ConfigMissing { .. }
            | StrengthError::ConfigInvalid { .. } => 2,
            StrengthError::Database { .. } | StrengthError::DatabaseQuery { .. } => 3,
            StrengthError::UnknownMethod { .. } | StrengthError::InvalidDateRange { .. } => 4,
            StrengthError::DataUnavailable { .. } => 5,
            StrengthError::RebalanceFailed { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

//! Price data access port.

use crate::domain::error::StrengthError;
use crate::domain::price::PriceBar;
use chrono::NaiveDate;

/// Read-only source of daily bars.
///
/// `get_series` returns bars ordered by date. An empty vector means "no
/// data" and is not an error; errors are reserved for the backing store
/// itself failing.
pub trait PriceDataPort {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, StrengthError>;

    fn list_symbols(&self) -> Result<Vec<String>, StrengthError>;

    /// First date, last date and bar count for a symbol, if it has any bars.
    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrengthError>;
}

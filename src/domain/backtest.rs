//! Shared backtest configuration, result and trading calendar.

use chrono::{Datelike, NaiveDate, Weekday};

use super::error::StrengthError;
use super::metrics::Performance;
use super::portfolio::PortfolioValueSample;
use super::position::TradeRecord;
use super::price::PriceBar;

pub const DEFAULT_INITIAL_CAPITAL: f64 = 10_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub risk_free_rate: f64,
}

impl BacktestConfig {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestConfig {
            start_date,
            end_date,
            initial_capital: DEFAULT_INITIAL_CAPITAL,
            risk_free_rate: 0.0,
        }
    }

    /// Checked before any data is fetched.
    pub fn validate(&self) -> Result<(), StrengthError> {
        StrengthError::check_range(self.start_date, self.end_date)?;
        if !(self.initial_capital.is_finite() && self.initial_capital > 0.0) {
            return Err(StrengthError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_capital".into(),
                reason: format!("must be positive, got {}", self.initial_capital),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub performance: Performance,
    pub trades: Vec<TradeRecord>,
    pub values: Vec<PortfolioValueSample>,
    /// Benchmark buy-and-hold over the run window, when it has data.
    pub benchmark_return_pct: Option<f64>,
    /// The instrument's own buy-and-hold (single-instrument runs only).
    pub buy_and_hold_return_pct: Option<f64>,
}

impl BacktestResult {
    pub fn initial_capital(&self) -> f64 {
        self.performance.initial_capital
    }

    pub fn final_value(&self) -> f64 {
        self.performance.final_value
    }

    pub fn total_return_pct(&self) -> f64 {
        self.performance.total_return_pct
    }

    pub fn annualized_return_pct(&self) -> f64 {
        self.performance.annualized_return_pct
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.performance.max_drawdown_pct
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

/// Percentage change from the first to the last adjusted close.
pub fn buy_and_hold_pct(bars: &[PriceBar]) -> Option<f64> {
    let first = bars.first()?.adjusted_close;
    let last = bars.last()?.adjusted_close;
    if first <= 0.0 {
        return None;
    }
    Some((last / first - 1.0) * 100.0)
}

/// Monday to Friday dates in `[start, end]`. Holidays are not known here;
/// days without bars are filtered by the simulators.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start
        .iter_days()
        .take_while(move |d| *d <= end)
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

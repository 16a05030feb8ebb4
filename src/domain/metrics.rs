//! Performance analysis of a finished simulation.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use super::error::StrengthError;
use super::portfolio::PortfolioValueSample;
use super::position::{TradeAction, TradeRecord};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Performance {
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    /// Always <= 0.
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub trade_count: usize,
    pub round_trips: usize,
    /// Profitable trips among those the strategy itself closed.
    pub winning_trips: usize,
    /// `winning_trips` over trips closed by a sell signal or a rebalance.
    /// Forced end-of-period closes are left out; 0.0 when none remain.
    pub win_rate: f64,
    pub signal_exits: usize,
    pub rebalance_exits: usize,
    pub end_of_period_exits: usize,
}

impl Performance {
    /// Fails with `InvalidDateRange` when `end_date <= start_date`. The
    /// final value is the last sample, or the initial capital if no day was
    /// processed.
    pub fn analyze(
        initial_capital: f64,
        values: &[PortfolioValueSample],
        trades: &[TradeRecord],
        start_date: NaiveDate,
        end_date: NaiveDate,
        risk_free_rate: f64,
    ) -> Result<Self, StrengthError> {
        let final_value = values.last().map(|s| s.value).unwrap_or(initial_capital);
        let annualized_return_pct =
            annualized_return_pct(initial_capital, final_value, start_date, end_date)?;

        let trips = round_trips(trades);
        let closed: Vec<&RoundTrip> = trips
            .iter()
            .filter(|t| t.exit_action != TradeAction::EndOfPeriodSell)
            .collect();
        let winning_trips = closed.iter().filter(|t| t.pnl() > 0.0).count();
        let win_rate = if closed.is_empty() {
            0.0
        } else {
            winning_trips as f64 / closed.len() as f64
        };
        let exits = |action: TradeAction| trades.iter().filter(|t| t.action == action).count();

        Ok(Performance {
            initial_capital,
            final_value,
            total_return_pct: total_return_pct(initial_capital, final_value),
            annualized_return_pct,
            max_drawdown_pct: max_drawdown_pct(values),
            sharpe_ratio: sharpe_ratio(values, risk_free_rate),
            trade_count: trades.len(),
            round_trips: trips.len(),
            winning_trips,
            win_rate,
            signal_exits: exits(TradeAction::Sell),
            rebalance_exits: exits(TradeAction::RebalanceSell),
            end_of_period_exits: exits(TradeAction::EndOfPeriodSell),
        })
    }
}

pub fn total_return_pct(initial_capital: f64, final_value: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_value / initial_capital - 1.0) * 100.0
}

/// Compounded over calendar days between the two dates.
pub fn annualized_return_pct(
    initial_capital: f64,
    final_value: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<f64, StrengthError> {
    StrengthError::check_range(start_date, end_date)?;
    if initial_capital <= 0.0 {
        return Ok(0.0);
    }
    let days = (end_date - start_date).num_days() as f64;
    let growth = final_value / initial_capital;
    if growth <= 0.0 {
        return Ok(-100.0);
    }
    Ok((growth.powf(DAYS_PER_YEAR / days) - 1.0) * 100.0)
}

/// Worst peak-to-trough decline as a non-positive percentage.
pub fn max_drawdown_pct(values: &[PortfolioValueSample]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for sample in values {
        peak = peak.max(sample.value);
        if peak > 0.0 {
            worst = worst.min((sample.value - peak) / peak * 100.0);
        }
    }
    worst
}

/// Annualized Sharpe ratio of daily value changes.
fn sharpe_ratio(values: &[PortfolioValueSample], risk_free_rate: f64) -> f64 {
    let returns: Vec<f64> = values
        .windows(2)
        .filter(|w| w[0].value > 0.0)
        .map(|w| w[1].value / w[0].value - 1.0)
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / TRADING_DAYS_PER_YEAR;
    (mean - daily_rf) / stddev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// A BUY matched with the next SELL of the same symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundTrip {
    pub symbol: String,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_value: f64,
    pub exit_value: f64,
    pub exit_action: TradeAction,
}

impl RoundTrip {
    pub fn pnl(&self) -> f64 {
        self.exit_value - self.entry_value
    }
}

/// Pairs buys and sells per symbol in ledger order. Buys still open at
/// the end of the ledger are not counted.
pub fn round_trips(trades: &[TradeRecord]) -> Vec<RoundTrip> {
    let mut open: HashMap<&str, VecDeque<&TradeRecord>> = HashMap::new();
    let mut trips = Vec::new();

    for trade in trades {
        if trade.action == TradeAction::Buy {
            open.entry(trade.symbol.as_str()).or_default().push_back(trade);
            continue;
        }
        if let Some(entry) = open.get_mut(trade.symbol.as_str()).and_then(VecDeque::pop_front) {
            trips.push(RoundTrip {
                symbol: trade.symbol.clone(),
                entry_date: entry.date,
                exit_date: trade.date,
                entry_value: entry.value,
                exit_value: trade.value,
                exit_action: trade.action,
            });
        }
    }
    trips
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn samples(values: &[f64]) -> Vec<PortfolioValueSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| PortfolioValueSample {
                date: d(2024, 1, 1) + chrono::Duration::days(i as i64),
                value,
            })
            .collect()
    }

    fn trade(day: u32, symbol: &str, action: TradeAction, value: f64) -> TradeRecord {
        TradeRecord {
            date: d(2024, 1, day),
            symbol: symbol.into(),
            action,
            shares: 1.0,
            price: value,
            value,
        }
    }

    #[test]
    fn one_round_trip_twenty_percent() {
        let trades = vec![
            trade(2, "XLK", TradeAction::Buy, 10_000.0),
            trade(20, "XLK", TradeAction::Sell, 12_000.0),
        ];
        let values = samples(&[10_000.0, 11_000.0, 12_000.0]);
        let perf =
            Performance::analyze(10_000.0, &values, &trades, d(2024, 1, 1), d(2024, 12, 31), 0.0)
                .unwrap();

        assert_relative_eq!(perf.total_return_pct, 20.0, epsilon = 1e-9);
        assert_eq!(perf.trade_count, 2);
        assert_eq!(perf.round_trips, 1);
        assert_eq!(perf.winning_trips, 1);
        assert_relative_eq!(perf.win_rate, 1.0);
        assert_eq!(perf.signal_exits, 1);
        assert_eq!(perf.end_of_period_exits, 0);
    }

    #[test]
    fn annualized_one_year_equals_total() {
        let ann = annualized_return_pct(100.0, 110.0, d(2023, 1, 1), d(2024, 1, 1)).unwrap();
        assert_relative_eq!(ann, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn annualized_half_year_compounds() {
        let start = d(2023, 1, 1);
        let end = start + chrono::Duration::days(365 / 5);
        let ann = annualized_return_pct(100.0, 101.0, start, end).unwrap();
        assert_relative_eq!(ann, (1.01_f64.powi(5) - 1.0) * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn annualized_rejects_empty_range() {
        let err = annualized_return_pct(100.0, 110.0, d(2024, 1, 1), d(2024, 1, 1)).unwrap_err();
        assert!(matches!(err, StrengthError::InvalidDateRange { .. }));
        assert!(
            Performance::analyze(1.0, &[], &[], d(2024, 2, 1), d(2024, 1, 1), 0.0).is_err()
        );
    }

    #[test]
    fn final_value_defaults_to_capital() {
        let perf = Performance::analyze(500.0, &[], &[], d(2024, 1, 1), d(2024, 2, 1), 0.0).unwrap();
        assert_relative_eq!(perf.final_value, 500.0);
        assert_relative_eq!(perf.total_return_pct, 0.0);
        assert_relative_eq!(perf.max_drawdown_pct, 0.0);
    }

    #[test]
    fn drawdown_from_peak() {
        let dd = max_drawdown_pct(&samples(&[100.0, 120.0, 90.0, 130.0, 117.0]));
        assert_relative_eq!(dd, -25.0, epsilon = 1e-9);
    }

    #[test]
    fn monotonic_series_has_no_drawdown() {
        let dd = max_drawdown_pct(&samples(&[100.0, 101.0, 105.0, 105.0, 110.0]));
        assert_eq!(dd, 0.0);
    }

    #[test]
    fn end_of_period_exit_counted_separately() {
        let trades = vec![
            trade(2, "XLK", TradeAction::Buy, 1_000.0),
            trade(5, "XLK", TradeAction::Sell, 900.0),
            trade(8, "XLK", TradeAction::Buy, 900.0),
            trade(30, "XLK", TradeAction::EndOfPeriodSell, 1_200.0),
        ];
        let trips = round_trips(&trades);
        assert_eq!(trips.len(), 2);
        assert_relative_eq!(trips[0].pnl(), -100.0);
        assert_eq!(trips[1].exit_action, TradeAction::EndOfPeriodSell);

        let perf = Performance::analyze(1_000.0, &samples(&[1_000.0, 1_200.0]), &trades, d(2024, 1, 1), d(2024, 2, 1), 0.0)
            .unwrap();
        assert_eq!(perf.signal_exits, 1);
        assert_eq!(perf.end_of_period_exits, 1);
        assert_eq!(perf.round_trips, 2);
        // the only signal-closed trip lost; the forced close does not count
        assert_eq!(perf.winning_trips, 0);
        assert_relative_eq!(perf.win_rate, 0.0);
    }

    #[test]
    fn rebalance_exits_are_not_signal_exits() {
        let trades = vec![
            trade(2, "XLK", TradeAction::Buy, 500.0),
            trade(2, "XLE", TradeAction::Buy, 500.0),
            trade(9, "XLK", TradeAction::RebalanceSell, 600.0),
            trade(9, "XLE", TradeAction::RebalanceSell, 450.0),
            trade(9, "XLF", TradeAction::Buy, 1_050.0),
        ];
        let perf = Performance::analyze(1_000.0, &samples(&[1_000.0, 1_050.0]), &trades, d(2024, 1, 1), d(2024, 2, 1), 0.0)
            .unwrap();
        assert_eq!(perf.signal_exits, 0);
        assert_eq!(perf.rebalance_exits, 2);
        assert_eq!(perf.end_of_period_exits, 0);
        assert_eq!(perf.winning_trips, 1);
        assert_relative_eq!(perf.win_rate, 0.5);
    }

    #[test]
    fn round_trips_pair_per_symbol() {
        let trades = vec![
            trade(2, "A", TradeAction::Buy, 500.0),
            trade(2, "B", TradeAction::Buy, 500.0),
            trade(9, "A", TradeAction::Sell, 550.0),
            trade(9, "B", TradeAction::Sell, 450.0),
            trade(9, "C", TradeAction::Buy, 1_000.0),
        ];
        let trips = round_trips(&trades);
        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].symbol, "A");
        assert_eq!(trips[1].symbol, "B");
    }

    #[test]
    fn sharpe_zero_for_flat_values() {
        assert_eq!(sharpe_ratio(&samples(&[100.0, 100.0, 100.0]), 0.0), 0.0);
        assert!(sharpe_ratio(&samples(&[100.0, 101.0, 103.0, 104.0]), 0.0) > 0.0);
    }

    proptest! {
        #[test]
        fn drawdown_never_positive(values in proptest::collection::vec(1.0f64..1e6, 0..60)) {
            let dd = max_drawdown_pct(&samples(&values));
            prop_assert!(dd <= 0.0);
            prop_assert!(dd >= -100.0);
        }
    }
}

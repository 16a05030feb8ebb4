//! Sector-rotation simulator.
//!
//! Walks business days in the configured window. A day is processed only
//! when every tracked instrument has a bar on it. On a processed day the
//! portfolio is marked to market and, if a rebalance is due, fully
//! liquidated and reinvested equally in the top-ranked instruments that
//! fired a buy signal recently.
//!
//! Rebalances are due on the first processed day and then whenever at
//! least `rebalance_freq` calendar days have passed since the last one that
//! actually ran. A due rebalance with nothing to rank yet, or one that
//! fails, is retried on the next processed day.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use super::backtest::{business_days, buy_and_hold_pct, BacktestConfig, BacktestResult};
use super::error::StrengthError;
use super::indicator::{compute_indicators, IndicatorParams};
use super::metrics::Performance;
use super::portfolio::{PortfolioState, PortfolioValueSample};
use super::relative_strength::{normalize, relative_strength_table, top_sectors, NormalizationMethod};
use super::signal::{generate_signals, SignalFrame, SignalParams};
use crate::domain::price::PriceBar;
use crate::ports::data_port::PriceDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct RotationConfig {
    pub backtest: BacktestConfig,
    pub symbols: Vec<String>,
    pub benchmark: String,
    /// Calendar days between rebalances.
    pub rebalance_freq: i64,
    pub top_n: usize,
    pub lookback_period: usize,
    pub normalization: NormalizationMethod,
    /// Trailing rows in which a buy signal qualifies a candidate.
    pub signal_lookback: usize,
    pub rs_window: Option<usize>,
    pub indicators: IndicatorParams,
    pub signals: SignalParams,
}

impl RotationConfig {
    pub fn new(backtest: BacktestConfig, symbols: Vec<String>, benchmark: &str) -> Self {
        RotationConfig {
            backtest,
            symbols,
            benchmark: benchmark.to_string(),
            rebalance_freq: 20,
            top_n: 3,
            lookback_period: 20,
            normalization: NormalizationMethod::ZScore,
            signal_lookback: 5,
            rs_window: None,
            indicators: IndicatorParams::default(),
            signals: SignalParams::default(),
        }
    }
}

/// Fetches every series up front, then simulates.
///
/// Instruments with no bars in range are dropped with a warning; a missing
/// benchmark is fatal.
pub fn run_rotation_backtest(
    port: &dyn PriceDataPort,
    config: &RotationConfig,
) -> Result<BacktestResult, StrengthError> {
    config.backtest.validate()?;
    let (start, end) = (config.backtest.start_date, config.backtest.end_date);

    let benchmark = port.get_series(&config.benchmark, start, end)?;
    if benchmark.is_empty() {
        return Err(StrengthError::data_unavailable(
            &config.benchmark,
            "benchmark has no bars in the backtest window",
        ));
    }

    let mut instruments = Vec::with_capacity(config.symbols.len());
    for symbol in config.symbols.iter().filter(|s| **s != config.benchmark) {
        let bars = port.get_series(symbol, start, end)?;
        if bars.is_empty() {
            warn!(symbol = %symbol, "no bars in backtest window, excluded from rotation");
            continue;
        }
        instruments.push((symbol.clone(), bars));
    }

    simulate_rotation(&benchmark, &instruments, config)
}

/// Runs the rotation over already-fetched, date-ordered series.
pub fn simulate_rotation(
    benchmark: &[PriceBar],
    instruments: &[(String, Vec<PriceBar>)],
    config: &RotationConfig,
) -> Result<BacktestResult, StrengthError> {
    config.backtest.validate()?;
    let bt = &config.backtest;

    let rs = relative_strength_table(benchmark, instruments, config.rs_window, |_, _| {}).table;
    let frames: HashMap<&str, SignalFrame> = instruments
        .iter()
        .map(|(symbol, bars)| {
            let frame = compute_indicators(symbol, bars, config.indicators);
            (symbol.as_str(), generate_signals(frame, &config.signals))
        })
        .collect();
    let closes: HashMap<&str, HashMap<NaiveDate, f64>> = instruments
        .iter()
        .map(|(symbol, bars)| {
            let by_date = bars.iter().map(|b| (b.date, b.adjusted_close)).collect();
            (symbol.as_str(), by_date)
        })
        .collect();

    let mut state = PortfolioState::new(bt.initial_capital);
    let mut trades = Vec::new();
    let mut values = Vec::new();
    let mut last_rebalance: Option<NaiveDate> = None;

    for date in business_days(bt.start_date, bt.end_date) {
        let Some(prices) = prices_on(&closes, instruments, date) else {
            continue;
        };

        let value = state.mark_to_market(&prices);
        values.push(PortfolioValueSample { date, value });

        let due = match last_rebalance {
            None => true,
            Some(prev) => (date - prev).num_days() >= config.rebalance_freq,
        };
        if !due {
            continue;
        }
        if !rs.contains_date(date) {
            debug!(%date, "no relative strength row yet, rebalance deferred");
            continue;
        }

        let normalized = normalize(&rs.up_to(date), config.normalization);
        let ranked = top_sectors(&normalized, config.top_n, config.lookback_period);
        if ranked.is_empty() {
            debug!(%date, "nothing ranked yet, rebalance deferred");
            continue;
        }
        let candidates = buy_candidates(ranked, &frames, date, config.signal_lookback);

        match state.rebalance(date, &prices, &candidates) {
            Ok(step) => {
                debug!(%date, ?candidates, trades = step.len(), "rebalanced");
                trades.extend(step);
                last_rebalance = Some(date);
            }
            Err(e) => warn!(%date, error = %e, "rebalance deferred"),
        }
    }

    let performance = Performance::analyze(
        bt.initial_capital,
        &values,
        &trades,
        bt.start_date,
        bt.end_date,
        bt.risk_free_rate,
    )?;
    info!(
        final_value = performance.final_value,
        total_return_pct = performance.total_return_pct,
        trades = trades.len(),
        days = values.len(),
        "rotation backtest complete"
    );

    let window: Vec<PriceBar> = benchmark
        .iter()
        .filter(|b| b.date >= bt.start_date && b.date <= bt.end_date)
        .cloned()
        .collect();

    Ok(BacktestResult {
        performance,
        trades,
        values,
        benchmark_return_pct: buy_and_hold_pct(&window),
        buy_and_hold_return_pct: None,
    })
}

/// Ranked symbols that fired a buy in the trailing `signal_lookback` rows.
/// Sell flags are never consulted, so a same-row sell does not veto a buy.
fn buy_candidates(
    ranked: Vec<String>,
    frames: &HashMap<&str, SignalFrame>,
    date: NaiveDate,
    signal_lookback: usize,
) -> Vec<String> {
    ranked
        .into_iter()
        .filter(|s| {
            frames
                .get(s.as_str())
                .is_some_and(|f| f.recent_buy(date, signal_lookback))
        })
        .collect()
}

/// Every tracked instrument's close on `date`, or `None` if any is missing.
fn prices_on(
    closes: &HashMap<&str, HashMap<NaiveDate, f64>>,
    instruments: &[(String, Vec<PriceBar>)],
    date: NaiveDate,
) -> Option<HashMap<String, f64>> {
    instruments
        .iter()
        .map(|(symbol, _)| {
            let price = closes.get(symbol.as_str())?.get(&date)?;
            Some((symbol.clone(), *price))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::IndicatorFrame;
    use crate::domain::position::TradeAction;
    use crate::domain::signal::Signal;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn bars(symbol: &str, start: NaiveDate, end: NaiveDate, price: impl Fn(usize) -> f64) -> Vec<PriceBar> {
        business_days(start, end)
            .enumerate()
            .map(|(i, date)| {
                let p = price(i);
                PriceBar {
                    symbol: symbol.into(),
                    date,
                    open: p,
                    high: p,
                    low: p,
                    close: p,
                    adjusted_close: p,
                    volume: 1_000,
                }
            })
            .collect()
    }

    fn config(start: NaiveDate, end: NaiveDate, symbols: &[&str]) -> RotationConfig {
        RotationConfig::new(
            BacktestConfig::new(start, end),
            symbols.iter().map(|s| s.to_string()).collect(),
            "SPY",
        )
    }

    #[test]
    fn flat_volume_never_trades() {
        // constant volume keeps relative volume at 1.0, so no buy ever fires
        let (start, end) = (d(2024, 1, 1), d(2024, 3, 29));
        let spy = bars("SPY", start, end, |_| 100.0);
        let instruments = vec![("XLK".to_string(), bars("XLK", start, end, |i| 50.0 + i as f64))];
        let result = simulate_rotation(&spy, &instruments, &config(start, end, &["XLK"])).unwrap();

        assert!(result.trades.is_empty());
        assert!(result.values.iter().all(|v| (v.value - 10_000.0).abs() < 1e-9));
        assert_eq!(result.benchmark_return_pct, Some(0.0));
    }

    #[test]
    fn day_missing_any_instrument_is_skipped() {
        let (start, end) = (d(2024, 1, 1), d(2024, 1, 12));
        let spy = bars("SPY", start, end, |_| 100.0);
        let mut gappy = bars("XLE", start, end, |_| 10.0);
        gappy.retain(|b| b.date != d(2024, 1, 3));
        let instruments = vec![
            ("XLK".to_string(), bars("XLK", start, end, |_| 10.0)),
            ("XLE".to_string(), gappy),
        ];
        let result =
            simulate_rotation(&spy, &instruments, &config(start, end, &["XLK", "XLE"])).unwrap();
        assert_eq!(result.values.len(), 9);
        assert!(result.values.iter().all(|v| v.date != d(2024, 1, 3)));
    }

    #[test]
    fn reversed_range_is_rejected() {
        let err = simulate_rotation(&[], &[], &config(d(2024, 2, 1), d(2024, 1, 1), &[])).unwrap_err();
        assert!(matches!(err, StrengthError::InvalidDateRange { .. }));
    }

    #[test]
    fn open_positions_are_not_liquidated_at_end() {
        let (start, end) = (d(2024, 1, 1), d(2024, 4, 30));
        let spy = bars("SPY", start, end, |_| 100.0);
        let mut xlk = bars("XLK", start, end, |i| 50.0 + i as f64);
        // volume surge on every fifth day keeps a buy in the trailing window
        for (i, bar) in xlk.iter_mut().enumerate() {
            if i % 5 == 0 {
                bar.volume = 5_000;
            }
        }
        let mut cfg = config(start, end, &["XLK"]);
        cfg.top_n = 1;
        let result = simulate_rotation(&spy, &[("XLK".to_string(), xlk)], &cfg).unwrap();

        assert!(result.trades.iter().any(|t| t.action == TradeAction::Buy));
        assert!(result.trades.iter().all(|t| t.action != TradeAction::EndOfPeriodSell));
        let last = result.trades.last().unwrap();
        assert_eq!(last.action, TradeAction::Buy);
    }

    fn signal_frame(symbol: &str, flags: &[(bool, bool)]) -> SignalFrame {
        SignalFrame {
            indicators: IndicatorFrame {
                symbol: symbol.into(),
                params: IndicatorParams::default(),
                rows: Vec::new(),
            },
            signals: flags
                .iter()
                .enumerate()
                .map(|(i, &(buy, sell))| Signal {
                    date: d(2024, 1, 2) + chrono::Duration::days(i as i64),
                    buy,
                    sell,
                })
                .collect(),
        }
    }

    #[test]
    fn sell_on_rebalance_day_does_not_veto_candidate() {
        let mut frames = HashMap::new();
        // buy and sell on the same row
        frames.insert("XLK", signal_frame("XLK", &[(false, false), (true, true)]));
        // buy the day before, sell on the rebalance day
        frames.insert("XLE", signal_frame("XLE", &[(true, false), (false, true)]));
        // only sells
        frames.insert("XLU", signal_frame("XLU", &[(false, true), (false, true)]));
        let ranked: Vec<String> = ["XLU", "XLE", "XLK"].iter().map(|s| s.to_string()).collect();

        let rebalance_day = d(2024, 1, 3);
        assert_eq!(
            buy_candidates(ranked.clone(), &frames, rebalance_day, 2),
            vec!["XLE".to_string(), "XLK".to_string()]
        );
        assert_eq!(
            buy_candidates(ranked, &frames, rebalance_day, 1),
            vec!["XLK".to_string()]
        );
    }

    #[test]
    fn rebalance_liquidations_are_tagged() {
        let (start, end) = (d(2024, 1, 1), d(2024, 4, 30));
        let spy = bars("SPY", start, end, |_| 100.0);
        let surging = |symbol: &str, base: f64| {
            let mut out = bars(symbol, start, end, |i| base + i as f64);
            for (i, bar) in out.iter_mut().enumerate() {
                if i % 5 == 0 {
                    bar.volume = 5_000;
                }
            }
            out
        };
        let instruments = vec![
            ("XLK".to_string(), surging("XLK", 50.0)),
            ("XLE".to_string(), surging("XLE", 80.0)),
        ];
        let mut cfg = config(start, end, &["XLK", "XLE"]);
        cfg.rebalance_freq = 10;
        let result = simulate_rotation(&spy, &instruments, &cfg).unwrap();

        let sells: Vec<TradeAction> =
            result.trades.iter().map(|t| t.action).filter(|a| a.is_sell()).collect();
        assert!(!sells.is_empty());
        assert!(sells.iter().all(|a| *a == TradeAction::RebalanceSell));
        assert_eq!(result.performance.signal_exits, 0);
        assert_eq!(result.performance.rebalance_exits, sells.len());
    }
}

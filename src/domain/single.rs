//! Single-instrument signal simulator.
//!
//! FLAT -> LONG on a buy signal (all cash), LONG -> FLAT on a sell signal.
//! When a row carries both flags only the one relevant to the current state
//! is consulted. A position still open after the last row is closed at the
//! last price and recorded as an end-of-period sell.

use std::collections::HashMap;
use tracing::{info, warn};

use super::backtest::{buy_and_hold_pct, BacktestConfig, BacktestResult};
use super::error::StrengthError;
use super::indicator::{compute_indicators, IndicatorParams};
use super::metrics::Performance;
use super::portfolio::{PortfolioState, PortfolioValueSample};
use super::position::TradeAction;
use super::price::PriceBar;
use super::signal::{generate_signals, Signal, SignalParams};
use crate::ports::data_port::PriceDataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct SingleConfig {
    pub backtest: BacktestConfig,
    pub indicators: IndicatorParams,
    pub signals: SignalParams,
    /// Compared against when present.
    pub benchmark: Option<String>,
}

impl SingleConfig {
    pub fn new(backtest: BacktestConfig) -> Self {
        SingleConfig {
            backtest,
            indicators: IndicatorParams::default(),
            signals: SignalParams::default(),
            benchmark: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Holding {
    Flat,
    Long,
}

pub fn run_single_instrument_backtest(
    port: &dyn PriceDataPort,
    symbol: &str,
    config: &SingleConfig,
) -> Result<BacktestResult, StrengthError> {
    config.backtest.validate()?;
    let (start, end) = (config.backtest.start_date, config.backtest.end_date);

    let bars = port.get_series(symbol, start, end)?;
    if bars.is_empty() {
        return Err(StrengthError::data_unavailable(symbol, "no bars in the backtest window"));
    }

    let frame = generate_signals(compute_indicators(symbol, &bars, config.indicators), &config.signals);
    let mut result = simulate_single(symbol, &bars, &frame.signals, &config.backtest)?;

    if let Some(benchmark) = &config.benchmark {
        let bench = port.get_series(benchmark, start, end)?;
        if bench.is_empty() {
            warn!(benchmark = %benchmark, "benchmark has no bars, comparison skipped");
        }
        result.benchmark_return_pct = buy_and_hold_pct(&bench);
    }
    Ok(result)
}

/// Walks `bars` and the row-aligned `signals`.
pub fn simulate_single(
    symbol: &str,
    bars: &[PriceBar],
    signals: &[Signal],
    config: &BacktestConfig,
) -> Result<BacktestResult, StrengthError> {
    config.validate()?;

    let mut state = PortfolioState::new(config.initial_capital);
    let mut holding = Holding::Flat;
    let mut trades = Vec::new();
    let mut values = Vec::with_capacity(bars.len());

    for (bar, signal) in bars.iter().zip(signals) {
        let price = bar.adjusted_close;
        match holding {
            Holding::Flat if signal.buy && state.cash > 0.0 => {
                if let Some(trade) = state.buy_all(symbol, bar.date, price) {
                    trades.push(trade);
                    holding = Holding::Long;
                }
            }
            Holding::Long if signal.sell => {
                if let Some(trade) = state.sell_all(symbol, bar.date, price, TradeAction::Sell) {
                    trades.push(trade);
                    holding = Holding::Flat;
                }
            }
            _ => {}
        }

        let value = state.mark_to_market(&HashMap::from([(symbol.to_string(), price)]));
        values.push(PortfolioValueSample { date: bar.date, value });
    }

    if holding == Holding::Long {
        if let Some(last) = bars.last() {
            if let Some(trade) =
                state.sell_all(symbol, last.date, last.adjusted_close, TradeAction::EndOfPeriodSell)
            {
                trades.push(trade);
            }
        }
    }

    let performance = Performance::analyze(
        config.initial_capital,
        &values,
        &trades,
        config.start_date,
        config.end_date,
        config.risk_free_rate,
    )?;
    info!(
        symbol,
        final_value = performance.final_value,
        total_return_pct = performance.total_return_pct,
        trades = trades.len(),
        "single-instrument backtest complete"
    );

    Ok(BacktestResult {
        performance,
        trades,
        values,
        benchmark_return_pct: None,
        buy_and_hold_return_pct: buy_and_hold_pct(bars),
    })
}

//! Portfolio state: cash, long positions and value accounting.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::error::StrengthError;
use super::position::{Position, TradeAction, TradeRecord};

/// Relative tolerance for the value-conservation check.
const CONSERVATION_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PortfolioValueSample {
    pub date: NaiveDate,
    pub value: f64,
}

/// Positions are keyed by symbol in sorted order, so liquidations are
/// recorded deterministically.
#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioState {
    pub cash: f64,
    pub positions: BTreeMap<String, Position>,
}

impl PortfolioState {
    pub fn new(initial_capital: f64) -> Self {
        PortfolioState {
            cash: initial_capital,
            positions: BTreeMap::new(),
        }
    }

    pub fn is_flat(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn get_position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    /// Cash plus every position at its last mark.
    pub fn total_value(&self) -> f64 {
        self.cash
            + self
                .positions
                .values()
                .map(|p| p.market_value(p.last_price))
                .sum::<f64>()
    }

    /// Updates marks from `prices` and returns the total value. A position
    /// with no price today keeps its previous mark.
    pub fn mark_to_market(&mut self, prices: &HashMap<String, f64>) -> f64 {
        for (symbol, position) in self.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                position.last_price = price;
            }
        }
        self.total_value()
    }

    /// Spends all cash on `symbol`. `None` when there is no cash or the
    /// price is unusable.
    pub fn buy_all(&mut self, symbol: &str, date: NaiveDate, price: f64) -> Option<TradeRecord> {
        if self.cash <= 0.0 || price.is_nan() || price <= 0.0 {
            return None;
        }
        let value = self.cash;
        let shares = value / price;
        self.cash = 0.0;
        self.positions
            .insert(symbol.to_string(), Position::open(symbol, shares, price, date));
        Some(TradeRecord {
            date,
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            shares,
            price,
            value,
        })
    }

    /// Closes the whole position in `symbol`, if any.
    pub fn sell_all(
        &mut self,
        symbol: &str,
        date: NaiveDate,
        price: f64,
        action: TradeAction,
    ) -> Option<TradeRecord> {
        let position = self.positions.remove(symbol)?;
        let value = position.market_value(price);
        self.cash += value;
        Some(TradeRecord {
            date,
            symbol: symbol.to_string(),
            action,
            shares: position.shares,
            price,
            value,
        })
    }

    /// Liquidates every holding and splits the proceeds equally across
    /// `candidates`.
    ///
    /// All-or-nothing: the step runs on a copy and is only committed once
    /// every price is valid and total value is unchanged by the trades. On
    /// error `self` is left exactly as it was.
    pub fn rebalance(
        &mut self,
        date: NaiveDate,
        prices: &HashMap<String, f64>,
        candidates: &[String],
    ) -> Result<Vec<TradeRecord>, StrengthError> {
        let price_of = |symbol: &str| -> Result<f64, StrengthError> {
            match prices.get(symbol) {
                Some(&p) if p > 0.0 && p.is_finite() => Ok(p),
                Some(&p) => Err(StrengthError::RebalanceFailed {
                    date,
                    reason: format!("unusable price {} for {}", p, symbol),
                }),
                None => Err(StrengthError::RebalanceFailed {
                    date,
                    reason: format!("no price for {}", symbol),
                }),
            }
        };

        let mut scratch = self.clone();
        let mut trades = Vec::with_capacity(scratch.positions.len() + candidates.len());

        let held: Vec<String> = scratch.positions.keys().cloned().collect();
        let mut value_before = scratch.cash;
        for symbol in &held {
            let price = price_of(symbol)?;
            if let Some(position) = scratch.positions.get(symbol) {
                value_before += position.market_value(price);
            }
            if let Some(trade) = scratch.sell_all(symbol, date, price, TradeAction::RebalanceSell) {
                trades.push(trade);
            }
        }
        check_conserved(date, value_before, scratch.cash)?;

        if !candidates.is_empty() && scratch.cash > 0.0 {
            let candidate_prices = candidates
                .iter()
                .map(|s| price_of(s).map(|p| (s, p)))
                .collect::<Result<Vec<_>, _>>()?;
            let allocation = scratch.cash / candidates.len() as f64;
            for (symbol, price) in candidate_prices {
                let shares = allocation / price;
                scratch.cash -= allocation;
                scratch
                    .positions
                    .insert(symbol.clone(), Position::open(symbol, shares, price, date));
                trades.push(TradeRecord {
                    date,
                    symbol: symbol.clone(),
                    action: TradeAction::Buy,
                    shares,
                    price,
                    value: allocation,
                });
            }
            check_conserved(date, value_before, scratch.total_value())?;
        }

        *self = scratch;
        Ok(trades)
    }
}

fn check_conserved(date: NaiveDate, expected: f64, actual: f64) -> Result<(), StrengthError> {
    let tolerance = CONSERVATION_TOLERANCE * expected.abs().max(1.0);
    if (expected - actual).abs() > tolerance {
        return Err(StrengthError::RebalanceFailed {
            date,
            reason: format!("value not conserved: {} before, {} after", expected, actual),
        });
    }
    Ok(())
}

//! Open positions and the trade ledger.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;

/// A long holding. Shares are fractional and never negative.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub shares: f64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    /// Most recent mark-to-market price.
    pub last_price: f64,
}

impl Position {
    pub fn open(symbol: &str, shares: f64, price: f64, date: NaiveDate) -> Self {
        Position {
            symbol: symbol.to_string(),
            shares,
            entry_price: price,
            entry_date: date,
            last_price: price,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.shares * price
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TradeAction {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    /// Full liquidation ahead of a rotation reallocation.
    #[serde(rename = "SELL")]
    RebalanceSell,
    /// Forced liquidation when a run ends while still long.
    #[serde(rename = "SELL (End)")]
    EndOfPeriodSell,
}

impl TradeAction {
    pub fn is_sell(self) -> bool {
        !matches!(self, TradeAction::Buy)
    }
}

impl fmt::Display for TradeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeAction::Buy => write!(f, "BUY"),
            TradeAction::Sell | TradeAction::RebalanceSell => write!(f, "SELL"),
            TradeAction::EndOfPeriodSell => write!(f, "SELL (End)"),
        }
    }
}

/// Append-only ledger entry. `value` is the cash moved by the trade.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub symbol: String,
    pub action: TradeAction,
    pub shares: f64,
    pub price: f64,
    pub value: f64,
}

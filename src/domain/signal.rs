//! Buy/sell rules over an indicator frame.
//!
//! Buy on row t when all hold:
//! - at least `trend_ratio` of the last `trend_days` rows closed above the price MA
//! - relative volume above `volume_threshold`
//! - OBV[t] > OBV[t - obv_lookback]
//!
//! Sell is the mirror image (below MA, OBV falling). Any undefined operand
//! makes the rule false. Buy and sell are evaluated independently and can
//! both be true on the same row; consumers decide precedence.

use chrono::NaiveDate;

use crate::domain::indicator::{IndicatorFrame, IndicatorRow};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalParams {
    pub volume_threshold: f64,
    pub trend_days: usize,
    pub trend_ratio: f64,
    pub obv_lookback: usize,
}

impl Default for SignalParams {
    fn default() -> Self {
        SignalParams {
            volume_threshold: 1.5,
            trend_days: 5,
            trend_ratio: 0.8,
            obv_lookback: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signal {
    pub date: NaiveDate,
    pub buy: bool,
    pub sell: bool,
}

/// Indicators plus the signal column, row-aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    pub indicators: IndicatorFrame,
    pub signals: Vec<Signal>,
}

impl SignalFrame {
    pub fn symbol(&self) -> &str {
        &self.indicators.symbol
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Index of the last row dated on or before `date`.
    pub fn index_at(&self, date: NaiveDate) -> Option<usize> {
        self.signals
            .partition_point(|s| s.date <= date)
            .checked_sub(1)
    }

    /// True if a buy fired in any of the `rows` rows ending at `date`.
    pub fn recent_buy(&self, date: NaiveDate, rows: usize) -> bool {
        match self.index_at(date) {
            Some(end) => {
                let start = (end + 1).saturating_sub(rows);
                self.signals[start..=end].iter().any(|s| s.buy)
            }
            None => false,
        }
    }

    pub fn buy_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.signals.iter().filter(|s| s.buy).map(|s| s.date)
    }

    pub fn sell_dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.signals.iter().filter(|s| s.sell).map(|s| s.date)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Long,
    Short,
}

pub fn generate_signals(frame: IndicatorFrame, params: &SignalParams) -> SignalFrame {
    let signals = (0..frame.rows.len())
        .map(|i| Signal {
            date: frame.rows[i].date,
            buy: rule_holds(&frame.rows, i, params, Side::Long),
            sell: rule_holds(&frame.rows, i, params, Side::Short),
        })
        .collect();

    SignalFrame {
        indicators: frame,
        signals,
    }
}

fn rule_holds(rows: &[IndicatorRow], i: usize, params: &SignalParams, side: Side) -> bool {
    trend_holds(rows, i, params, side)
        && volume_holds(&rows[i], params)
        && obv_holds(rows, i, params.obv_lookback, side)
}

fn trend_holds(rows: &[IndicatorRow], i: usize, params: &SignalParams, side: Side) -> bool {
    if params.trend_days == 0 || i + 1 < params.trend_days {
        return false;
    }
    let window = &rows[i + 1 - params.trend_days..=i];
    let count = window
        .iter()
        .filter(|r| match (r.price_ma, side) {
            (Some(ma), Side::Long) => r.adjusted_close > ma,
            (Some(ma), Side::Short) => r.adjusted_close < ma,
            (None, _) => false,
        })
        .count();
    count as f64 >= params.trend_days as f64 * params.trend_ratio
}

fn volume_holds(row: &IndicatorRow, params: &SignalParams) -> bool {
    matches!(row.relative_volume, Some(rv) if rv > params.volume_threshold)
}

fn obv_holds(rows: &[IndicatorRow], i: usize, lookback: usize, side: Side) -> bool {
    let Some(past) = i.checked_sub(lookback) else {
        return false;
    };
    match side {
        Side::Long => rows[i].obv > rows[past].obv,
        Side::Short => rows[i].obv < rows[past].obv,
    }
}

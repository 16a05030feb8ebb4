//! Per-symbol trailing-window indicators.
//!
//! This module provides:
//! - `IndicatorParams`: window lengths for the rolling columns
//! - `IndicatorRow`: one date's price, volume and derived columns
//! - `IndicatorFrame`: the full per-symbol frame, built by `compute_indicators`
//! - `IndicatorColumn`: column identity, used for display headers
//!
//! Rolling columns are `None` for the first `window - 1` rows. Nothing is
//! zero-filled.

pub mod obv;
pub mod rolling;
pub mod volume;

use chrono::NaiveDate;
use std::fmt;

use crate::domain::price::PriceBar;

/// Quantile of the whole volume sample above which a row is a spike.
pub const VOLUME_SPIKE_QUANTILE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorParams {
    pub price_ma_period: usize,
    pub volume_ma_period: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        IndicatorParams {
            price_ma_period: 20,
            volume_ma_period: 20,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorColumn {
    PriceMa(usize),
    VolumeMa(usize),
    RelativeVolume,
    VolumeChange,
    Obv,
    Volatility(usize),
    VolumeSpike,
}

impl fmt::Display for IndicatorColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorColumn::PriceMa(period) => write!(f, "PRICE_MA({})", period),
            IndicatorColumn::VolumeMa(period) => write!(f, "VOLUME_MA({})", period),
            IndicatorColumn::RelativeVolume => write!(f, "REL_VOLUME"),
            IndicatorColumn::VolumeChange => write!(f, "VOLUME_CHANGE"),
            IndicatorColumn::Obv => write!(f, "OBV"),
            IndicatorColumn::Volatility(period) => write!(f, "VOLATILITY({})", period),
            IndicatorColumn::VolumeSpike => write!(f, "VOLUME_SPIKE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorRow {
    pub date: NaiveDate,
    pub adjusted_close: f64,
    pub volume: f64,
    pub price_ma: Option<f64>,
    pub volume_ma: Option<f64>,
    pub relative_volume: Option<f64>,
    pub volume_change: Option<f64>,
    pub obv: f64,
    pub price_volatility: Option<f64>,
    pub volume_spike: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorFrame {
    pub symbol: String,
    pub params: IndicatorParams,
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> [IndicatorColumn; 7] {
        [
            IndicatorColumn::PriceMa(self.params.price_ma_period),
            IndicatorColumn::VolumeMa(self.params.volume_ma_period),
            IndicatorColumn::RelativeVolume,
            IndicatorColumn::VolumeChange,
            IndicatorColumn::Obv,
            IndicatorColumn::Volatility(self.params.price_ma_period),
            IndicatorColumn::VolumeSpike,
        ]
    }
}

/// Computes every indicator column for one symbol's ordered bars.
///
/// Volatility uses the price MA window, matching how the columns are
/// configured together.
pub fn compute_indicators(symbol: &str, bars: &[PriceBar], params: IndicatorParams) -> IndicatorFrame {
    let prices: Vec<f64> = bars.iter().map(|b| b.adjusted_close).collect();
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume as f64).collect();

    let price_ma = rolling::rolling_mean(&prices, params.price_ma_period);
    let volume_ma = rolling::rolling_mean(&volumes, params.volume_ma_period);
    let relative_volume = volume::relative_volume(&volumes, &volume_ma);
    let volume_change = volume::volume_change(&volumes);
    let obv = obv::on_balance_volume(&prices, &volumes);
    let volatility = rolling::rolling_sample_stddev(&prices, params.price_ma_period);
    let spikes = volume::volume_spikes(&volumes, VOLUME_SPIKE_QUANTILE);

    let rows = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| IndicatorRow {
            date: bar.date,
            adjusted_close: prices[i],
            volume: volumes[i],
            price_ma: price_ma[i],
            volume_ma: volume_ma[i],
            relative_volume: relative_volume[i],
            volume_change: volume_change[i],
            obv: obv[i],
            price_volatility: volatility[i],
            volume_spike: spikes[i],
        })
        .collect();

    IndicatorFrame {
        symbol: symbol.to_string(),
        params,
        rows,
    }
}

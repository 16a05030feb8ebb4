#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use sectorstrength::domain::error::StrengthError;
pub use sectorstrength::domain::price::PriceBar;
use sectorstrength::ports::data_port::PriceDataPort;
use sectorstrength::ports::sink_port::{RelativeStrengthSink, RsRow};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<PriceBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), StrengthError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(StrengthError::Database {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl PriceDataPort for MockDataPort {
    fn get_series(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PriceBar>, StrengthError> {
        self.check(symbol)?;
        Ok(self
            .data
            .get(symbol)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_symbols(&self) -> Result<Vec<String>, StrengthError> {
        let mut symbols: Vec<String> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        symbol: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrengthError> {
        self.check(symbol)?;
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

/// Keeps every upserted row; optionally refuses all writes.
pub struct RecordingSink {
    pub rows: RefCell<Vec<RsRow>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            rows: RefCell::new(Vec::new()),
            fail: true,
        }
    }
}

impl RelativeStrengthSink for RecordingSink {
    fn upsert(&self, rows: &[RsRow]) -> Result<usize, StrengthError> {
        if self.fail {
            return Err(StrengthError::Database {
                reason: "sink unavailable".into(),
            });
        }
        self.rows.borrow_mut().extend_from_slice(rows);
        Ok(rows.len())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The first `count` Mon-Fri dates on or after `start`.
pub fn business_dates(start: NaiveDate, count: usize) -> Vec<NaiveDate> {
    start
        .iter_days()
        .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
        .take(count)
        .collect()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64, volume: i64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        adjusted_close: close,
        volume,
    }
}

/// Business-day bars with `price(i)` and `volume(i)` for row `i`.
pub fn generate_bars(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    price: impl Fn(usize) -> f64,
    volume: impl Fn(usize) -> i64,
) -> Vec<PriceBar> {
    business_dates(start, count)
        .into_iter()
        .enumerate()
        .map(|(i, d)| make_bar(symbol, d, price(i), volume(i)))
        .collect()
}

pub fn flat_bars(symbol: &str, start: NaiveDate, count: usize, price: f64) -> Vec<PriceBar> {
    generate_bars(symbol, start, count, |_| price, |_| 1_000)
}

/// Steady uptrend with a volume surge every `surge_every` rows: above its
/// moving average, rising OBV and relative volume well over 1.5 on surge
/// days, so buys fire on every surge once the windows fill.
pub fn surging_bars(
    symbol: &str,
    start: NaiveDate,
    count: usize,
    base: f64,
    daily_gain: f64,
    surge_every: usize,
) -> Vec<PriceBar> {
    generate_bars(
        symbol,
        start,
        count,
        |i| base * (1.0 + daily_gain).powi(i as i32),
        |i| if i % surge_every == 0 { 5_000 } else { 1_000 },
    )
}

/// Writes `{SYMBOL}.csv` in the CSV adapter's layout.
pub fn write_csv(dir: &Path, bars: &[PriceBar]) {
    let Some(first) = bars.first() else {
        return;
    };
    let mut content = String::from("date,open,high,low,close,adjusted_close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.adjusted_close, b.volume
        ));
    }
    std::fs::write(dir.join(format!("{}.csv", first.symbol)), content).unwrap();
}

//! Typed per-symbol time series and the outer-join wide table.
//!
//! A `TimeSeries` is one ordered column of optional values. A `WideTable`
//! aligns many of them on the union of their dates; a symbol missing on a
//! date is a gap (`None`), never a zero.

use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeries {
    pub points: Vec<SeriesPoint>,
}

impl TimeSeries {
    pub fn new(points: Vec<SeriesPoint>) -> Self {
        Self { points }
    }

    pub fn from_pairs(dates: &[NaiveDate], values: Vec<Option<f64>>) -> Self {
        let points = dates
            .iter()
            .zip(values)
            .map(|(&date, value)| SeriesPoint { date, value })
            .collect();
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn last(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.points.iter().map(|p| p.date).collect()
    }
}

/// Column-major table keyed by date, one column per symbol.
///
/// Column order is insertion order and is used as the tie-break when
/// ranking.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WideTable {
    dates: Vec<NaiveDate>,
    symbols: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl WideTable {
    /// Outer-joins the given series on date.
    pub fn outer_join(series: Vec<(String, TimeSeries)>) -> Self {
        let dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|(_, s)| s.points.iter().map(|p| p.date))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let index: HashMap<NaiveDate, usize> =
            dates.iter().enumerate().map(|(i, &d)| (d, i)).collect();

        let mut symbols = Vec::with_capacity(series.len());
        let mut columns = Vec::with_capacity(series.len());
        for (symbol, s) in series {
            let mut column = vec![None; dates.len()];
            for point in &s.points {
                column[index[&point.date]] = point.value;
            }
            symbols.push(symbol);
            columns.push(column);
        }

        Self {
            dates,
            symbols,
            columns,
        }
    }

    /// Builds a table from already-aligned columns.
    pub(crate) fn from_columns(
        dates: Vec<NaiveDate>,
        symbols: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Self {
        debug_assert_eq!(symbols.len(), columns.len());
        debug_assert!(columns.iter().all(|c| c.len() == dates.len()));
        Self {
            dates,
            symbols,
            columns,
        }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn columns(&self) -> &[Vec<Option<f64>>] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, symbol: &str) -> Option<&[Option<f64>]> {
        self.symbols
            .iter()
            .position(|s| s == symbol)
            .map(|i| self.columns[i].as_slice())
    }

    pub fn value(&self, date: NaiveDate, symbol: &str) -> Option<f64> {
        let row = self.dates.binary_search(&date).ok()?;
        self.column(symbol)?[row]
    }

    pub fn contains_date(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// Rows dated on or before `date`.
    pub fn up_to(&self, date: NaiveDate) -> WideTable {
        let end = self.dates.partition_point(|&d| d <= date);
        WideTable {
            dates: self.dates[..end].to_vec(),
            symbols: self.symbols.clone(),
            columns: self.columns.iter().map(|c| c[..end].to_vec()).collect(),
        }
    }

    /// Iterates `(date, symbol, value)` over every defined cell.
    pub fn cells(&self) -> impl Iterator<Item = (NaiveDate, &str, f64)> + '_ {
        self.symbols
            .iter()
            .zip(&self.columns)
            .flat_map(move |(symbol, column)| {
                self.dates
                    .iter()
                    .zip(column)
                    .filter_map(move |(&date, v)| v.map(|v| (date, symbol.as_str(), v)))
            })
    }
}

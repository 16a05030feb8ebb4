//! Relative strength against a benchmark, per-instrument normalization
//! and top-N ranking.
//!
//! RS on date t is the instrument's cumulative-return index divided by the
//! benchmark's, both compounded from the first date the two series share.
//! That first shared date has no prior return and is dropped, so an
//! instrument needs at least two shared dates to produce any RS row.
//!
//! Everything here except `RelativeStrengthEngine` is pure: the engine only
//! adds data fetching and the optional sink.

use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::domain::error::StrengthError;
use crate::domain::indicator::rolling::rolling_mean_opt;
use crate::domain::price::PriceBar;
use crate::domain::series::{TimeSeries, WideTable};
use crate::ports::data_port::PriceDataPort;
use crate::ports::sink_port::{RelativeStrengthSink, RsRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The instrument returned no bars in range.
    NoData,
    /// Fewer than two dates shared with the benchmark.
    NoOverlap,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data in range"),
            SkipReason::NoOverlap => write!(f, "no dates overlapping the benchmark"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RsOutcome {
    Computed(TimeSeries),
    Skipped(SkipReason),
}

/// Wide RS table plus the instruments that were left out of it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RsComputation {
    pub table: WideTable,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Raw (unsmoothed) RS of one instrument against the benchmark.
///
/// Both inputs must be ordered by date. Rows whose return is undefined
/// (previous price zero) are `None` and do not move the cumulative index.
pub fn relative_strength_series(benchmark: &[PriceBar], instrument: &[PriceBar]) -> RsOutcome {
    if instrument.is_empty() {
        return RsOutcome::Skipped(SkipReason::NoData);
    }

    let joined = inner_join(benchmark, instrument);
    if joined.len() < 2 {
        return RsOutcome::Skipped(SkipReason::NoOverlap);
    }

    let mut bench_index = 1.0;
    let mut inst_index = 1.0;
    let mut dates = Vec::with_capacity(joined.len() - 1);
    let mut values = Vec::with_capacity(joined.len() - 1);

    for pair in joined.windows(2) {
        let (prev_b, prev_i) = pair[0];
        let (cur_b, cur_i) = pair[1];
        let value = match (cur_b.return_since(prev_b), cur_i.return_since(prev_i)) {
            (Some(rb), Some(ri)) => {
                bench_index *= 1.0 + rb;
                inst_index *= 1.0 + ri;
                if bench_index == 0.0 {
                    None
                } else {
                    Some(inst_index / bench_index)
                }
            }
            _ => None,
        };
        dates.push(cur_b.date);
        values.push(value);
    }

    RsOutcome::Computed(TimeSeries::from_pairs(&dates, values))
}

fn inner_join<'a>(a: &'a [PriceBar], b: &'a [PriceBar]) -> Vec<(&'a PriceBar, &'a PriceBar)> {
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].date.cmp(&b[j].date) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push((&a[i], &b[j]));
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Trailing simple average; the first `window - 1` rows become undefined.
pub fn smooth(series: &TimeSeries, window: usize) -> TimeSeries {
    let smoothed = rolling_mean_opt(&series.values(), window);
    TimeSeries::from_pairs(&series.dates(), smoothed)
}

/// Builds the RS table for already-fetched data.
///
/// `raw` receives every unsmoothed series before the optional window is
/// applied, so callers can persist the raw ratio.
pub fn relative_strength_table(
    benchmark: &[PriceBar],
    instruments: &[(String, Vec<PriceBar>)],
    window: Option<usize>,
    mut raw: impl FnMut(&str, &TimeSeries),
) -> RsComputation {
    let mut columns = Vec::with_capacity(instruments.len());
    let mut skipped = Vec::new();

    for (symbol, bars) in instruments {
        match relative_strength_series(benchmark, bars) {
            RsOutcome::Computed(series) => {
                raw(symbol, &series);
                let series = match window {
                    Some(w) if w > 1 => smooth(&series, w),
                    _ => series,
                };
                columns.push((symbol.clone(), series));
            }
            RsOutcome::Skipped(reason) => {
                warn!(symbol = %symbol, %reason, "skipping instrument");
                skipped.push((symbol.clone(), reason));
            }
        }
    }

    RsComputation {
        table: WideTable::outer_join(columns),
        skipped,
    }
}

/// Fetches prices through a `PriceDataPort` and computes RS tables.
pub struct RelativeStrengthEngine<'a> {
    data: &'a dyn PriceDataPort,
    sink: Option<&'a dyn RelativeStrengthSink>,
}

impl<'a> RelativeStrengthEngine<'a> {
    pub fn new(data: &'a dyn PriceDataPort) -> Self {
        Self { data, sink: None }
    }

    pub fn with_sink(mut self, sink: &'a dyn RelativeStrengthSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Wide table of RS per symbol per date over `[start, end]`.
    ///
    /// Fails only when the benchmark itself has no bars; instruments without
    /// usable data are reported in `skipped`. Sink failures are logged and
    /// do not affect the returned table.
    pub fn compute_relative_strength(
        &self,
        symbols: &[String],
        benchmark: &str,
        start: NaiveDate,
        end: NaiveDate,
        window: Option<usize>,
    ) -> Result<RsComputation, StrengthError> {
        let bench_bars = self.data.get_series(benchmark, start, end)?;
        if bench_bars.is_empty() {
            return Err(StrengthError::data_unavailable(
                benchmark,
                format!("benchmark has no bars between {} and {}", start, end),
            ));
        }

        let mut instruments = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            instruments.push((symbol.clone(), self.data.get_series(symbol, start, end)?));
        }

        let mut rows = Vec::new();
        let computation = relative_strength_table(&bench_bars, &instruments, window, |symbol, series| {
            rows.extend(series.points.iter().filter_map(|p| {
                p.value.map(|relative_strength| RsRow {
                    date: p.date,
                    symbol: symbol.to_string(),
                    benchmark_symbol: benchmark.to_string(),
                    relative_strength,
                })
            }));
        });

        if let Some(sink) = self.sink {
            match sink.upsert(&rows) {
                Ok(written) => debug!(benchmark, written, "persisted relative strength rows"),
                Err(e) => warn!(benchmark, error = %e, "failed to persist relative strength rows"),
            }
        }

        info!(
            benchmark,
            computed = computation.table.symbols().len(),
            skipped = computation.skipped.len(),
            rows = computation.table.row_count(),
            "relative strength computed"
        );
        Ok(computation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizationMethod {
    ZScore,
    MinMax,
    PercentileRank,
}

impl FromStr for NormalizationMethod {
    type Err = StrengthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zscore" | "z_score" => Ok(NormalizationMethod::ZScore),
            "minmax" | "min_max" => Ok(NormalizationMethod::MinMax),
            "percentile_rank" | "percent_rank" | "rank" => Ok(NormalizationMethod::PercentileRank),
            _ => Err(StrengthError::UnknownMethod {
                method: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMethod::ZScore => write!(f, "zscore"),
            NormalizationMethod::MinMax => write!(f, "minmax"),
            NormalizationMethod::PercentileRank => write!(f, "percentile_rank"),
        }
    }
}

/// Normalizes every column over its own full sample. Gaps stay gaps; a
/// column with zero variance or zero range becomes entirely undefined.
pub fn normalize(table: &WideTable, method: NormalizationMethod) -> WideTable {
    let columns = table
        .columns()
        .iter()
        .map(|column| match method {
            NormalizationMethod::ZScore => zscore(column),
            NormalizationMethod::MinMax => min_max(column),
            NormalizationMethod::PercentileRank => percentile_rank(column),
        })
        .collect();
    WideTable::from_columns(table.dates().to_vec(), table.symbols().to_vec(), columns)
}

fn zscore(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined: Vec<f64> = column.iter().flatten().copied().collect();
    if defined.len() < 2 {
        return vec![None; column.len()];
    }
    let n = defined.len() as f64;
    let mean = defined.iter().sum::<f64>() / n;
    let variance = defined.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let sd = variance.sqrt();
    if sd == 0.0 {
        return vec![None; column.len()];
    }
    column.iter().map(|v| v.map(|v| (v - mean) / sd)).collect()
}

fn min_max(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined = column.iter().flatten().copied();
    let (min, max) = defined.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    if !range.is_finite() || range == 0.0 {
        return vec![None; column.len()];
    }
    column.iter().map(|v| v.map(|v| (v - min) / range)).collect()
}

/// Average rank of each value among the defined values, divided by their count.
fn percentile_rank(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut order: Vec<(usize, f64)> = column
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    order.sort_by(|a, b| a.1.total_cmp(&b.1));

    let count = order.len() as f64;
    let mut out = vec![None; column.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && order[end + 1].1 == order[start].1 {
            end += 1;
        }
        // 1-based ranks start+1..=end+1 share their mean
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        for &(i, _) in &order[start..=end] {
            out[i] = Some(avg_rank / count);
        }
        start = end + 1;
    }
    out
}

/// Symbols ordered by their mean score over the trailing `lookback` rows,
/// best first, truncated to `top_n`.
///
/// Gaps are ignored in the mean; a symbol with no defined score in the
/// window is not ranked. Ties keep column order.
pub fn top_sectors(table: &WideTable, top_n: usize, lookback: usize) -> Vec<String> {
    let start = table.row_count().saturating_sub(lookback);
    let mut scored: Vec<(&str, f64)> = table
        .symbols()
        .iter()
        .zip(table.columns())
        .filter_map(|(symbol, column)| {
            let window: Vec<f64> = column[start..].iter().flatten().copied().collect();
            if window.is_empty() {
                None
            } else {
                Some((symbol.as_str(), window.iter().sum::<f64>() / window.len() as f64))
            }
        })
        .collect();

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored
        .into_iter()
        .take(top_n)
        .map(|(symbol, _)| symbol.to_string())
        .collect()
}

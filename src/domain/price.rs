//! Daily price bar representation.

use chrono::NaiveDate;

/// One adjusted daily bar. Unique per (symbol, date); series are ordered by date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: i64,
}

impl PriceBar {
    /// Simple return from `prev` to this bar on adjusted close.
    /// `None` when the previous price is zero.
    pub fn return_since(&self, prev: &PriceBar) -> Option<f64> {
        if prev.adjusted_close == 0.0 {
            None
        } else {
            Some(self.adjusted_close / prev.adjusted_close - 1.0)
        }
    }
}

/// Returns the bars sorted by date with duplicate dates removed (last wins).
pub fn normalize_order(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by_key(|b| b.date);
    let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
    for bar in bars {
        match out.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => out.push(bar),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(date: &str, adjusted_close: f64) -> PriceBar {
        PriceBar {
            symbol: "XLK".into(),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            open: adjusted_close,
            high: adjusted_close,
            low: adjusted_close,
            close: adjusted_close,
            adjusted_close,
            volume: 1_000,
        }
    }

    #[test]
    fn return_since_previous() {
        let a = bar("2024-01-02", 100.0);
        let b = bar("2024-01-03", 110.0);
        assert!((b.return_since(&a).unwrap() - 0.10).abs() < 1e-12);
    }

    #[test]
    fn return_since_zero_price_is_undefined() {
        let a = bar("2024-01-02", 0.0);
        let b = bar("2024-01-03", 110.0);
        assert!(b.return_since(&a).is_none());
    }

    #[test]
    fn normalize_order_sorts_and_dedups() {
        let bars = vec![
            bar("2024-01-03", 3.0),
            bar("2024-01-01", 1.0),
            bar("2024-01-03", 4.0),
        ];
        let out = normalize_order(bars);
        assert_eq!(out.len(), 2);
        assert!(out[0].date < out[1].date);
        assert_eq!(out[1].adjusted_close, 4.0);
    }
}

//! On-balance volume.

use std::cmp::Ordering;

/// Running volume flow over `prices`, seeded at 0 on the first row.
///
/// Each later row adds its volume when the price rose, subtracts it when
/// the price fell, and carries the previous total when unchanged. Every
/// row is defined.
pub fn on_balance_volume(prices: &[f64], volumes: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    let mut out = Vec::with_capacity(prices.len());
    for i in 0..prices.len().min(volumes.len()) {
        if i > 0 {
            match prices[i].partial_cmp(&prices[i - 1]) {
                Some(Ordering::Greater) => total += volumes[i],
                Some(Ordering::Less) => total -= volumes[i],
                _ => {}
            }
        }
        out.push(total);
    }
    out
}

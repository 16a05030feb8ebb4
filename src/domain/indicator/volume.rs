//! Volume-derived columns.

use super::rolling::quantile;

/// volume / volume_ma. Undefined when the average is undefined or zero.
pub fn relative_volume(volumes: &[f64], volume_ma: &[Option<f64>]) -> Vec<Option<f64>> {
    volumes
        .iter()
        .zip(volume_ma)
        .map(|(&v, ma)| match ma {
            Some(ma) if *ma != 0.0 => Some(v / ma),
            _ => None,
        })
        .collect()
}

/// Day-over-day fractional change. The first row, and any row following
/// a zero-volume day, is undefined.
pub fn volume_change(volumes: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(volumes.len());
    for (i, &v) in volumes.iter().enumerate() {
        let change = match i.checked_sub(1).map(|p| volumes[p]) {
            Some(prev) if prev != 0.0 => Some(v / prev - 1.0),
            _ => None,
        };
        out.push(change);
    }
    out
}

/// Flags rows whose volume exceeds the given quantile of the whole sample.
pub fn volume_spikes(volumes: &[f64], q: f64) -> Vec<bool> {
    match quantile(volumes, q) {
        Some(threshold) => volumes.iter().map(|&v| v > threshold).collect(),
        None => Vec::new(),
    }
}

//! Trailing-window helpers shared by the indicators.
//!
//! Every rolling output has the same length as its input. The first
//! `window - 1` entries are `None`; a window of zero or a series shorter
//! than the window yields all `None`.

/// Trailing simple mean.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for i in (window - 1)..values.len() {
        out[i] = window_mean(&values[i + 1 - window..=i]);
    }
    out
}

/// Trailing mean over optional values; a window containing any `None`
/// is itself `None`.
pub fn rolling_mean_opt(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window == 0 || values.len() < window {
        return out;
    }
    for i in (window - 1)..values.len() {
        let slice: Option<Vec<f64>> = values[i + 1 - window..=i].iter().copied().collect();
        out[i] = slice.as_deref().and_then(window_mean);
    }
    out
}

/// Neumaier-compensated mean of one window. A window of identical values
/// yields that value exactly.
fn window_mean(slice: &[f64]) -> Option<f64> {
    let (&first, rest) = slice.split_first()?;
    if rest.iter().all(|&v| v == first) {
        return Some(first);
    }
    let mut sum = 0.0_f64;
    let mut compensation = 0.0_f64;
    for &v in slice {
        let t = sum + v;
        if sum.abs() >= v.abs() {
            compensation += (sum - t) + v;
        } else {
            compensation += (v - t) + sum;
        }
        sum = t;
    }
    Some((sum + compensation) / slice.len() as f64)
}

/// Trailing sample standard deviation (ddof = 1).
///
/// A window of one has no sample variance and stays `None`.
pub fn rolling_sample_stddev(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if window < 2 || values.len() < window {
        return out;
    }

    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        let Some(mean) = window_mean(slice) else {
            continue;
        };
        let variance: f64 = slice
            .iter()
            .map(|v| {
                let diff = v - mean;
                diff * diff
            })
            .sum::<f64>()
            / (window - 1) as f64;
        out[i] = Some(variance.sqrt());
    }
    out
}

/// Quantile with linear interpolation between closest ranks.
/// `None` for an empty sample.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

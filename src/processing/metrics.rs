//! Statistical helpers for window feature extraction
//!
//! All functions skip NaN inputs (missing CSV cells) and return 0.0 instead of
//! NaN when there is too little data.

use statrs::statistics::Statistics;

/// Round to `decimals` places.
///
/// Rounds the exact binary value, so `2.675` (stored just below) goes down and
/// true ties such as `0.125` go to the even digit.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.prec$}", prec = decimals as usize).parse().unwrap_or(value)
}

/// Non-NaN values of a series.
pub fn finite_values(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    values.into_iter().filter(|v| !v.is_nan()).collect()
}

/// Arithmetic mean, 0.0 for an empty series.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().mean()
}

/// Largest value, 0.0 for an empty series.
pub fn max(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Sample variance (n - 1 denominator), 0.0 with fewer than two values.
pub fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let v = values.iter().variance();
    if v.is_finite() { v } else { 0.0 }
}

/// Mean of `|Δx / dt|` over consecutive samples.
///
/// Pairs touching a NaN are skipped. Fewer than two samples gives 0.0.
pub fn mean_abs_rate(values: &[f64], dt: f64) -> f64 {
    let rates: Vec<f64> = values
        .windows(2)
        .map(|w| ((w[1] - w[0]) / dt).abs())
        .filter(|r| !r.is_nan())
        .collect();
    mean(&rates)
}

/// Count local maxima strictly above `height`.
///
/// A flat top counts as one peak. The first and last samples are never peaks,
/// and NaN samples are dropped before the search.
pub fn count_peaks(signal: &[f64], height: f64) -> u32 {
    let x = finite_values(signal.iter().copied());
    if x.len() < 3 {
        return 0;
    }

    let last = x.len() - 1;
    let mut peaks = 0;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            // Walk across a plateau
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                if x[i] > height {
                    peaks += 1;
                }
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

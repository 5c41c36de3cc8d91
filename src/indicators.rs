//! Rolling-window statistics over price and return series.
//!
//! # Conventions
//!
//! - Input slices are `&[f64]`, oldest first.
//! - Functions return `None` instead of NaN when there is not enough history.
//! - Standard deviations are sample (n − 1), matching pandas' default.

// ---------------------------------------------------------------------------
// Point values at the latest observation
// ---------------------------------------------------------------------------

/// SMA of the trailing `period` values, or `None` with too little history.
///
/// Only the last window is summed, so this is O(period) regardless of the
/// series length.
///
/// # Example
///
/// ```
/// use folio::indicators::last_sma;
///
/// assert_eq!(last_sma(&[1.0, 2.0, 3.0, 4.0], 2), Some(3.5));
/// assert_eq!(last_sma(&[1.0], 2), None);
/// ```
pub fn last_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let avg = window.iter().sum::<f64>() / period as f64;
    avg.is_finite().then_some(avg)
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n − 1), `None` with fewer than two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n as f64 - 1.0);
    Some(var.max(0.0).sqrt())
}

/// Sample standard deviation of the trailing `window` values (or all of them
/// when fewer are available).
pub fn trailing_std(values: &[f64], window: usize) -> Option<f64> {
    let start = values.len().saturating_sub(window);
    sample_std(&values[start..])
}

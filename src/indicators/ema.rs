// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// EMA gives more weight to recent closes than the SMA of the same window.
//
// Formula:
//   alpha  = 2 / (period + 1)
//   EMA_t  = alpha * x_t + (1 - alpha) * EMA_{t-1}
//
// The series is seeded with the SMA of the first `period` observations, so the
// first output lines up with input index `period - 1`.
// =============================================================================

/// Compute the EMA series of `values` for look-back `period`.
///
/// Returns an empty `Vec` when `period == 0` or there are fewer than `period`
/// values.  A non-finite intermediate value truncates the series at that
/// point; downstream consumers should not trust a broken tail.
pub fn calculate_ema(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);

    let seed = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - period + 1);
    out.push(seed);

    let mut prev = seed;
    for &x in &values[period..] {
        let next = alpha * x + (1.0 - alpha) * prev;
        if !next.is_finite() {
            break;
        }
        out.push(next);
        prev = next;
    }

    out
}

/// Most recent EMA value, or `None` on insufficient data.
pub fn latest_ema(values: &[f64], period: usize) -> Option<f64> {
    calculate_ema(values, period).last().copied()
}

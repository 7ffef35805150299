// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================
//
// Arithmetic mean of the last `period` observations.  Windows count bars, not
// calendar days: a holiday gap simply isn't in the slice.

/// SMA of the trailing `period` values.
///
/// The window is summed from scratch, so the result depends only on the last
/// `period` values and never on rounding carried over from earlier windows.
pub fn latest_sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_uses_trailing_window_only() {
        let values: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        assert!((latest_sma(&values, 4).unwrap() - 8.5).abs() < 1e-12);
        assert!((latest_sma(&values[..4], 4).unwrap() - 2.5).abs() < 1e-12);
        assert!((latest_sma(&values, 10).unwrap() - 5.5).abs() < 1e-12);
    }

    #[test]
    fn sma_insufficient_data() {
        assert_eq!(latest_sma(&[1.0, 2.0], 3), None);
        assert_eq!(latest_sma(&[1.0, 2.0], 0), None);
    }
}

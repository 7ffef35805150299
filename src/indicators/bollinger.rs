// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Middle band is the SMA, upper/lower are SMA ± k·σ with σ the population
// standard deviation of the same window.
//
//   width    = (upper - lower) / middle
//   position = (close - lower) / (upper - lower)
//
// `position` is 0 at the lower band, 1 at the upper band and may leave [0, 1]
// when the close breaks out.

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub width: f64,
    /// `None` when the bands collapse (σ = 0).
    pub position: Option<f64>,
}

/// Bollinger Bands over the trailing `period` closes.
///
/// Returns `None` when:
/// - Fewer than `period` data points.
/// - Middle band is zero (degenerate input).
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;
    if middle == 0.0 {
        return None;
    }

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    let width = (upper - lower) / middle;
    if !width.is_finite() {
        return None;
    }

    let close = window[period - 1];
    let span = upper - lower;
    let position = (span > 0.0).then(|| (close - lower) / span);

    Some(BollingerResult {
        upper,
        middle,
        lower,
        width,
        position,
    })
}

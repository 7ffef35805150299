// =============================================================================
// Average True Range (ATR) — Wilder's Smoothing
// =============================================================================
//
// True Range for bar i (i >= 1):
//   TR_i = max(high_i - low_i, |high_i - close_{i-1}|, |low_i - close_{i-1}|)
//
// Seed ATR = mean of the first `period` true ranges, then
//   ATR_i = (ATR_{i-1} * (period - 1) + TR_i) / period
// =============================================================================

use crate::types::Bar;

/// Wilder ATR of the bar series.  Needs `period + 1` bars because the first
/// bar has no previous close.
pub fn calculate_atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period + 1 {
        return None;
    }

    let true_ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            let (prev, cur) = (&w[0], &w[1]);
            (cur.high - cur.low)
                .max((cur.high - prev.close).abs())
                .max((cur.low - prev.close).abs())
        })
        .collect();

    let n = period as f64;
    let mut atr = true_ranges[..period].iter().sum::<f64>() / n;
    for &tr in &true_ranges[period..] {
        atr = (atr * (n - 1.0) + tr) / n;
    }

    atr.is_finite().then_some(atr)
}

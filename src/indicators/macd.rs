// =============================================================================
// MACD — Moving Average Convergence / Divergence
// =============================================================================
//
//   macd      = EMA_fast(close) - EMA_slow(close)
//   signal    = EMA_signal(macd)
//   histogram = macd - signal
//
// Both EMAs are seeded with their SMA (see `ema.rs`), so the MACD line starts
// at close index `slow - 1` and the signal line `signal - 1` bars later.

use super::ema::calculate_ema;

/// Latest MACD reading.  `signal` and `histogram` are `None` until the MACD
/// line itself is long enough to seed the signal EMA.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// MACD line aligned to the slow EMA (first element = close index `slow - 1`).
pub fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    if fast == 0 || fast >= slow {
        return Vec::new();
    }
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_slow.is_empty() {
        return Vec::new();
    }
    // ema_fast[k] belongs to close index k + fast - 1; ema_slow[j] to j + slow - 1.
    let offset = slow - fast;
    ema_slow
        .iter()
        .enumerate()
        .filter_map(|(j, s)| ema_fast.get(j + offset).map(|f| f - s))
        .collect()
}

pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdResult> {
    let line = macd_line(closes, fast, slow);
    let macd = *line.last()?;

    let signal = calculate_ema(&line, signal_period).last().copied();
    let histogram = signal.map(|s| macd - s);

    Some(MacdResult {
        macd,
        signal,
        histogram,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macd_requires_slow_window() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
        assert!(calculate_macd(&closes, 26, 12, 9).is_none());
    }

    #[test]
    fn macd_without_signal_on_short_series() {
        // 30 closes -> MACD line of 5 values, not enough for a 9-period signal.
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let r = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(r.macd > 0.0, "rising series must have fast EMA above slow");
        assert!(r.signal.is_none());
        assert!(r.histogram.is_none());
    }

    #[test]
    fn macd_line_is_difference_of_emas() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.2).sin() * 5.0).collect();
        let line = macd_line(&closes, 12, 26);
        assert_eq!(line.len(), 60 - 26 + 1);

        let fast = calculate_ema(&closes, 12);
        let slow = calculate_ema(&closes, 26);
        let expected = fast.last().unwrap() - slow.last().unwrap();
        assert!((line.last().unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn flat_series_has_zero_histogram() {
        let r = calculate_macd(&[20.0; 60], 12, 26, 9).unwrap();
        assert!(r.macd.abs() < 1e-12);
        assert!(r.histogram.unwrap().abs() < 1e-12);
    }
}

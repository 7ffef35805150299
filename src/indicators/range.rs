// =============================================================================
// Range & volume context
// =============================================================================
//
// 52-week high/low over the last 252 observations and the close's position
// inside that range, plus the last session's volume against its recent mean.

use crate::types::Bar;

/// Trading sessions in a year.
pub const SESSIONS_PER_YEAR: usize = 252;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearRange {
    pub high: f64,
    pub low: f64,
    /// 0 at the low, 1 at the high; `None` when high == low.
    pub position: Option<f64>,
}

/// High/low over the trailing 252 bars.  Short series use what they have, so
/// callers decide whether a partial year is meaningful.
pub fn year_range(bars: &[Bar]) -> Option<YearRange> {
    let last = bars.last()?;
    let window = &bars[bars.len().saturating_sub(SESSIONS_PER_YEAR)..];

    let high = window.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let low = window.iter().map(|b| b.low).fold(f64::MAX, f64::min);

    let span = high - low;
    let position = (span > 0.0).then(|| (last.close - low) / span);

    Some(YearRange {
        high,
        low,
        position,
    })
}

/// Last volume divided by the mean volume of the trailing `window` bars
/// (the last bar included).
pub fn volume_ratio(bars: &[Bar], window: usize) -> Option<f64> {
    if window == 0 || bars.len() < window {
        return None;
    }
    let recent = &bars[bars.len() - window..];
    let mean = recent.iter().map(|b| b.volume as f64).sum::<f64>() / window as f64;
    if mean <= 0.0 {
        return None;
    }
    let last = recent[window - 1].volume as f64;
    Some(last / mean)
}

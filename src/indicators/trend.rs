// =============================================================================
// Trend structure
// =============================================================================
//
// - trend strength: least-squares slope over the trailing window, scaled by
//   window length / price range and clamped to [-1, 1]
// - support / resistance: nearest 5-bar local extremes around the close
// - classification: a small integer score mapped onto `TrendClass`
// =============================================================================

use crate::types::{Bar, TrendClass};

/// Half-width of the centred window used to spot local highs and lows.
const EXTREMUM_RADIUS: usize = 2;

/// Fallback distance for support/resistance when no extreme qualifies.
const DEFAULT_BAND: f64 = 0.05;

/// Slope of the trailing `window` closes, normalised so a straight line from
/// the window's low to its high scores ±1.
///
/// `Some(0.0)` for a flat window; `None` only when there aren't enough closes.
pub fn trend_strength(closes: &[f64], window: usize) -> Option<f64> {
    if window < 2 || closes.len() < window {
        return None;
    }
    let y = &closes[closes.len() - window..];
    let n = window as f64;

    let mean_x = (n - 1.0) / 2.0;
    let mean_y = y.iter().sum::<f64>() / n;
    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &v) in y.iter().enumerate() {
        let dx = i as f64 - mean_x;
        sxy += dx * (v - mean_y);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;

    let max = y.iter().copied().fold(f64::MIN, f64::max);
    let min = y.iter().copied().fold(f64::MAX, f64::min);
    let range = max - min;
    if range <= 0.0 {
        return Some(0.0);
    }

    let strength = (slope * n / range).clamp(-1.0, 1.0);
    strength.is_finite().then_some(strength)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportResistance {
    pub support: f64,
    pub resistance: f64,
}

/// Nearest local low below and local high above the last close over the
/// trailing `window` bars.
///
/// A bar is a local high when its high equals the max of the 5 bars centred on
/// it (same for lows); edge bars without a full neighbourhood never qualify.
/// Missing levels fall back to close ∓ 5 %.
pub fn support_resistance(bars: &[Bar], window: usize) -> Option<SupportResistance> {
    let close = bars.last()?.close;
    let recent = &bars[bars.len().saturating_sub(window)..];

    let mut support = None::<f64>;
    let mut resistance = None::<f64>;

    let span = 2 * EXTREMUM_RADIUS + 1;
    for (offset, hood) in recent.windows(span).enumerate() {
        let centre = &recent[offset + EXTREMUM_RADIUS];

        let hood_high = hood.iter().map(|b| b.high).fold(f64::MIN, f64::max);
        if centre.high == hood_high && centre.high > close {
            resistance = Some(resistance.map_or(centre.high, |r| r.min(centre.high)));
        }

        let hood_low = hood.iter().map(|b| b.low).fold(f64::MAX, f64::min);
        if centre.low == hood_low && centre.low < close {
            support = Some(support.map_or(centre.low, |s| s.max(centre.low)));
        }
    }

    Some(SupportResistance {
        support: support.unwrap_or(close * (1.0 - DEFAULT_BAND)),
        resistance: resistance.unwrap_or(close * (1.0 + DEFAULT_BAND)),
    })
}

/// Inputs to [`classify`]; any missing piece simply doesn't vote.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendInputs {
    pub close: f64,
    pub sma_short: Option<f64>,
    pub sma_long: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
}

/// Score in [-4, 4]:
///   ±1 short SMA above/below long SMA
///   ±1 close above/below short SMA
///   ±1 close above/below middle band
///   ±1 close outside the upper/lower band
pub fn trend_score(inputs: &TrendInputs) -> i32 {
    let vote = |a: f64, b: f64| -> i32 {
        if a > b {
            1
        } else if a < b {
            -1
        } else {
            0
        }
    };

    let mut score = 0;
    if let (Some(short), Some(long)) = (inputs.sma_short, inputs.sma_long) {
        score += vote(short, long);
    }
    if let Some(short) = inputs.sma_short {
        score += vote(inputs.close, short);
    }
    if let Some(middle) = inputs.bb_middle {
        score += vote(inputs.close, middle);
    }
    if inputs.bb_upper.is_some_and(|u| inputs.close > u) {
        score += 1;
    }
    if inputs.bb_lower.is_some_and(|l| inputs.close < l) {
        score -= 1;
    }
    score
}

pub fn classify(inputs: &TrendInputs) -> TrendClass {
    match trend_score(inputs) {
        s if s >= 3 => TrendClass::StrongUptrend,
        1..=2 => TrendClass::Uptrend,
        0 => TrendClass::Sideways,
        -2..=-1 => TrendClass::Downtrend,
        _ => TrendClass::StrongDowntrend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn bars_from(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Bar> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        (0..closes.len())
            .map(|i| Bar {
                timestamp: start + Duration::days(i as i64),
                open: closes[i],
                high: highs[i],
                low: lows[i],
                close: closes[i],
                volume: 10,
            })
            .collect()
    }

    #[test]
    fn straight_line_scores_one() {
        let up: Vec<f64> = (0..20).map(|i| 50.0 + i as f64).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        // slope 1, range 19, n 20 -> 20/19 clamped to 1.
        assert_eq!(trend_strength(&up, 20), Some(1.0));
        assert_eq!(trend_strength(&down, 20), Some(-1.0));
        assert_eq!(trend_strength(&[5.0; 20], 20), Some(0.0));
        assert_eq!(trend_strength(&up[..10], 20), None);
    }

    #[test]
    fn support_resistance_picks_nearest_extremes() {
        let highs = [10.0, 11.0, 15.0, 11.0, 10.0, 10.5, 13.0, 10.5, 10.0, 10.0, 12.2];
        let lows = [9.0, 8.0, 9.0, 9.5, 9.0, 6.0, 9.0, 9.0, 8.5, 9.5, 11.8];
        let closes = [9.5, 9.5, 12.0, 10.0, 9.5, 9.0, 12.0, 10.0, 9.5, 9.8, 12.0];
        let sr = support_resistance(&bars_from(&highs, &lows, &closes), 50).unwrap();
        // Local highs at 15 and 13: nearest above 12 is 13.
        assert_eq!(sr.resistance, 13.0);
        // Local lows at 8 (index 1 is an edge, skipped), 6 and 8.5: nearest below is 8.5.
        assert_eq!(sr.support, 8.5);
    }

    #[test]
    fn support_resistance_defaults_to_five_percent() {
        let b = bars_from(&[101.0; 3], &[99.0; 3], &[100.0; 3]);
        let sr = support_resistance(&b, 50).unwrap();
        assert!((sr.support - 95.0).abs() < 1e-9);
        assert!((sr.resistance - 105.0).abs() < 1e-9);
        assert!(support_resistance(&[], 50).is_none());
    }

    #[test]
    fn classification_thresholds() {
        let strong_up = TrendInputs {
            close: 120.0,
            sma_short: Some(110.0),
            sma_long: Some(100.0),
            bb_upper: Some(118.0),
            bb_middle: Some(110.0),
            bb_lower: Some(102.0),
        };
        assert_eq!(trend_score(&strong_up), 4);
        assert_eq!(classify(&strong_up), TrendClass::StrongUptrend);

        let mild_down = TrendInputs {
            close: 99.0,
            sma_short: Some(100.0),
            sma_long: Some(100.0),
            ..Default::default()
        };
        assert_eq!(classify(&mild_down), TrendClass::Downtrend);

        let strong_down = TrendInputs {
            close: 80.0,
            sma_short: Some(90.0),
            sma_long: Some(100.0),
            bb_upper: Some(98.0),
            bb_middle: Some(90.0),
            bb_lower: Some(82.0),
        };
        assert_eq!(classify(&strong_down), TrendClass::StrongDowntrend);

        let nothing = TrendInputs {
            close: 50.0,
            ..Default::default()
        };
        assert_eq!(classify(&nothing), TrendClass::Sideways);
    }
}

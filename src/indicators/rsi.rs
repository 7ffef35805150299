// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing
// =============================================================================
//
// Step 1 — Price changes (deltas) between consecutive closes.
// Step 2 — Seed average gain / average loss with the plain mean of the first
//          `period` gains / losses.
// Step 3 — Wilder smoothing for every later delta:
//            avg = (prev_avg * (period - 1) + current) / period
// Step 4 — RSI = 100 - 100 / (1 + avg_gain / avg_loss)
// =============================================================================

/// Full RSI series for `closes` with look-back `period`.
///
/// One value per close starting at index `period`.  Empty when
/// `period == 0` or there are fewer than `period + 1` closes.
pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (gain_sum, loss_sum) = deltas[..period]
        .iter()
        .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            if d > 0.0 {
                (g + d, l)
            } else {
                (g, l - d)
            }
        });

    let n = period as f64;
    let mut avg_gain = gain_sum / n;
    let mut avg_loss = loss_sum / n;

    let mut out = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_from_averages(avg_gain, avg_loss) {
        Some(v) => out.push(v),
        None => return out,
    }

    for &d in &deltas[period..] {
        let gain = d.max(0.0);
        let loss = (-d).max(0.0);
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(v) => out.push(v),
            None => break,
        }
    }

    out
}

/// Most recent RSI value.
pub fn latest_rsi(closes: &[f64], period: usize) -> Option<f64> {
    calculate_rsi(closes, period).last().copied()
}

/// 50 when nothing moved, 100 when nothing fell, `None` if non-finite.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_gain == 0.0 && avg_loss == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    };
    rsi.is_finite().then_some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rsi_needs_period_plus_one_closes() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(calculate_rsi(&closes, 14).is_empty());
        assert!(calculate_rsi(&closes, 0).is_empty());
        assert_eq!(calculate_rsi(&closes, 13).len(), 1);
    }

    #[test]
    fn rsi_extremes() {
        let up: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let down: Vec<f64> = up.iter().rev().copied().collect();
        assert!(calculate_rsi(&up, 14).iter().all(|&v| (v - 100.0).abs() < 1e-10));
        assert!(calculate_rsi(&down, 14).iter().all(|&v| v.abs() < 1e-10));
        assert_eq!(latest_rsi(&[100.0; 30], 14), Some(50.0));
    }

    #[test]
    fn rsi_stays_in_range() {
        let closes = [
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let series = calculate_rsi(&closes, 14);
        assert_eq!(series.len(), 4);
        for v in series {
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }
}

// =============================================================================
// Performance & Risk Metrics
// =============================================================================
//
// All metrics are computed from simple daily returns r_t = c_t / c_{t-1} - 1.
//
//   volatility  = stdev(r) * sqrt(252)                       (sample stdev)
//   sharpe      = (mean(r) * 252 - rf) / volatility
//   sortino     = (mean(r) * 252 - rf) / (stdev(r | r < 0) * sqrt(252))
//   max drawdown = min_t (c_t / max_{s<=t} c_s - 1)             (<= 0)
//   VaR 95      = 5th percentile of r (linear interpolation)
//
// Lookback returns use observation counts: 1w = 5, 1m = 21, 3m = 63,
// 6m = 126, 1y = 252.
// =============================================================================

use super::range::SESSIONS_PER_YEAR;

/// Lookback horizons as `(name, observations)`.
pub const LOOKBACKS: [(&str, usize); 5] = [
    ("1w", 5),
    ("1m", 21),
    ("3m", 63),
    ("6m", 126),
    ("1y", 252),
];

/// Below this many daily returns the risk metrics are too noisy to report.
pub const MIN_RISK_RETURNS: usize = 11;

/// Return over the last `lookback` observations.  Needs `lookback + 1` closes.
pub fn lookback_return(closes: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || closes.len() <= lookback {
        return None;
    }
    let base = closes[closes.len() - 1 - lookback];
    let last = closes[closes.len() - 1];
    (base > 0.0).then(|| (last - base) / base)
}

/// Return across the whole series, first close to last close.
pub fn period_return(closes: &[f64]) -> Option<f64> {
    if closes.len() < 2 {
        return None;
    }
    lookback_return(closes, closes.len() - 1)
}

pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs);
    let var = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (xs.len() - 1) as f64;
    Some(var.sqrt())
}

/// Annualised volatility of daily returns.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    sample_std(returns).map(|s| s * (SESSIONS_PER_YEAR as f64).sqrt())
}

/// Deepest peak-to-trough decline as a non-positive fraction.
pub fn max_drawdown(closes: &[f64]) -> Option<f64> {
    let first = *closes.first()?;
    let mut peak = first;
    let mut worst = 0.0_f64;
    for &c in closes {
        peak = peak.max(c);
        if peak > 0.0 {
            worst = worst.min(c / peak - 1.0);
        }
    }
    Some(worst)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile(xs: &[f64], q: f64) -> Option<f64> {
    if xs.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(f64::total_cmp);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMetrics {
    pub volatility: f64,
    pub sharpe: Option<f64>,
    pub sortino: Option<f64>,
    pub max_drawdown: f64,
    pub var_95: f64,
}

/// Risk block over the whole close series.  `None` with fewer than
/// [`MIN_RISK_RETURNS`] daily returns.  Ratios are `None` when their
/// denominator is zero.
pub fn risk_metrics(closes: &[f64], risk_free_rate: f64) -> Option<RiskMetrics> {
    let returns = daily_returns(closes);
    if returns.len() < MIN_RISK_RETURNS {
        return None;
    }

    let annual = (SESSIONS_PER_YEAR as f64).sqrt();
    let volatility = annualized_volatility(&returns)?;
    let excess = mean(&returns) * SESSIONS_PER_YEAR as f64 - risk_free_rate;

    let sharpe = (volatility > 0.0).then(|| excess / volatility);

    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    let sortino = sample_std(&downside)
        .map(|s| s * annual)
        .filter(|d| *d > 0.0)
        .map(|d| excess / d);

    Some(RiskMetrics {
        volatility,
        sharpe,
        sortino,
        max_drawdown: max_drawdown(closes)?,
        var_95: quantile(&returns, 0.05)?,
    })
}

/// 0–100 momentum score, 50 neutral.  Each available lookback return adds a
/// weighted contribution; shorter horizons weigh more.
pub fn momentum_score(returns: &[(usize, f64)]) -> f64 {
    const WEIGHTS: [(usize, f64); 5] = [(5, 0.3), (21, 0.3), (63, 0.2), (126, 0.1), (252, 0.1)];

    let mut score = 50.0;
    for &(lookback, ret) in returns {
        let Some(&(_, weight)) = WEIGHTS.iter().find(|(l, _)| *l == lookback) else {
            continue;
        };
        let contribution = match ret {
            r if r > 0.20 => 25.0,
            r if r > 0.10 => 15.0,
            r if r > 0.05 => 10.0,
            r if r > 0.0 => 5.0,
            r if r > -0.05 => -5.0,
            r if r > -0.10 => -10.0,
            _ => -20.0,
        };
        score += contribution * weight;
    }
    score.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookback_needs_one_extra_close() {
        let closes = [100.0, 101.0, 102.0, 103.0, 104.0, 110.0];
        assert!((lookback_return(&closes, 5).unwrap() - 0.10).abs() < 1e-12);
        assert!(lookback_return(&closes[1..], 5).is_none());
        assert!((period_return(&closes).unwrap() - 0.10).abs() < 1e-12);
        assert!(period_return(&[100.0]).is_none());
    }

    #[test]
    fn volatility_of_alternating_returns() {
        // +1% / -1% alternating: mean ~0, sample stdev ~1%.
        let mut closes = vec![100.0];
        for i in 0..40 {
            let last = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { last * 1.01 } else { last * 0.99 });
        }
        let vol = annualized_volatility(&daily_returns(&closes)).unwrap();
        let expected = 0.01 * (40.0_f64 / 39.0).sqrt() * 252.0_f64.sqrt();
        assert!((vol - expected).abs() < 1e-9, "vol {vol} vs {expected}");
    }

    #[test]
    fn drawdown_from_peak() {
        let closes = [100.0, 120.0, 90.0, 130.0, 117.0];
        assert!((max_drawdown(&closes).unwrap() + 0.25).abs() < 1e-12);
        assert_eq!(max_drawdown(&[1.0, 2.0, 3.0]), Some(0.0));
        assert!(max_drawdown(&[]).is_none());
    }

    #[test]
    fn quantile_interpolates() {
        let xs = [5.0, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(quantile(&xs, 0.0), Some(1.0));
        assert_eq!(quantile(&xs, 1.0), Some(5.0));
        assert_eq!(quantile(&xs, 0.5), Some(3.0));
        assert!((quantile(&xs, 0.05).unwrap() - 1.2).abs() < 1e-12);
    }

    #[test]
    fn risk_metrics_need_enough_returns() {
        let closes: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
        assert!(risk_metrics(&closes, 0.02).is_none());

        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let m = risk_metrics(&closes, 0.02).unwrap();
        assert!(m.sharpe.unwrap() > 0.0);
        // No down days: no downside deviation, no Sortino.
        assert!(m.sortino.is_none());
        assert_eq!(m.max_drawdown, 0.0);
        assert!(m.var_95 > 0.0);
    }

    #[test]
    fn momentum_score_weights_and_clamps() {
        assert_eq!(momentum_score(&[]), 50.0);
        // 0.3 * 25 + 0.3 * 15 = 12
        assert!((momentum_score(&[(5, 0.25), (21, 0.12)]) - 62.0).abs() < 1e-12);
        let all_bad: Vec<(usize, f64)> = LOOKBACKS.iter().map(|(_, n)| (*n, -0.5)).collect();
        assert!((momentum_score(&all_bad) - 30.0).abs() < 1e-12);
        // Unknown horizons are ignored.
        assert_eq!(momentum_score(&[(7, 0.5)]), 50.0);
    }
}

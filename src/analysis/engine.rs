// =============================================================================
// Indicator Engine
// =============================================================================
//
// Turns a validated `PriceSeries` into one `AnalysisResult` keyed by the date
// of its last bar.  Pure: no I/O, no clock reads in `analyze_at`, and the
// indicator map is a `BTreeMap` so serialisation order is stable too.
//
// Indicator names:
//   sma_{n} ema_{n} rsi_{n} atr_{n}
//   macd macd_signal macd_histogram
//   bb_upper bb_middle bb_lower bb_width bb_position
//   volume_ratio high_52w low_52w position_52w
//   trend_strength support resistance
//   return_1w return_1m return_3m return_6m return_1y period_return
//   volatility_annualized sharpe_ratio sortino_ratio max_drawdown var_95
//   momentum_score close
//
// An indicator whose window is longer than the series is left out rather
// than padded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{debug, trace};

use crate::indicators::atr::calculate_atr;
use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::ema::latest_ema;
use crate::indicators::macd::calculate_macd;
use crate::indicators::performance::{self, LOOKBACKS};
use crate::indicators::range::{volume_ratio, year_range};
use crate::indicators::rsi::latest_rsi;
use crate::indicators::sma::latest_sma;
use crate::indicators::trend::{classify, support_resistance, trend_strength, TrendInputs};
use crate::runtime_config::IndicatorConfig;
use crate::types::{AnalysisResult, PriceSeries, SkippedReason};

#[derive(Debug, Clone)]
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Self {
        Self { config }
    }

    /// Analyse `series`, stamping the result with the current time.
    pub fn analyze(&self, series: &PriceSeries) -> Result<AnalysisResult, SkippedReason> {
        self.analyze_at(series, Utc::now())
    }

    /// Analyse `series` with an explicit `derived_at`.  Identical inputs give
    /// bit-identical outputs.
    pub fn analyze_at(
        &self,
        series: &PriceSeries,
        derived_at: DateTime<Utc>,
    ) -> Result<AnalysisResult, SkippedReason> {
        let cfg = &self.config;
        let required = cfg.min_data_points.max(1);

        let last = match series.bars.last() {
            Some(bar) if series.len() >= required => *bar,
            _ => {
                debug!(
                    symbol = %series.ticker,
                    bars = series.len(),
                    required,
                    "skipping analysis: not enough bars"
                );
                return Err(SkippedReason::InsufficientData {
                    required,
                    available: series.len(),
                });
            }
        };

        let closes = series.closes();
        let bars = &series.bars;
        let mut out = BTreeMap::new();

        // ── Moving averages ──────────────────────────────────────────────
        let mut smas = Vec::with_capacity(cfg.sma_windows.len());
        for &n in &cfg.sma_windows {
            let v = latest_sma(&closes, n);
            insert(&mut out, format!("sma_{n}"), v);
            smas.push((n, v));
        }
        for &n in &cfg.ema_windows {
            insert(&mut out, format!("ema_{n}"), latest_ema(&closes, n));
        }

        // ── Oscillators ──────────────────────────────────────────────────
        insert(
            &mut out,
            format!("rsi_{}", cfg.rsi_period),
            latest_rsi(&closes, cfg.rsi_period),
        );

        if let Some(m) = calculate_macd(&closes, cfg.macd_fast, cfg.macd_slow, cfg.macd_signal) {
            insert(&mut out, "macd", Some(m.macd));
            insert(&mut out, "macd_signal", m.signal);
            insert(&mut out, "macd_histogram", m.histogram);
        }

        // ── Volatility ───────────────────────────────────────────────────
        let bb = calculate_bollinger(&closes, cfg.bollinger_period, cfg.bollinger_k);
        if let Some(bb) = bb {
            insert(&mut out, "bb_upper", Some(bb.upper));
            insert(&mut out, "bb_middle", Some(bb.middle));
            insert(&mut out, "bb_lower", Some(bb.lower));
            insert(&mut out, "bb_width", Some(bb.width));
            insert(&mut out, "bb_position", bb.position);
        }
        insert(
            &mut out,
            format!("atr_{}", cfg.atr_period),
            calculate_atr(bars, cfg.atr_period),
        );

        // ── Range & volume ───────────────────────────────────────────────
        insert(&mut out, "volume_ratio", volume_ratio(bars, cfg.volume_window));
        if let Some(yr) = year_range(bars) {
            insert(&mut out, "high_52w", Some(yr.high));
            insert(&mut out, "low_52w", Some(yr.low));
            insert(&mut out, "position_52w", yr.position);
        }

        // ── Trend structure ──────────────────────────────────────────────
        insert(
            &mut out,
            "trend_strength",
            trend_strength(&closes, cfg.trend_window),
        );
        if let Some(sr) = support_resistance(bars, cfg.support_window) {
            insert(&mut out, "support", Some(sr.support));
            insert(&mut out, "resistance", Some(sr.resistance));
        }

        // ── Performance ──────────────────────────────────────────────────
        let mut horizon_returns = Vec::with_capacity(LOOKBACKS.len());
        for (name, n) in LOOKBACKS {
            let r = performance::lookback_return(&closes, n);
            insert(&mut out, format!("return_{name}"), r);
            if let Some(r) = r {
                horizon_returns.push((n, r));
            }
        }
        insert(&mut out, "period_return", performance::period_return(&closes));
        if let Some(risk) = performance::risk_metrics(&closes, cfg.risk_free_rate) {
            insert(&mut out, "volatility_annualized", Some(risk.volatility));
            insert(&mut out, "sharpe_ratio", risk.sharpe);
            insert(&mut out, "sortino_ratio", risk.sortino);
            insert(&mut out, "max_drawdown", Some(risk.max_drawdown));
            insert(&mut out, "var_95", Some(risk.var_95));
        }
        insert(
            &mut out,
            "momentum_score",
            Some(performance::momentum_score(&horizon_returns)),
        );
        insert(&mut out, "close", Some(last.close));

        // ── Classification ───────────────────────────────────────────────
        let (sma_short, sma_long) = short_long(&smas);
        let trend = classify(&TrendInputs {
            close: last.close,
            sma_short,
            sma_long,
            bb_upper: bb.map(|b| b.upper),
            bb_middle: bb.map(|b| b.middle),
            bb_lower: bb.map(|b| b.lower),
        });

        trace!(
            symbol = %series.ticker,
            as_of = %last.timestamp,
            indicators = out.len(),
            %trend,
            "analysis computed"
        );

        Ok(AnalysisResult {
            symbol: series.ticker.clone(),
            as_of: last.timestamp,
            indicators: out,
            trend,
            bars_used: series.len(),
            derived_at,
        })
    }
}

/// Shortest and longest configured SMA windows.  With a single window there
/// is no ordering vote, only the close-vs-SMA one.
fn short_long(smas: &[(usize, Option<f64>)]) -> (Option<f64>, Option<f64>) {
    let short = smas.iter().min_by_key(|(n, _)| *n);
    let long = smas.iter().max_by_key(|(n, _)| *n);
    match (short, long) {
        (Some(&(s, sv)), Some(&(l, lv))) if s != l => (sv, lv),
        (Some(&(_, sv)), _) => (sv, None),
        _ => (None, None),
    }
}

fn insert(map: &mut BTreeMap<String, f64>, name: impl Into<String>, value: Option<f64>) {
    if let Some(v) = value.filter(|v| v.is_finite()) {
        map.insert(name.into(), v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Bar, TrendClass};
    use chrono::{Duration, NaiveDate, TimeZone};

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        PriceSeries {
            ticker: "RY.TO".into(),
            bars: closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar {
                    timestamp: start + Duration::days(i as i64),
                    open: c,
                    high: c * 1.01,
                    low: c * 0.99,
                    close: c,
                    volume: 10_000 + i as u64,
                })
                .collect(),
        }
    }

    fn engine() -> IndicatorEngine {
        IndicatorEngine::new(IndicatorConfig::default())
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn fewer_bars_than_minimum_is_skipped() {
        let s = series(&[100.0; 15]);
        let err = engine().analyze_at(&s, fixed_time()).unwrap_err();
        assert_eq!(
            err,
            SkippedReason::InsufficientData {
                required: 20,
                available: 15
            }
        );
        assert!(engine().analyze(&series(&[])).is_err());
    }

    #[test]
    fn thirty_bars_report_short_windows_only() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let r = engine().analyze_at(&series(&closes), fixed_time()).unwrap();

        assert_eq!(r.as_of, NaiveDate::from_ymd_opt(2023, 1, 31).unwrap());
        assert_eq!(r.bars_used, 30);
        // SMA(20) over closes 11..=30 is 20.5.
        assert!((r.indicator("sma_20").unwrap() - 20.5).abs() < 1e-12);
        assert!(r.indicator("sma_50").is_none());
        assert!(r.indicator("sma_200").is_none());
        assert!(r.indicator("ema_12").is_some());
        assert!(r.indicator("rsi_14").is_some());
        assert!(r.indicator("macd").is_some());
        assert!(r.indicator("macd_signal").is_none());
        assert!(r.indicator("return_1y").is_none());
        assert_eq!(r.indicator("close"), Some(30.0));
    }

    #[test]
    fn same_input_same_output() {
        let closes: Vec<f64> = (0..300)
            .map(|i| 100.0 + (i as f64 * 0.07).sin() * 8.0 + i as f64 * 0.05)
            .collect();
        let s = series(&closes);
        let a = engine().analyze_at(&s, fixed_time()).unwrap();
        let b = engine().analyze_at(&s, fixed_time()).unwrap();
        assert_eq!(a, b);
        for (k, v) in &a.indicators {
            assert_eq!(v.to_bits(), b.indicators[k].to_bits(), "{k} differs");
        }
        for name in ["sma_200", "macd_signal", "return_1y", "var_95", "bb_position"] {
            assert!(a.indicator(name).is_some(), "{name} missing");
        }
    }

    #[test]
    fn rising_series_classifies_as_uptrend() {
        let closes: Vec<f64> = (0..260).map(|i| 50.0 * 1.004_f64.powi(i)).collect();
        let r = engine().analyze_at(&series(&closes), fixed_time()).unwrap();
        assert!(matches!(
            r.trend,
            TrendClass::Uptrend | TrendClass::StrongUptrend
        ));
        assert!(r.indicator("trend_strength").unwrap() > 0.9);
        assert!(r.indicator("momentum_score").unwrap() > 50.0);
    }

    #[test]
    fn declining_series_classifies_as_downtrend() {
        let closes: Vec<f64> = (0..260).map(|i| 200.0 * 0.996_f64.powi(i)).collect();
        let r = engine().analyze_at(&series(&closes), fixed_time()).unwrap();
        assert!(matches!(
            r.trend,
            TrendClass::Downtrend | TrendClass::StrongDowntrend
        ));
        assert!(r.indicator("max_drawdown").unwrap() < -0.5);
    }
}

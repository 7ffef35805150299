//! Exponential backoff with bounded, seeded jitter.

use std::time::Duration;

use crate::runtime_config::RetryConfig;

/// Delay schedule between retries of a transient failure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    pub base: Duration,
    pub factor: f64,
    pub max: Duration,
    pub jitter_ratio: f64,
}

impl Backoff {
    pub fn new(base: Duration, factor: f64, max: Duration, jitter_ratio: f64) -> Self {
        Self {
            base,
            factor: factor.max(1.0),
            max,
            jitter_ratio: jitter_ratio.max(0.0),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            config.factor,
            Duration::from_millis(config.max_delay_ms),
            config.jitter_ratio,
        )
    }

    pub fn delay(&self, attempt: u32, seed: u64) -> Duration {
        backoff_delay(self, attempt, seed)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Delay before retry number `attempt` (0-based).
///
/// `min(base * factor^attempt + jitter, max)` with `jitter` drawn from
/// `[0, base * factor^attempt * jitter_ratio)` by an RNG seeded with
/// `seed ^ attempt`.  Same `(attempt, seed)` gives the same delay, and with
/// `jitter_ratio <= factor - 1` (enforced by `RuntimeConfig::validate`) the
/// schedule never decreases.
pub fn backoff_delay(policy: &Backoff, attempt: u32, seed: u64) -> Duration {
    let raw = policy.base.as_secs_f64() * policy.factor.powi(attempt as i32);
    let jitter = if policy.jitter_ratio > 0.0 {
        let mut rng = fastrand::Rng::with_seed(seed ^ u64::from(attempt));
        rng.f64() * raw * policy.jitter_ratio
    } else {
        0.0
    };

    let secs = (raw + jitter).min(policy.max.as_secs_f64());
    if !secs.is_finite() {
        return policy.max;
    }
    Duration::from_secs_f64(secs.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn without_jitter_doubles_until_cap() {
        let b = Backoff::new(Duration::from_millis(100), 2.0, Duration::from_millis(500), 0.0);
        assert_eq!(b.delay(0, 7), Duration::from_millis(100));
        assert_eq!(b.delay(1, 7), Duration::from_millis(200));
        assert_eq!(b.delay(2, 7), Duration::from_millis(400));
        assert_eq!(b.delay(3, 7), Duration::from_millis(500));
        assert_eq!(b.delay(10, 7), Duration::from_millis(500));
    }

    #[test]
    fn jitter_is_bounded_and_non_decreasing() {
        let b = Backoff::new(Duration::from_secs(1), 2.0, Duration::from_secs(30), 0.25);
        for seed in 0..50 {
            let delays: Vec<Duration> = (0..8).map(|n| b.delay(n, seed)).collect();
            for (n, d) in delays.iter().enumerate() {
                let raw = 2f64.powi(n as i32);
                assert!(d.as_secs_f64() >= raw.min(30.0) - 1e-9);
                assert!(d.as_secs_f64() <= (raw * 1.25).min(30.0) + 1e-9);
            }
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "seed {seed}: {delays:?}");
        }
    }

    #[test]
    fn validated_slow_growth_config_never_shrinks() {
        let mut cfg = crate::runtime_config::RuntimeConfig::default();
        cfg.retry.factor = 1.6;
        cfg.retry.jitter_ratio = 0.5;
        cfg.retry.max_delay_ms = 10_000;
        cfg.validate().unwrap();

        let b = Backoff::from_config(&cfg.retry);
        for seed in 0..200 {
            let delays: Vec<Duration> = (0..10).map(|n| b.delay(n, seed)).collect();
            assert!(delays.windows(2).all(|w| w[0] <= w[1]), "seed {seed}: {delays:?}");
        }
    }

    #[test]
    fn same_seed_same_delay() {
        let b = Backoff::default();
        assert_eq!(backoff_delay(&b, 2, 42), backoff_delay(&b, 2, 42));
    }
}

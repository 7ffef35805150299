// =============================================================================
// Runtime Configuration — engine settings with atomic save
// =============================================================================
//
// Every tunable parameter of the ingestion engine lives here: the tracked
// universe, the provider call budget, retry/backoff, indicator windows and the
// update-cycle cadence.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
//
// =============================================================================

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Symbol;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_symbols() -> Vec<SymbolConfig> {
    [
        ("RY.TO", "Royal Bank of Canada"),
        ("TD.TO", "Toronto-Dominion Bank"),
        ("BNS.TO", "Bank of Nova Scotia"),
        ("BMO.TO", "Bank of Montreal"),
        ("CM.TO", "Canadian Imperial Bank of Commerce"),
        ("SHOP.TO", "Shopify Inc."),
        ("CSU.TO", "Constellation Software"),
        ("CNQ.TO", "Canadian Natural Resources"),
        ("SU.TO", "Suncor Energy"),
        ("ENB.TO", "Enbridge Inc."),
        ("CNR.TO", "Canadian National Railway"),
        ("CP.TO", "Canadian Pacific Kansas City"),
        ("ABX.TO", "Barrick Gold"),
        ("NTR.TO", "Nutrien"),
        ("BN.TO", "Brookfield Corporation"),
        ("L.TO", "Loblaw Companies"),
        ("ATD.TO", "Alimentation Couche-Tard"),
        ("BCE.TO", "BCE Inc."),
        ("T.TO", "TELUS Corporation"),
        ("FTS.TO", "Fortis Inc."),
    ]
    .into_iter()
    .map(|(ticker, name)| SymbolConfig {
        ticker: ticker.to_string(),
        name: name.to_string(),
        active: true,
    })
    .collect()
}

fn default_window_secs() -> u64 {
    3600
}

fn default_max_calls_per_window() -> u32 {
    360
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    1000
}

fn default_backoff_factor() -> f64 {
    2.0
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_jitter_ratio() -> f64 {
    0.25
}

fn default_min_data_points() -> usize {
    20
}

fn default_sma_windows() -> Vec<usize> {
    vec![20, 50, 200]
}

fn default_ema_windows() -> Vec<usize> {
    vec![12, 26]
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_bollinger_period() -> usize {
    20
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_atr_period() -> usize {
    14
}

fn default_volume_window() -> usize {
    20
}

fn default_trend_window() -> usize {
    20
}

fn default_support_window() -> usize {
    50
}

fn default_risk_free_rate() -> f64 {
    0.02
}

fn default_cycle_interval_secs() -> u64 {
    3600
}

fn default_history_days() -> i64 {
    730
}

fn default_rate_limited_backoff_secs() -> u64 {
    60
}

fn default_base_url() -> String {
    "https://query1.finance.yahoo.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

// =============================================================================
// Sections
// =============================================================================

/// One entry of the tracked universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

impl From<&SymbolConfig> for Symbol {
    fn from(cfg: &SymbolConfig) -> Self {
        let display_name = if cfg.name.is_empty() {
            cfg.ticker.clone()
        } else {
            cfg.name.clone()
        };
        Symbol {
            ticker: cfg.ticker.trim().to_uppercase(),
            display_name,
            active: cfg.active,
        }
    }
}

/// How the call window is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WindowPolicy {
    /// The window slides with each call; a slot frees when the oldest call
    /// is `window` old.
    #[default]
    Rolling,
    /// The window starts at the first call and resets wholesale after
    /// `window`.
    Fixed,
}

/// Provider call budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
    #[serde(default = "default_max_calls_per_window")]
    pub max_calls_per_window: u32,
    #[serde(default)]
    pub policy: WindowPolicy,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_calls_per_window: default_max_calls_per_window(),
            policy: WindowPolicy::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

/// Retry policy for transient provider failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per fetch, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub factor: f64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Jitter is drawn from `[0, delay * jitter_ratio)`.
    #[serde(default = "default_jitter_ratio")]
    pub jitter_ratio: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            factor: default_backoff_factor(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ratio: default_jitter_ratio(),
        }
    }
}

/// Window lengths for the indicator engine. All windows count observations,
/// not calendar days.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    #[serde(default = "default_min_data_points")]
    pub min_data_points: usize,
    #[serde(default = "default_sma_windows")]
    pub sma_windows: Vec<usize>,
    #[serde(default = "default_ema_windows")]
    pub ema_windows: Vec<usize>,
    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,
    #[serde(default = "default_atr_period")]
    pub atr_period: usize,
    #[serde(default = "default_volume_window")]
    pub volume_window: usize,
    #[serde(default = "default_trend_window")]
    pub trend_window: usize,
    #[serde(default = "default_support_window")]
    pub support_window: usize,
    /// Annual risk-free rate used by Sharpe/Sortino.
    #[serde(default = "default_risk_free_rate")]
    pub risk_free_rate: f64,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            min_data_points: default_min_data_points(),
            sma_windows: default_sma_windows(),
            ema_windows: default_ema_windows(),
            rsi_period: default_rsi_period(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_bollinger_period(),
            bollinger_k: default_bollinger_k(),
            atr_period: default_atr_period(),
            volume_window: default_volume_window(),
            trend_window: default_trend_window(),
            support_window: default_support_window(),
            risk_free_rate: default_risk_free_rate(),
        }
    }
}

/// Update-cycle cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Pause between the end of one auto-update cycle and the start of the
    /// next.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
    /// How far back each fetch reaches.
    #[serde(default = "default_history_days")]
    pub history_days: i64,
    /// Fixed pause after a provider rate-limit response.
    #[serde(default = "default_rate_limited_backoff_secs")]
    pub rate_limited_backoff_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cycle_interval_secs: default_cycle_interval_secs(),
            history_days: default_history_days(),
            rate_limited_backoff_secs: default_rate_limited_backoff_secs(),
        }
    }
}

/// Market-data provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level runtime configuration.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Tracked universe.
    #[serde(default = "default_symbols")]
    pub symbols: Vec<SymbolConfig>,

    /// Start the auto-update loop as soon as the engine boots.
    #[serde(default)]
    pub auto_update_on_start: bool,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub indicators: IndicatorConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub provider: ProviderConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            auto_update_on_start: false,
            rate_limit: RateLimitConfig::default(),
            retry: RetryConfig::default(),
            indicators: IndicatorConfig::default(),
            scheduler: SchedulerConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            symbols = config.symbols.len(),
            max_calls = config.rate_limit.max_calls_per_window,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Replace the tracked universe with a comma-separated ticker list, as
    /// read from `PULSE_SYMBOLS`.
    pub fn override_symbols(&mut self, list: &str) {
        let symbols: Vec<SymbolConfig> = list
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .map(|ticker| SymbolConfig {
                name: ticker.clone(),
                ticker,
                active: true,
            })
            .collect();
        if !symbols.is_empty() {
            self.symbols = symbols;
        }
    }

    /// Reject values the engine cannot run with. Called once at startup;
    /// every component downstream assumes a validated config.
    pub fn validate(&self) -> Result<()> {
        if self.rate_limit.window_secs == 0 {
            bail!("rate_limit.window_secs must be > 0");
        }
        if self.rate_limit.max_calls_per_window == 0 {
            bail!("rate_limit.max_calls_per_window must be > 0");
        }
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be >= 1");
        }
        if self.retry.factor < 1.0 {
            bail!("retry.factor must be >= 1.0");
        }
        if !(0.0..1.0).contains(&self.retry.jitter_ratio) {
            bail!("retry.jitter_ratio must be in [0, 1)");
        }
        // Keeps every retry delay at least as long as the one before it.
        if 1.0 + self.retry.jitter_ratio > self.retry.factor {
            bail!(
                "retry.factor ({}) must be >= 1 + retry.jitter_ratio ({})",
                self.retry.factor,
                self.retry.jitter_ratio
            );
        }

        let ind = &self.indicators;
        if ind.min_data_points < 2 {
            bail!("indicators.min_data_points must be >= 2");
        }
        let windows = ind
            .sma_windows
            .iter()
            .chain(ind.ema_windows.iter())
            .chain([
                &ind.rsi_period,
                &ind.bollinger_period,
                &ind.atr_period,
                &ind.volume_window,
                &ind.trend_window,
                &ind.support_window,
                &ind.macd_signal,
            ]);
        for &w in windows {
            if w == 0 {
                bail!("indicator windows must be > 0");
            }
        }
        if ind.macd_fast == 0 || ind.macd_fast >= ind.macd_slow {
            bail!(
                "indicators.macd_fast ({}) must be > 0 and < macd_slow ({})",
                ind.macd_fast,
                ind.macd_slow
            );
        }

        if self.scheduler.history_days <= 0 {
            bail!("scheduler.history_days must be > 0");
        }
        Ok(())
    }
}

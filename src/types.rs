// =============================================================================
// Shared types used across the Equity Pulse engine
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A single tracked equity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub ticker: String,
    pub display_name: String,
    pub active: bool,
}

impl Symbol {
    pub fn new(ticker: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            display_name: display_name.into(),
            active: true,
        }
    }
}

/// One daily OHLCV observation after validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// One OHLCV row as the provider hands it over. Only validation turns it into
/// a [`Bar`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

/// Ordered bars for one symbol, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub ticker: String,
    pub bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// Inclusive date range requested from the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `true` when `start <= end`.
    pub fn is_ordered(&self) -> bool {
        self.start <= self.end
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Trend label derived from moving-average ordering and band position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendClass {
    StrongUptrend,
    Uptrend,
    Sideways,
    Downtrend,
    StrongDowntrend,
}

impl std::fmt::Display for TrendClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StrongUptrend => write!(f, "StrongUptrend"),
            Self::Uptrend => write!(f, "Uptrend"),
            Self::Sideways => write!(f, "Sideways"),
            Self::Downtrend => write!(f, "Downtrend"),
            Self::StrongDowntrend => write!(f, "StrongDowntrend"),
        }
    }
}

/// Output of the indicator engine for one `(symbol, as_of)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub symbol: String,
    /// Date of the last bar that fed the computation.
    pub as_of: NaiveDate,
    pub indicators: BTreeMap<String, f64>,
    pub trend: TrendClass,
    pub bars_used: usize,
    pub derived_at: DateTime<Utc>,
}

impl AnalysisResult {
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied()
    }
}

/// Why the engine declined to produce a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkippedReason {
    InsufficientData { required: usize, available: usize },
}

impl std::fmt::Display for SkippedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientData {
                required,
                available,
            } => write!(f, "insufficient data: {available} bars, need {required}"),
        }
    }
}

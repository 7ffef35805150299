// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators the analysis
// engine reports.  Every public function returns `Option<T>` (or an empty
// series) so callers are forced to handle insufficient data instead of
// receiving a padded or fabricated value.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod performance;
pub mod range;
pub mod rsi;
pub mod sma;
pub mod trend;

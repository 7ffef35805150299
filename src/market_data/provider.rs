// =============================================================================
// Bar provider seam
// =============================================================================

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::types::{DateRange, RawBar};

/// Source of daily OHLCV rows for one ticker.
///
/// One call is one unit of the shared rate budget; implementations must not
/// retry internally, the fetcher owns that policy.
#[async_trait]
pub trait BarProvider: Send + Sync {
    async fn get_bars(&self, ticker: &str, range: DateRange) -> Result<Vec<RawBar>, ProviderError>;
}

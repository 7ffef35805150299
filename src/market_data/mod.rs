// =============================================================================
// Market Data Module
// =============================================================================
//
// Provider seam, Yahoo chart client, the shared call budget and the retrying
// fetcher that ties them together.

pub mod backoff;
pub mod fetcher;
pub mod provider;
pub mod rate_budget;
pub mod yahoo;

#[cfg(test)]
pub mod testing;

pub use fetcher::{FetchOutcome, MarketDataFetcher};
pub use provider::BarProvider;
pub use rate_budget::{RateBudget, RateBudgetSnapshot};
pub use yahoo::YahooProvider;

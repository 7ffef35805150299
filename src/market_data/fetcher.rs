// =============================================================================
// Market Data Fetcher — budgeted, retrying, validating
// =============================================================================
//
// fetch(ticker, range):
//   1. reject start > end without touching the provider
//   2. per attempt: acquire one budget slot, call the provider
//   3. classify failures:
//        RateLimited -> return at once (the caller owns the pause)
//        Permanent   -> return at once
//        Transient   -> back off and retry, up to `max_attempts` in total
//   4. validate the rows and hand back a `PriceSeries`
//
// Only `BudgetError` escapes as an `Err`; everything the provider does is
// folded into a `FetchOutcome`.
// =============================================================================

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::{BudgetError, ErrorClass, FetchError};
use crate::market_data::backoff::Backoff;
use crate::market_data::provider::BarProvider;
use crate::market_data::rate_budget::RateBudget;
use crate::runtime_config::RetryConfig;
use crate::types::{Bar, DateRange, PriceSeries, RawBar};

/// Result of one `fetch` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Success(PriceSeries),
    RateLimited,
    Transient(FetchError),
    Permanent(FetchError),
}

impl FetchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::RateLimited => "rate_limited",
            Self::Transient(_) => "transient",
            Self::Permanent(_) => "permanent",
        }
    }
}

pub struct MarketDataFetcher {
    provider: Arc<dyn BarProvider>,
    budget: Arc<RateBudget>,
    backoff: Backoff,
    max_attempts: u32,
}

impl MarketDataFetcher {
    pub fn new(provider: Arc<dyn BarProvider>, budget: Arc<RateBudget>, retry: &RetryConfig) -> Self {
        Self {
            provider,
            budget,
            backoff: Backoff::from_config(retry),
            max_attempts: retry.max_attempts.max(1),
        }
    }

    pub fn budget(&self) -> &Arc<RateBudget> {
        &self.budget
    }

    pub async fn fetch(&self, ticker: &str, range: DateRange) -> Result<FetchOutcome, BudgetError> {
        if !range.is_ordered() {
            warn!(ticker, %range, "refusing malformed range");
            return Ok(FetchOutcome::Permanent(FetchError::MalformedRange {
                start: range.start.to_string(),
                end: range.end.to_string(),
            }));
        }

        let seed = fastrand::u64(..);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.budget.acquire().await?;

            let err = match self.provider.get_bars(ticker, range).await {
                Ok(raw) => {
                    let outcome = match validate_bars(raw) {
                        Ok(bars) => {
                            debug!(ticker, attempt, bars = bars.len(), "fetch succeeded");
                            FetchOutcome::Success(PriceSeries {
                                ticker: ticker.to_string(),
                                bars,
                            })
                        }
                        Err(e) => {
                            warn!(ticker, error = %e, "provider returned unusable bars");
                            FetchOutcome::Permanent(e)
                        }
                    };
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            match err.class() {
                ErrorClass::RateLimited => {
                    warn!(ticker, attempt, "provider rate limited the request");
                    return Ok(FetchOutcome::RateLimited);
                }
                ErrorClass::Permanent => {
                    info!(ticker, attempt, error = %err, "permanent fetch failure");
                    return Ok(FetchOutcome::Permanent(err.into()));
                }
                ErrorClass::Transient if attempt >= self.max_attempts => {
                    warn!(ticker, attempts = attempt, error = %err, "retries exhausted");
                    return Ok(FetchOutcome::Transient(err.into()));
                }
                ErrorClass::Transient => {
                    let delay = self.backoff.delay(attempt - 1, seed);
                    warn!(
                        ticker,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient fetch failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

/// Check provider rows and convert them into bars.
///
/// Rejects the whole batch on the first offending row: out-of-order or
/// duplicate dates, negative volume, non-finite or non-positive prices, or a
/// high/low that doesn't bracket open and close.
pub fn validate_bars(raw: Vec<RawBar>) -> Result<Vec<Bar>, FetchError> {
    if raw.is_empty() {
        return Err(FetchError::NoData);
    }

    let invalid = |index: usize, reason: String| FetchError::InvalidBars { index, reason };

    let mut bars: Vec<Bar> = Vec::with_capacity(raw.len());
    for (index, r) in raw.into_iter().enumerate() {
        if let Some(prev) = bars.last() {
            if r.timestamp <= prev.timestamp {
                return Err(invalid(
                    index,
                    format!("date {} does not follow {}", r.timestamp, prev.timestamp),
                ));
            }
        }
        if r.volume < 0 {
            return Err(invalid(index, format!("negative volume {}", r.volume)));
        }
        for (name, v) in [("open", r.open), ("high", r.high), ("low", r.low), ("close", r.close)] {
            if !v.is_finite() || v <= 0.0 {
                return Err(invalid(index, format!("{name} price {v} is not positive")));
            }
        }
        if r.low > r.open.min(r.close) {
            return Err(invalid(index, format!("low {} above open/close", r.low)));
        }
        if r.high < r.open.max(r.close) {
            return Err(invalid(index, format!("high {} below open/close", r.high)));
        }

        bars.push(Bar {
            timestamp: r.timestamp,
            open: r.open,
            high: r.high,
            low: r.low,
            close: r.close,
            volume: r.volume as u64,
        });
    }
    Ok(bars)
}

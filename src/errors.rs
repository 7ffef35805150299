// =============================================================================
// Error taxonomy
// =============================================================================
//
// Closed enums for every failure that crosses a component boundary. Raw
// transport errors never leave the market-data layer: the fetcher folds them
// into `FetchOutcome`, and only `BudgetError` can escape it.
// =============================================================================

use thiserror::Error;

/// How a provider failure should be treated by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    RateLimited,
    Permanent,
}

/// Raw failure reported by a [`crate::market_data::BarProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("provider rate limit hit")]
    RateLimited,
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("provider rejected request: {0}")]
    Rejected(String),
    #[error("malformed provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Timeout | Self::Connection(_) => ErrorClass::Transient,
            Self::RateLimited => ErrorClass::RateLimited,
            Self::Status { status, .. } => match *status {
                429 => ErrorClass::RateLimited,
                408 => ErrorClass::Transient,
                s if s >= 500 => ErrorClass::Transient,
                _ => ErrorClass::Permanent,
            },
            Self::UnknownSymbol(_) | Self::Rejected(_) | Self::Decode(_) => ErrorClass::Permanent,
        }
    }
}

/// Failure carried inside a non-success `FetchOutcome`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("malformed range: start {start} is after end {end}")]
    MalformedRange { start: String, end: String },
    #[error("provider returned no bars")]
    NoData,
    #[error("invalid bars at index {index}: {reason}")]
    InvalidBars { index: usize, reason: String },
}

/// The shared call budget could not be acquired. Fatal to the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BudgetError {
    #[error("rate budget has zero capacity")]
    ZeroCapacity,
}

/// Failure surfaced by the external persistence collaborator.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to write analysis snapshot: {0}")]
    Write(String),
    #[error("failed to serialise analysis: {0}")]
    Serialise(#[from] serde_json::Error),
}

/// Control-surface and state-machine failures of the update scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("an update cycle is already {0}")]
    AlreadyRunning(String),
    #[error("invalid scheduler transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error(transparent)]
    Budget(#[from] BudgetError),
}

/// Failure of an on-demand single-symbol refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("{0} is not an active tracked symbol")]
    NotTracked(String),
    #[error(transparent)]
    Budget(#[from] BudgetError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

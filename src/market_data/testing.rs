//! Scripted provider and bar builders shared by the crate's tests.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::errors::ProviderError;
use crate::market_data::provider::BarProvider;
use crate::types::{DateRange, RawBar};

type Reply = Result<Vec<RawBar>, ProviderError>;

/// Replays queued replies per ticker, then falls back to a standing reply
/// (or `UnknownSymbol` when none is set).  Records when each call happened.
#[derive(Default)]
pub struct ScriptedProvider {
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    standing: Mutex<HashMap<String, Reply>>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedProvider {
    pub fn push(&self, ticker: &str, reply: Reply) {
        self.queued
            .lock()
            .entry(ticker.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_many(&self, ticker: &str, n: usize, reply: impl Fn() -> Reply) {
        for _ in 0..n {
            self.push(ticker, reply());
        }
    }

    pub fn always(&self, ticker: &str, reply: Reply) {
        self.standing.lock().insert(ticker.to_string(), reply);
    }

    pub fn call_count(&self, ticker: &str) -> usize {
        self.calls.lock().iter().filter(|(t, _)| t == ticker).count()
    }

    pub fn call_times(&self, ticker: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .iter()
            .filter(|(t, _)| t == ticker)
            .map(|(_, at)| *at)
            .collect()
    }

    /// Tickers in call order.
    pub fn call_order(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(t, _)| t.clone()).collect()
    }
}

#[async_trait]
impl BarProvider for ScriptedProvider {
    async fn get_bars(&self, ticker: &str, _range: DateRange) -> Reply {
        self.calls.lock().push((ticker.to_string(), Instant::now()));
        if let Some(reply) = self.queued.lock().get_mut(ticker).and_then(VecDeque::pop_front) {
            return reply;
        }
        self.standing
            .lock()
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| Err(ProviderError::UnknownSymbol(ticker.to_string())))
    }
}

/// `n` consecutive daily rows starting 2024-01-01 with a gentle uptrend.
pub fn raw_bars(n: usize, start_price: f64) -> Vec<RawBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default();
    (0..n)
        .map(|i| {
            let close = start_price + i as f64 * 0.5;
            let open = close - 0.2;
            RawBar {
                timestamp: start + Duration::days(i as i64),
                open,
                high: close + 1.0,
                low: open - 1.0,
                close,
                volume: 1_000 + i as i64,
            }
        })
        .collect()
}

// =============================================================================
// Yahoo Finance chart client
// =============================================================================
//
// GET {base}/v8/finance/chart/{ticker}?period1=..&period2=..&interval=1d
//
// The response carries parallel arrays (timestamp, open, high, low, close,
// volume) with `null` holes on sessions the exchange published nothing for.
// Rows with any missing OHLC value are dropped, never interpolated.
// =============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::errors::ProviderError;
use crate::market_data::provider::BarProvider;
use crate::runtime_config::ProviderConfig;
use crate::types::{DateRange, RawBar};

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

/// Async client for the Yahoo v8 chart endpoint.
#[derive(Clone)]
pub struct YahooProvider {
    base_url: String,
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent("Mozilla/5.0 (X11; Linux x86_64) equity-pulse")
            .build()
            .map_err(|e| ProviderError::Connection(e.to_string()))?;

        debug!(base_url = %config.base_url, "YahooProvider initialised");

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn chart_url(&self, ticker: &str, range: DateRange) -> String {
        let period1 = day_start(range.start);
        // period2 is exclusive on Yahoo's side; push it to the end of the day.
        let period2 = day_start(range.end) + 86_399;
        format!(
            "{}/v8/finance/chart/{}?period1={period1}&period2={period2}&interval=1d",
            self.base_url, ticker
        )
    }
}

fn day_start(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_default()
}

#[async_trait]
impl BarProvider for YahooProvider {
    #[instrument(skip(self), name = "yahoo::get_bars", fields(range = %range))]
    async fn get_bars(&self, ticker: &str, range: DateRange) -> Result<Vec<RawBar>, ProviderError> {
        let url = self.chart_url(ticker, range);

        let resp = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Connection(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Connection(e.to_string())
            }
        })?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(ticker, "provider answered 429");
            return Err(ProviderError::RateLimited);
        }

        if !status.is_success() {
            // Yahoo reports unknown tickers as 404 with a chart.error body.
            if let Ok(chart) = serde_json::from_str::<ChartResponse>(&body) {
                if chart.chart.error.is_some() {
                    return parse_chart(ticker, chart);
                }
            }
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        let chart: ChartResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))?;
        parse_chart(ticker, chart)
    }
}

fn truncate(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn parse_chart(ticker: &str, resp: ChartResponse) -> Result<Vec<RawBar>, ProviderError> {
    if let Some(err) = resp.chart.error {
        return Err(if err.code == "Not Found" {
            ProviderError::UnknownSymbol(ticker.to_string())
        } else {
            ProviderError::Rejected(format!("{}: {}", err.code, err.description))
        });
    }

    let data = resp
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| ProviderError::Decode("chart.result is empty".into()))?;

    // A valid symbol with no sessions in range comes back without timestamps.
    let Some(timestamps) = data.timestamp else {
        return Ok(Vec::new());
    };

    let quote = data
        .indicators
        .quote
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Decode("no quote block".into()))?;

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let timestamp = DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.date_naive())
            .ok_or_else(|| ProviderError::Decode(format!("invalid timestamp {ts}")))?;

        let at = |v: &Vec<Option<f64>>| v.get(i).copied().flatten();
        let (Some(open), Some(high), Some(low), Some(close)) =
            (at(&quote.open), at(&quote.high), at(&quote.low), at(&quote.close))
        else {
            continue;
        };
        let volume = quote.volume.get(i).copied().flatten().unwrap_or(0);

        bars.push(RawBar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    debug!(ticker, rows = timestamps.len(), bars = bars.len(), "chart parsed");
    Ok(bars)
}

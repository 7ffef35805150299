// =============================================================================
// Update Scheduler
// =============================================================================
//
// One cycle walks the due symbols:
//
//   fetch (budget + retry) ─▶ analyze ─▶ store.save ─▶ progress.record
//
// A symbol is due unless its stored analysis already covers the previous
// weekday session; current symbols are counted as skipped without spending
// budget.  Never-analysed symbols go first, then the stalest, with lexical
// ticker order inside each tier.
//
// Per-symbol failures are counted and the cycle moves on.  Only a broken
// budget or an impossible state transition aborts the cycle; that resets the
// scheduler to Idle, keeps the error in the progress snapshot and turns
// auto-update off.
//
// Stop is cooperative: the flag is checked between symbols, so the symbol in
// flight always finishes its fetch, analysis and save.
//
// A single background driver task runs cycles while auto-update is on,
// sleeping `cycle_interval` between them.  On-demand refreshes bypass the
// driver but share the fetcher and therefore the rate budget.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc, Weekday};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::analysis::IndicatorEngine;
use crate::errors::{PersistenceError, RefreshError, SchedulerError};
use crate::market_data::{FetchOutcome, MarketDataFetcher};
use crate::runtime_config::SchedulerConfig;
use crate::scheduler::progress::{
    CycleProgress, CycleStatus, ProgressTracker, ProgressWriter, SymbolTally,
};
use crate::store::AnalysisStore;
use crate::symbols::SymbolSet;
use crate::types::{AnalysisResult, DateRange, SkippedReason, Symbol};

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(AnalysisResult),
    Skipped(SkippedReason),
    /// Any non-success fetch outcome.
    FetchFailed(FetchOutcome),
}

impl RefreshOutcome {
    fn tally(&self) -> SymbolTally {
        match self {
            Self::Updated(_) => SymbolTally::Succeeded,
            Self::Skipped(_) => SymbolTally::Skipped,
            Self::FetchFailed(_) => SymbolTally::Failed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Updated(_) => "updated",
            Self::Skipped(_) => "skipped",
            Self::FetchFailed(outcome) => outcome.label(),
        }
    }
}

pub struct UpdateScheduler {
    symbols: Arc<SymbolSet>,
    fetcher: Arc<MarketDataFetcher>,
    engine: IndicatorEngine,
    store: Arc<dyn AnalysisStore>,
    config: SchedulerConfig,
    progress: ProgressWriter,
    wake: Notify,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl UpdateScheduler {
    pub fn new(
        symbols: Arc<SymbolSet>,
        fetcher: Arc<MarketDataFetcher>,
        engine: IndicatorEngine,
        store: Arc<dyn AnalysisStore>,
        config: SchedulerConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            symbols,
            fetcher,
            engine,
            store,
            config,
            progress: ProgressWriter::new(),
            wake: Notify::new(),
            driver: Mutex::new(None),
        })
    }

    /// Read-only progress handle.
    pub fn progress(&self) -> ProgressTracker {
        self.progress.tracker()
    }

    // -------------------------------------------------------------------------
    // Control surface
    // -------------------------------------------------------------------------

    /// Turn auto-update on and begin a cycle right away.
    pub fn start(self: &Arc<Self>) -> Result<Uuid, SchedulerError> {
        let mut driver = self.driver.lock();

        let total = self.symbols.active().len();
        let cycle_id = self.progress.begin(total)?;
        self.progress.set_auto_update(true);

        info!(%cycle_id, total, "auto-update started");

        match driver.as_ref() {
            Some(handle) if !handle.is_finished() => self.wake.notify_one(),
            _ => {
                let me = Arc::clone(self);
                *driver = Some(tokio::spawn(me.drive()));
            }
        }
        Ok(cycle_id)
    }

    /// Turn auto-update off and ask a running cycle to wind down after the
    /// current symbol.  No-op while Idle.
    pub fn stop(&self) -> CycleStatus {
        self.progress.set_auto_update(false);
        if self.progress.request_stop() {
            info!("stop requested, finishing current symbol");
        }
        self.wake.notify_one();
        self.progress.status()
    }

    /// Run exactly one cycle and wait for it.
    pub async fn run_cycle(&self) -> Result<CycleProgress, SchedulerError> {
        let total = self.symbols.active().len();
        self.progress.begin(total)?;
        self.cycle_body().await.inspect_err(|e| self.abort(e))
    }

    /// Fetch, analyse and store one tracked symbol now, outside any cycle.
    /// Progress counters are left alone.
    pub async fn refresh_symbol(&self, ticker: &str) -> Result<RefreshOutcome, RefreshError> {
        let ticker = ticker.trim().to_uppercase();
        if !self.symbols.contains(&ticker) {
            return Err(RefreshError::NotTracked(ticker));
        }
        info!(ticker = %ticker, "on-demand refresh");
        self.process(&ticker, self.history_range(Utc::now().date_naive())).await
    }

    /// `stop`, then give the in-flight symbol up to `grace` to finish its
    /// fetch, analysis and save.
    pub async fn shutdown(&self, grace: Duration) -> CycleStatus {
        self.stop();
        let progress = self.progress();
        let settled = tokio::time::timeout(grace, async {
            while progress.status() != CycleStatus::Idle {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await;
        if settled.is_err() {
            warn!(grace_secs = grace.as_secs(), "scheduler still busy at shutdown");
        }
        progress.status()
    }

    pub async fn get_analysis(&self, ticker: &str) -> Result<Option<AnalysisResult>, PersistenceError> {
        self.store.load_latest(&ticker.trim().to_uppercase()).await
    }

    // -------------------------------------------------------------------------
    // Driver
    // -------------------------------------------------------------------------

    async fn drive(self: Arc<Self>) {
        let interval = Duration::from_secs(self.config.cycle_interval_secs);
        debug!(interval_secs = interval.as_secs(), "scheduler driver started");

        loop {
            if self.progress.status() == CycleStatus::Running {
                if let Err(e) = self.cycle_body().await {
                    self.abort(&e);
                }
            }

            if !self.keep_driving() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if self.progress.auto_update() {
                        let total = self.symbols.active().len();
                        if let Err(e) = self.progress.begin(total) {
                            debug!(error = %e, "scheduled cycle not started");
                        }
                    }
                }
                _ = self.wake.notified() => {}
            }
        }

        debug!("scheduler driver exited");
    }

    /// Decide under the driver lock whether to keep going, so `start` never
    /// hands a cycle to a driver that is on its way out.
    fn keep_driving(&self) -> bool {
        let mut driver = self.driver.lock();
        if self.progress.auto_update() || self.progress.status() == CycleStatus::Running {
            return true;
        }
        *driver = None;
        false
    }

    fn abort(&self, e: &SchedulerError) {
        let snap = self.progress.fail(e.to_string());
        error!(
            error = %e,
            processed = snap.processed,
            total = snap.total_symbols,
            "update cycle aborted, auto-update disabled"
        );
    }

    // -------------------------------------------------------------------------
    // Cycle
    // -------------------------------------------------------------------------

    async fn cycle_body(&self) -> Result<CycleProgress, SchedulerError> {
        let today = Utc::now().date_naive();
        let (symbols, current) = self.due_symbols(today).await;
        self.progress.set_total(symbols.len() + current);
        for _ in 0..current {
            self.progress.record(SymbolTally::Skipped);
        }
        let range = self.history_range(today);

        info!(due = symbols.len(), up_to_date = current, %range, "update cycle started");

        for (i, symbol) in symbols.iter().enumerate() {
            if self.progress.status() != CycleStatus::Running {
                info!(next = %symbol.ticker, "cycle stopped early");
                break;
            }
            self.progress.set_current(Some(&symbol.ticker));

            let (tally, rate_limited) = match self.process(&symbol.ticker, range).await {
                Ok(outcome) => {
                    let limited = matches!(outcome, RefreshOutcome::FetchFailed(FetchOutcome::RateLimited));
                    debug!(ticker = %symbol.ticker, outcome = outcome.label(), "symbol processed");
                    (outcome.tally(), limited)
                }
                Err(RefreshError::Budget(e)) => return Err(e.into()),
                Err(e) => {
                    warn!(ticker = %symbol.ticker, error = %e, "symbol failed");
                    (SymbolTally::Failed, false)
                }
            };
            self.progress.record(tally);

            // No pause once stopping or with nothing left to fetch.
            let more_left = i + 1 < symbols.len();
            if rate_limited && more_left && self.progress.status() == CycleStatus::Running {
                let pause = Duration::from_secs(self.config.rate_limited_backoff_secs);
                warn!(
                    ticker = %symbol.ticker,
                    pause_secs = pause.as_secs(),
                    "provider rate limited, pausing cycle"
                );
                tokio::time::sleep(pause).await;
            }
        }

        let done = self.progress.finish()?;
        info!(
            processed = done.processed,
            succeeded = done.succeeded,
            failed = done.failed,
            skipped = done.skipped,
            "update cycle finished"
        );
        Ok(done)
    }

    async fn process(&self, ticker: &str, range: DateRange) -> Result<RefreshOutcome, RefreshError> {
        let series = match self.fetcher.fetch(ticker, range).await? {
            FetchOutcome::Success(series) => series,
            other => return Ok(RefreshOutcome::FetchFailed(other)),
        };

        let result = match self.engine.analyze(&series) {
            Ok(result) => result,
            Err(reason) => {
                info!(ticker, %reason, "analysis skipped");
                return Ok(RefreshOutcome::Skipped(reason));
            }
        };

        self.store.save(&result).await?;
        Ok(RefreshOutcome::Updated(result))
    }

    /// Active symbols that need fetching, in fetch order, plus the number
    /// already current as of the previous session.
    async fn due_symbols(&self, today: NaiveDate) -> (Vec<Symbol>, usize) {
        let cutoff = previous_session(today);
        let mut due: Vec<(Option<NaiveDate>, Symbol)> = Vec::new();
        let mut current = 0usize;

        for symbol in self.symbols.active() {
            let as_of = match self.store.load_latest(&symbol.ticker).await {
                Ok(latest) => latest.map(|r| r.as_of),
                Err(e) => {
                    warn!(ticker = %symbol.ticker, error = %e, "stored analysis unreadable, treating as due");
                    None
                }
            };
            if as_of.is_some_and(|d| d >= cutoff) {
                current += 1;
            } else {
                due.push((as_of, symbol));
            }
        }

        // `None` sorts first; the stable sort keeps lexical order within a tier.
        due.sort_by_key(|(as_of, _)| *as_of);
        (due.into_iter().map(|(_, s)| s).collect(), current)
    }

    /// `[today - history_days, today]`.
    fn history_range(&self, today: NaiveDate) -> DateRange {
        let start = today - chrono::Duration::days(self.config.history_days.max(0));
        DateRange::new(start, today)
    }
}

/// Latest weekday strictly before `today`.  Its bar is the newest one the
/// provider is guaranteed to have.
fn previous_session(today: NaiveDate) -> NaiveDate {
    let mut day = today - chrono::Duration::days(1);
    while matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
        day = day - chrono::Duration::days(1);
    }
    day
}

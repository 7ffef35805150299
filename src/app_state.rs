// =============================================================================
// Central Application State — Equity Pulse
// =============================================================================
//
// Ties the subsystems together for the API layer.  Every component manages
// its own interior mutability; AppState only holds `Arc`s to them:
//
//   SymbolSet ─┐
//   RateBudget ┴▶ MarketDataFetcher ─▶ UpdateScheduler ─▶ AnalysisStore
//
// The rate budget is created once here and shared by the batch cycle and
// on-demand refreshes through the single fetcher.
// =============================================================================

use std::sync::Arc;
use std::time::Instant;

use crate::analysis::IndicatorEngine;
use crate::market_data::{BarProvider, MarketDataFetcher, RateBudget};
use crate::runtime_config::{RuntimeConfig, SymbolConfig};
use crate::scheduler::UpdateScheduler;
use crate::store::AnalysisStore;
use crate::symbols::SymbolSet;
use crate::types::Symbol;

/// Shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Configuration ───────────────────────────────────────────────────
    pub config: RuntimeConfig,

    // ── Universe ────────────────────────────────────────────────────────
    pub symbols: Arc<SymbolSet>,

    // ── Market data ─────────────────────────────────────────────────────
    pub budget: Arc<RateBudget>,

    // ── Persistence ─────────────────────────────────────────────────────
    pub store: Arc<dyn AnalysisStore>,

    // ── Orchestration ───────────────────────────────────────────────────
    pub scheduler: Arc<UpdateScheduler>,

    // ── Timing ──────────────────────────────────────────────────────────
    /// Instant when the service was started. Used for uptime calculations.
    pub start_time: Instant,
}

impl AppState {
    /// Wire every subsystem from a validated `config`.
    pub fn new(
        config: RuntimeConfig,
        provider: Arc<dyn BarProvider>,
        store: Arc<dyn AnalysisStore>,
    ) -> Self {
        let symbols = Arc::new(SymbolSet::new(config.symbols.iter().map(Symbol::from)));
        let fetcher = Arc::new(MarketDataFetcher::new(
            provider,
            Arc::new(RateBudget::new(&config.rate_limit)),
            &config.retry,
        ));
        let budget = fetcher.budget().clone();
        let engine = IndicatorEngine::new(config.indicators.clone());
        let scheduler = UpdateScheduler::new(
            symbols.clone(),
            fetcher,
            engine,
            store.clone(),
            config.scheduler.clone(),
        );

        Self {
            budget,
            config,
            symbols,
            store,
            scheduler,
            start_time: Instant::now(),
        }
    }

    /// Boot config with the symbol list as it stands now; the universe may
    /// have been replaced through the API since boot.
    pub fn current_config(&self) -> RuntimeConfig {
        let mut config = self.config.clone();
        config.symbols = self
            .symbols
            .all()
            .into_iter()
            .map(|s| SymbolConfig {
                ticker: s.ticker,
                name: s.display_name,
                active: s.active,
            })
            .collect();
        config
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

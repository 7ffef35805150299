// =============================================================================
// Cycle progress
// =============================================================================
//
// State machine:  Idle ──begin──▶ Running ──request_stop──▶ Stopping
//                   ▲                │                          │
//                   └────finish──────┴──────────finish──────────┘
//
// Only the scheduler owns a `ProgressWriter`.  Everyone else holds a
// `ProgressTracker`, which can do nothing but hand out value snapshots.
//
// Counters: processed = succeeded + failed + skipped <= total_symbols.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::SchedulerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CycleStatus {
    #[default]
    Idle,
    Running,
    Stopping,
}

impl std::fmt::Display for CycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Which bucket a processed symbol lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolTally {
    Succeeded,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CycleProgress {
    pub cycle_id: Option<Uuid>,
    pub total_symbols: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Symbols with too little history to analyse.
    pub skipped: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub current_symbol: Option<String>,
    pub status: CycleStatus,
    pub auto_update: bool,
    pub last_error: Option<String>,
}

/// Read-only view handed to the API and anyone else outside the scheduler.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<RwLock<CycleProgress>>,
}

impl ProgressTracker {
    pub fn snapshot(&self) -> CycleProgress {
        self.inner.read().clone()
    }

    pub fn status(&self) -> CycleStatus {
        self.inner.read().status
    }
}

/// Mutating handle; lives inside the scheduler.
#[derive(Debug, Default)]
pub(crate) struct ProgressWriter {
    inner: Arc<RwLock<CycleProgress>>,
}

impl ProgressWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn tracker(&self) -> ProgressTracker {
        ProgressTracker {
            inner: self.inner.clone(),
        }
    }

    pub(crate) fn status(&self) -> CycleStatus {
        self.inner.read().status
    }

    pub(crate) fn auto_update(&self) -> bool {
        self.inner.read().auto_update
    }

    pub(crate) fn set_auto_update(&self, on: bool) {
        self.inner.write().auto_update = on;
    }

    /// Idle → Running with fresh counters.
    pub(crate) fn begin(&self, total_symbols: usize) -> Result<Uuid, SchedulerError> {
        let mut p = self.inner.write();
        if p.status != CycleStatus::Idle {
            return Err(SchedulerError::AlreadyRunning(p.status.to_string()));
        }
        let id = Uuid::new_v4();
        let auto_update = p.auto_update;
        *p = CycleProgress {
            cycle_id: Some(id),
            total_symbols,
            started_at: Some(Utc::now()),
            status: CycleStatus::Running,
            auto_update,
            ..CycleProgress::default()
        };
        Ok(id)
    }

    /// The symbol list is re-read when the cycle body starts; keep the total
    /// in step with it.
    pub(crate) fn set_total(&self, total_symbols: usize) {
        let mut p = self.inner.write();
        p.total_symbols = total_symbols.max(p.processed);
    }

    pub(crate) fn set_current(&self, ticker: Option<&str>) {
        self.inner.write().current_symbol = ticker.map(str::to_string);
    }

    pub(crate) fn record(&self, tally: SymbolTally) {
        let mut p = self.inner.write();
        if p.processed >= p.total_symbols {
            return;
        }
        p.processed += 1;
        match tally {
            SymbolTally::Succeeded => p.succeeded += 1,
            SymbolTally::Failed => p.failed += 1,
            SymbolTally::Skipped => p.skipped += 1,
        }
    }

    /// Running → Stopping.  Returns `false` when there was nothing to stop.
    pub(crate) fn request_stop(&self) -> bool {
        let mut p = self.inner.write();
        if p.status == CycleStatus::Running {
            p.status = CycleStatus::Stopping;
            true
        } else {
            false
        }
    }

    /// Running | Stopping → Idle.
    pub(crate) fn finish(&self) -> Result<CycleProgress, SchedulerError> {
        let mut p = self.inner.write();
        if p.status == CycleStatus::Idle {
            return Err(SchedulerError::InvalidTransition {
                from: CycleStatus::Idle.to_string(),
                to: CycleStatus::Idle.to_string(),
            });
        }
        p.status = CycleStatus::Idle;
        p.current_symbol = None;
        p.finished_at = Some(Utc::now());
        Ok(p.clone())
    }

    /// Abort from any state: back to Idle, auto-update off, error kept.
    pub(crate) fn fail(&self, error: String) -> CycleProgress {
        let mut p = self.inner.write();
        p.status = CycleStatus::Idle;
        p.auto_update = false;
        p.current_symbol = None;
        p.finished_at = Some(Utc::now());
        p.last_error = Some(error);
        p.clone()
    }
}

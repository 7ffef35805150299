// =============================================================================
// Rate Budget — caps provider calls per time window
// =============================================================================
//
// Every provider call, batch or on-demand, goes through `acquire()`.  When the
// window is full the caller is suspended until a slot frees; the cap is never
// exceeded and never reported as an error.
//
//   Rolling: a slot frees when the oldest recorded call is `window` old.
//   Fixed:   the window opens on the first call and resets `window` later.
//
// Time comes from `tokio::time`, so paused-clock tests drive it exactly.
// =============================================================================

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::errors::BudgetError;
use crate::runtime_config::{RateLimitConfig, WindowPolicy};

#[derive(Debug)]
struct WindowState {
    /// Rolling: instants of calls still inside the window, oldest first.
    calls: VecDeque<Instant>,
    /// Fixed: when the current window opened.
    window_start: Option<Instant>,
    /// Fixed: calls made in the current window.
    fixed_count: u32,
    total_acquired: u64,
    total_waits: u64,
    total_wait: Duration,
}

/// Value copy of the budget for status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateBudgetSnapshot {
    pub policy: WindowPolicy,
    pub max_calls_per_window: u32,
    pub window_secs: u64,
    pub calls_in_window: u32,
    pub remaining: u32,
    /// Milliseconds until the next slot frees, 0 when one is free now.
    pub next_slot_in_ms: u64,
    pub total_acquired: u64,
    pub total_waits: u64,
    pub total_wait_ms: u64,
}

pub struct RateBudget {
    max_calls: u32,
    window: Duration,
    policy: WindowPolicy,
    state: Mutex<WindowState>,
}

impl RateBudget {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self::with_limits(config.max_calls_per_window, config.window(), config.policy)
    }

    pub fn with_limits(max_calls: u32, window: Duration, policy: WindowPolicy) -> Self {
        info!(
            max_calls,
            window_secs = window.as_secs(),
            ?policy,
            "rate budget initialised"
        );
        Self {
            max_calls,
            window,
            policy,
            state: Mutex::new(WindowState {
                calls: VecDeque::with_capacity(max_calls as usize),
                window_start: None,
                fixed_count: 0,
                total_acquired: 0,
                total_waits: 0,
                total_wait: Duration::ZERO,
            }),
        }
    }

    /// Reserve one provider call, sleeping until the window has room.
    pub async fn acquire(&self) -> Result<(), BudgetError> {
        if self.max_calls == 0 {
            return Err(BudgetError::ZeroCapacity);
        }

        let mut waited = false;
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                match self.try_record(&mut state, now) {
                    None => {
                        state.total_acquired += 1;
                        return Ok(());
                    }
                    Some(wait) => {
                        if !waited {
                            state.total_waits += 1;
                            waited = true;
                        }
                        state.total_wait += wait;
                        wait
                    }
                }
            };

            debug!(wait_ms = wait.as_millis() as u64, "rate budget exhausted, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Records a call at `now` and returns `None`, or returns how long until
    /// a slot frees.
    fn try_record(&self, state: &mut WindowState, now: Instant) -> Option<Duration> {
        match self.policy {
            WindowPolicy::Rolling => {
                prune(&mut state.calls, now, self.window);
                if (state.calls.len() as u32) < self.max_calls {
                    state.calls.push_back(now);
                    return None;
                }
                let free_at = state.calls.front().map_or(now, |&oldest| oldest + self.window);
                Some(free_at.saturating_duration_since(now))
            }
            WindowPolicy::Fixed => {
                let expired = state
                    .window_start
                    .map_or(true, |start| now >= start + self.window);
                if expired {
                    state.window_start = Some(now);
                    state.fixed_count = 0;
                }
                if state.fixed_count < self.max_calls {
                    state.fixed_count += 1;
                    return None;
                }
                let free_at = state.window_start.map_or(now, |start| start + self.window);
                Some(free_at.saturating_duration_since(now))
            }
        }
    }

    pub async fn snapshot(&self) -> RateBudgetSnapshot {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let (used, next_slot) = match self.policy {
            WindowPolicy::Rolling => {
                prune(&mut state.calls, now, self.window);
                let used = state.calls.len() as u32;
                let next = match state.calls.front() {
                    Some(&oldest) if used >= self.max_calls => {
                        (oldest + self.window).saturating_duration_since(now)
                    }
                    _ => Duration::ZERO,
                };
                (used, next)
            }
            WindowPolicy::Fixed => match state.window_start {
                Some(start) if now < start + self.window => {
                    let next = if state.fixed_count >= self.max_calls {
                        (start + self.window).saturating_duration_since(now)
                    } else {
                        Duration::ZERO
                    };
                    (state.fixed_count, next)
                }
                _ => (0, Duration::ZERO),
            },
        };

        RateBudgetSnapshot {
            policy: self.policy,
            max_calls_per_window: self.max_calls,
            window_secs: self.window.as_secs(),
            calls_in_window: used,
            remaining: self.max_calls.saturating_sub(used),
            next_slot_in_ms: next_slot.as_millis() as u64,
            total_acquired: state.total_acquired,
            total_waits: state.total_waits,
            total_wait_ms: state.total_wait.as_millis() as u64,
        }
    }
}

fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(&front) = calls.front() {
        if now.saturating_duration_since(front) >= window {
            calls.pop_front();
        } else {
            break;
        }
    }
}

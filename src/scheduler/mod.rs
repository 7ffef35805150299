// =============================================================================
// Scheduler Module
// =============================================================================
//
// Batch update cycles over the tracked universe plus on-demand refreshes.

pub mod progress;
pub mod update;

pub use progress::{CycleProgress, CycleStatus, ProgressTracker};
pub use update::{RefreshOutcome, UpdateScheduler};

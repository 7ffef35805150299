// =============================================================================
// Analysis Module
// =============================================================================
//
// Derives the per-symbol indicator snapshot from a validated price series.

pub mod engine;

pub use engine::IndicatorEngine;

//! Overlap aggregation and benchmark report generation.
//!
//! This module turns per-frame overlap values plus definedness flags into
//! summary statistics, applying one consistent policy for undefined regions:
//!
//! - A frame where ground truth is defined but the tracker reported nothing
//!   scores 0 (a total miss, not an excluded frame).
//! - Frames without ground truth are excluded from averaging; for
//!   recall/precision, tracker output on such frames counts as a false
//!   positive.
//!
//! It includes:
//!
//! - [`compute_average`] - Policy-adjusted mean overlap
//! - [`compute_recall_precision`] - Threshold classification
//! - [`compute_success_plot`] - One-minus-empirical-CDF success curves
//! - [`compute_fps`] - Throughput over sequences with recorded timing
//! - [`evaluate`] - The tracker-by-sequence evaluation driver

mod scores;
mod success_plot;
mod evaluation;

pub use scores::{compute_average, compute_fps, compute_recall_precision};
pub use success_plot::compute_success_plot;
pub use evaluation::{evaluate, EvalConfig};

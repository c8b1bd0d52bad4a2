//! # Trackeval - Visual Tracker Evaluation
//!
//! Benchmark-style evaluation of visual-object-tracking algorithms against
//! ground-truth annotations.
//!
//! The crate computes per-frame spatial overlap (IoU) between predicted and
//! reference bounding regions, aggregates it into success-plot curves and
//! recall/precision summaries, and reports per-tracker throughput.
//!
//! ## Components
//!
//! - [`geometry`] - Region representation conversions and batch IoU
//! - [`region_file`] - Delimited-text region batch I/O
//! - [`sequence`] - Sequence catalog discovery and ground-truth loading
//! - [`tracker`] - Tracker registry and external process invocation
//! - [`metrics`] - Overlap aggregation, success plots, and the evaluation driver
//!
//! ## Example
//!
//! ```rust,ignore
//! use trackeval::metrics::{evaluate, EvalConfig};
//!
//! let config = EvalConfig {
//!     name: "benchmark".into(),
//!     tracker_registry: "trackers.json".into(),
//!     tracker_selection: "selection.json".into(),
//!     sequence_root: "/data/sequences".into(),
//!     sequence_selection: "sequences.txt".into(),
//!     outcome_dir: "outcomes".into(),
//!     output_dir: "results".into(),
//! };
//! evaluate(&config)?;
//! ```

pub mod geometry;
pub mod region_file;
pub mod sequence;
pub mod tracker;
pub mod metrics;

// Re-exports for convenience
pub use sequence::Sequence;
pub use tracker::{Protocol, Tracker, TrackerRegistry};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur during tracker evaluation
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Batch length mismatch: {left} vs {right} rows")]
        ShapeMismatch { left: usize, right: usize },

        #[error("Sequence '{0}' has no groundtruth file")]
        MissingGroundTruth(String),

        #[error("Frame count mismatch: expected {expected}, got {got}")]
        FrameCountMismatch { expected: usize, got: usize },

        #[error("Tracker invocation failed: {0}")]
        InvocationFailure(String),

        #[error("Unknown tracker protocol: {0}")]
        UnknownProtocol(String),

        #[error("Invalid configuration: {0}")]
        Config(String),

        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        Json(#[from] serde_json::Error),
    }

    /// Result type for trackeval operations
    pub type Result<T> = std::result::Result<T, Error>;
}

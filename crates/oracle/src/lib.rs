//! # The Oracle: Detection Engine & Report Generator
//!
//! Runs the five detectors over an [`anatomist::Snapshot`] in parallel and
//! turns their merged indicators into a [`Report`].
//!
//! ```text
//! Snapshot ──► DetectionEngine ──► DetectionRun ──► Report ──► JSON + Markdown
//!               (rayon fan-out)     (sorted)         (status, plan)
//! ```

pub mod detectors;
pub mod engine;
pub mod report;

pub use detectors::{find_cycles, Detector};
pub use engine::{DetectionEngine, DetectionRun, DetectorOutcome};
pub use report::{RemediationStep, Report, SeverityCounts};

/// Errors produced by the Oracle crate.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// Rule tables failed to compile.
    #[error(transparent)]
    Config(#[from] common::ConfigError),

    /// Report artifact I/O.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Saved report could not be parsed.
    #[error("Invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A detector's own failure.
    #[error("Detector failure: {0}")]
    Detector(String),
}

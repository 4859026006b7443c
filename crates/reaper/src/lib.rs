//! # The Reaper: Quarantine / Isolation Pipeline
//!
//! Takes a list of flagged files and removes them from the live build
//! without losing anything: a backup snapshot first, then a header-stamped
//! copy in the quarantine store, a stub in place of the original, and every
//! import of it stripped from the rest of the project. A compile re-check
//! grades the result and the report carries literal recovery steps.

pub mod cleanup;
pub mod journal;
pub mod lock;
pub mod log;
pub mod pipeline;
pub mod quarantine;
pub mod report;

pub use cleanup::ImportRemoval;
pub use lock::IsolationLock;
pub use log::{IsolationLog, LogEntry, LogStatus};
pub use pipeline::{IsolationPipeline, IsolationRun};
pub use quarantine::QuarantinedFile;
pub use report::{CompileResult, CompileStatus, FailedFile, IsolationReport, Rollback};

/// Errors from reaper operations.
#[derive(Debug, thiserror::Error)]
pub enum ReaperError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid report JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anatomist(#[from] anatomist::AnatomistError),

    #[error("Backup failed: {0}")]
    Shadow(#[from] shadow::ShadowError),

    #[error(transparent)]
    Lazarus(#[from] lazarus::LazarusError),

    #[error("Invalid error pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Another isolation run holds {0}")]
    Locked(String),

    #[error("Refusing to quarantine symlink {0}")]
    Symlink(String),

    #[error("{file} failed ({reason}); all changes rolled back with {failures} rollback failures")]
    RolledBack {
        file: String,
        reason: String,
        failures: usize,
        /// JSON report of the aborted run, if it could be written.
        report: Option<std::path::PathBuf>,
    },
}

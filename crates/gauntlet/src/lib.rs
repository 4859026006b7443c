//! # The Gauntlet: Layered Verification
//!
//! Runs five verification layers in a fixed order against a project tree.
//! Each layer holds a handful of [`Check`]s; checks inside a layer run
//! concurrently, layers never overlap and never abort early.
//!
//! ```text
//! static analysis ─► compilation ─► testing ─► architecture ─► runtime
//!        │                │             │             │            │
//!        └────────────────┴─────────────┴─────────────┴────────────┘
//!                                   ▼
//!                          VerificationReport
//! ```

pub mod check;
pub mod checks;
pub mod layer;
pub mod orchestrator;
pub mod process;
pub mod report;

pub use check::{Check, CheckContext, CheckOutcome, CheckStatus, VerificationCheck};
pub use layer::{LayerKind, LayerStatus, VerificationLayer};
pub use orchestrator::Gauntlet;
pub use process::{run_command, CommandOutput};
pub use report::VerificationReport;

#[derive(Debug, thiserror::Error)]
pub enum GauntletError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Oracle(#[from] oracle::OracleError),

    #[error(transparent)]
    Anatomist(#[from] anatomist::AnatomistError),

    #[error(transparent)]
    Config(#[from] common::config::ConfigError),

    #[error("Invalid error pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("Check `{check}` cannot move from {from} to {to}")]
    InvalidTransition {
        check: String,
        from: CheckStatus,
        to: CheckStatus,
    },

    #[error("Task failed: {0}")]
    Task(String),
}

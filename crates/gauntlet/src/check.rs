//! Check state machine and the [`Check`] trait.

use crate::layer::LayerKind;
use crate::GauntletError;
use anatomist::Snapshot;
use async_trait::async_trait;
use common::{IssueClass, Severity, WardenConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// `pending → passed | failed | warning`; the three outcomes are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pending,
    Passed,
    Failed,
    /// Failure of a best-effort check.
    Warning,
}

impl CheckStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CheckStatus::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::Passed => "passed",
            CheckStatus::Failed => "failed",
            CheckStatus::Warning => "warning",
        }
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The recorded state of one check within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub id: String,
    pub name: String,
    pub layer: LayerKind,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<IssueClass>,
    pub status: CheckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl VerificationCheck {
    pub fn pending(check: &dyn Check, layer: LayerKind) -> Self {
        Self {
            id: check.id().to_string(),
            name: check.name().to_string(),
            layer,
            severity: check.severity(),
            class: check.class(),
            status: CheckStatus::Pending,
            error: None,
            detail: None,
            duration_ms: 0,
        }
    }

    /// Moves a pending check to a terminal status.
    ///
    /// # Errors
    /// `GauntletError::InvalidTransition` if the check is already resolved or
    /// `status` is `Pending`.
    pub fn resolve(&mut self, status: CheckStatus, message: Option<String>) -> Result<(), GauntletError> {
        if self.status.is_terminal() || !status.is_terminal() {
            return Err(GauntletError::InvalidTransition {
                check: self.id.clone(),
                from: self.status,
                to: status,
            });
        }
        self.status = status;
        match status {
            CheckStatus::Passed => self.detail = message,
            _ => self.error = message,
        }
        Ok(())
    }

    /// Failed or warned: contributes its class to the overall status.
    pub fn is_problem(&self) -> bool {
        matches!(self.status, CheckStatus::Failed | CheckStatus::Warning)
    }
}

/// What a check observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Passed(Option<String>),
    Failed(String),
}

/// Shared, read-only inputs of a verification run.
pub struct CheckContext {
    pub root: PathBuf,
    pub config: WardenConfig,
    snapshot: OnceCell<Arc<Snapshot>>,
}

impl CheckContext {
    pub fn new(root: impl Into<PathBuf>, config: WardenConfig) -> Self {
        Self {
            root: root.into(),
            config,
            snapshot: OnceCell::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Analysis snapshot of the project, built on first use and shared by
    /// every check that needs one.
    pub async fn snapshot(&self) -> Result<Arc<Snapshot>, GauntletError> {
        self.snapshot
            .get_or_try_init(|| async {
                let root = self.root.clone();
                let config = self.config.clone();
                let snap = tokio::task::spawn_blocking(move || Snapshot::build(&root, &config))
                    .await
                    .map_err(|e| GauntletError::Task(e.to_string()))??;
                Ok::<_, GauntletError>(Arc::new(snap))
            })
            .await
            .cloned()
    }
}

/// A named verification step.
#[async_trait]
pub trait Check: Send + Sync {
    fn id(&self) -> &'static str;

    fn name(&self) -> &'static str;

    fn severity(&self) -> Severity;

    /// Issue class reported when the check fails; `None` for runtime checks.
    fn class(&self) -> Option<IssueClass>;

    /// Best-effort checks end as `warning` instead of `failed`.
    fn tolerated(&self) -> bool {
        false
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError>;
}

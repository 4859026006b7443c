//! Isolation report.

use crate::cleanup::ImportRemoval;
use crate::log::{IsolationLog, LogStatus};
use crate::quarantine::QuarantinedFile;
use crate::ReaperError;
use chrono::{DateTime, Utc};
use common::artifacts::{write_dual, ArtifactPaths};
use common::config::IsolationMode;
use lazarus::RecoveryInstruction;
use serde::{Deserialize, Serialize};
use shadow::BackupSnapshot;
use std::fmt::{self, Write as _};
use std::path::Path;
use uuid::Uuid;

pub const REPORT_PREFIX: &str = "isolation-report";

/// Most compile errors still classed as a warning.
pub const WARNING_ERROR_LIMIT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompileStatus {
    Success,
    Warning,
    Error,
}

impl CompileStatus {
    /// 0 → success, 1..=3 → warning, more → error.
    pub fn from_errors(errors: usize) -> Self {
        match errors {
            0 => CompileStatus::Success,
            n if n <= WARNING_ERROR_LIMIT => CompileStatus::Warning,
            _ => CompileStatus::Error,
        }
    }
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CompileStatus::Success => "success",
            CompileStatus::Warning => "warning",
            CompileStatus::Error => "error",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResult {
    pub status: CompileStatus,
    pub errors: usize,
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedFile {
    pub file: String,
    pub error: String,
}

/// Set when a transactional run undid its own changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollback {
    /// File (or step) whose failure triggered the rollback.
    pub file: String,
    pub reason: String,
    pub restored: usize,
    pub failures: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub mode: IsolationMode,
    pub backup: BackupSnapshot,
    pub quarantined: Vec<QuarantinedFile>,
    /// Flagged files that did not exist.
    pub skipped: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub import_removals: Vec<ImportRemoval>,
    pub compile: CompileResult,
    pub preserved: Vec<String>,
    pub recovery: Vec<RecoveryInstruction>,
    pub log: IsolationLog,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back: Option<Rollback>,
    pub execution_time_ms: u64,
}

impl IsolationReport {
    pub fn load(path: &Path) -> Result<Self, ReaperError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_artifacts(&self, logs_dir: &Path) -> Result<ArtifactPaths, ReaperError> {
        Ok(write_dual(
            logs_dir,
            REPORT_PREFIX,
            self.generated_at,
            self,
            &self.render_markdown(),
        )?)
    }

    pub fn summary(&self) -> String {
        if let Some(rb) = &self.rolled_back {
            return format!(
                "rolled back after {} failed ({}): {} files restored, {} rollback failures",
                rb.file, rb.reason, rb.restored, rb.failures
            );
        }
        format!(
            "{} quarantined, {} skipped, {} failed, {} imports removed, compile check {} ({} errors), {} files preserved",
            self.quarantined.len(),
            self.skipped.len(),
            self.failed.len(),
            self.import_removals.len(),
            self.compile.status,
            self.compile.errors,
            self.preserved.len()
        )
    }

    pub fn render_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Isolation Report\n");
        let _ = writeln!(md, "- **Run:** `{}`", self.run_id);
        let _ = writeln!(md, "- **Generated:** {}", self.generated_at.to_rfc3339());
        let _ = writeln!(md, "- **Root:** `{}`", self.root);
        let _ = writeln!(md, "- **Mode:** {:?}", self.mode);
        let _ = writeln!(md, "- **Backup:** `{}`", self.backup.path.display());
        let _ = writeln!(md, "- **Execution time:** {} ms\n", self.execution_time_ms);
        let _ = writeln!(md, "{}\n", self.summary());
        if let Some(rb) = &self.rolled_back {
            let _ = writeln!(md, "> **Rolled back** after `{}` failed.\n", rb.file);
        }

        let _ = writeln!(md, "## Quarantined files\n");
        if self.quarantined.is_empty() {
            let _ = writeln!(md, "_None._");
        }
        for q in &self.quarantined {
            let _ = writeln!(
                md,
                "- `{}` → `{}` ({} bytes, blake3 `{}`)",
                q.original,
                q.quarantine_path.display(),
                q.bytes,
                &q.checksum[..q.checksum.len().min(16)]
            );
        }
        for s in &self.skipped {
            let _ = writeln!(md, "- `{s}` skipped: not found");
        }
        for f in &self.failed {
            let _ = writeln!(md, "- `{}` failed: {}", f.file, f.error);
        }

        if !self.import_removals.is_empty() {
            let _ = writeln!(md, "\n## Removed imports\n");
            for r in &self.import_removals {
                let _ = writeln!(md, "- `{}:{}` `{}` → `{}`", r.file, r.line, r.specifier, r.target);
            }
        }

        let _ = writeln!(md, "\n## Compile check\n");
        let _ = writeln!(
            md,
            "`{}`: **{}** ({} errors)",
            self.compile.command, self.compile.status, self.compile.errors
        );
        if let Some(message) = &self.compile.message {
            let _ = writeln!(md, "\n> {message}");
        }

        let _ = writeln!(md, "\n## Recovery\n");
        for (i, step) in self.recovery.iter().enumerate() {
            let _ = writeln!(md, "{}. {}\n", i + 1, step.title);
            let _ = writeln!(md, "```sh");
            for cmd in &step.commands {
                let _ = writeln!(md, "{cmd}");
            }
            let _ = writeln!(md, "```\n");
        }

        let _ = writeln!(md, "## Log\n");
        let _ = writeln!(md, "| Step | Action | Status | Message | Files |\n|---|---|---|---|---|");
        for e in self.log.entries() {
            let files = e.affected_files.as_deref().unwrap_or_default().join(", ");
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} | {} |",
                e.step,
                e.action,
                e.status,
                e.message.replace('|', "\\|"),
                files
            );
        }
        let _ = writeln!(
            md,
            "\n{} warnings, {} errors.",
            self.log.count(LogStatus::Warning),
            self.log.count(LogStatus::Error)
        );
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_thresholds() {
        assert_eq!(CompileStatus::from_errors(0), CompileStatus::Success);
        assert_eq!(CompileStatus::from_errors(1), CompileStatus::Warning);
        assert_eq!(CompileStatus::from_errors(3), CompileStatus::Warning);
        assert_eq!(CompileStatus::from_errors(4), CompileStatus::Error);
    }
}

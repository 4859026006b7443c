//! Verification report and its artifacts.

use crate::check::{CheckStatus, VerificationCheck};
use crate::layer::{LayerStatus, VerificationLayer};
use crate::GauntletError;
use chrono::{DateTime, Utc};
use common::artifacts::{write_dual, ArtifactPaths};
use common::HealthStatus;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

pub const REPORT_PREFIX: &str = "verification-report";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub status: HealthStatus,
    pub layers: Vec<VerificationLayer>,
    pub summary: String,
    pub execution_time_ms: u64,
}

impl VerificationReport {
    /// Classifies the run from the classes of every failed or warned check.
    pub fn build(root: &Path, layers: Vec<VerificationLayer>, elapsed: Duration) -> Self {
        let status = HealthStatus::from_classes(
            layers
                .iter()
                .flat_map(|l| &l.checks)
                .filter(|c| c.is_problem())
                .filter_map(|c| c.class),
        );

        let mut report = Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            root: root.display().to_string(),
            status,
            layers,
            summary: String::new(),
            execution_time_ms: elapsed.as_millis() as u64,
        };
        report.summary = report.summarize();
        report
    }

    pub fn checks(&self) -> impl Iterator<Item = &VerificationCheck> {
        self.layers.iter().flat_map(|l| &l.checks)
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks().filter(|c| c.status == status).count()
    }

    fn summarize(&self) -> String {
        let total = self.checks().count();
        let failed_layers = self
            .layers
            .iter()
            .filter(|l| l.status == LayerStatus::Failed)
            .count();
        format!(
            "{} checks across {} layers: {} passed, {} failed, {} warnings ({} layers failed). Status: {}.",
            total,
            self.layers.len(),
            self.count(CheckStatus::Passed),
            self.count(CheckStatus::Failed),
            self.count(CheckStatus::Warning),
            failed_layers,
            self.status.as_str()
        )
    }

    pub fn load(path: &Path) -> Result<Self, GauntletError> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn write_artifacts(&self, logs_dir: &Path) -> Result<ArtifactPaths, GauntletError> {
        Ok(write_dual(
            logs_dir,
            REPORT_PREFIX,
            self.generated_at,
            self,
            &self.render_markdown(),
        )?)
    }

    pub fn render_markdown(&self) -> String {
        let mut md = String::new();
        let _ = writeln!(md, "# Verification Report\n");
        let _ = writeln!(md, "- **Run:** `{}`", self.run_id);
        let _ = writeln!(md, "- **Generated:** {}", self.generated_at.to_rfc3339());
        let _ = writeln!(md, "- **Root:** `{}`", self.root);
        let _ = writeln!(md, "- **Status:** {}", self.status.as_str().to_uppercase());
        let _ = writeln!(md, "- **Execution time:** {} ms\n", self.execution_time_ms);
        let _ = writeln!(md, "{}", self.summary);

        for layer in &self.layers {
            let _ = writeln!(md, "\n## {} ({})\n", layer.kind, layer.status);
            if layer.checks.is_empty() {
                let _ = writeln!(md, "_No checks._");
                continue;
            }
            let _ = writeln!(md, "| Check | Severity | Status | Time | Notes |\n|---|---|---|---|---|");
            for check in &layer.checks {
                let notes = check
                    .error
                    .as_deref()
                    .or(check.detail.as_deref())
                    .unwrap_or("")
                    .replace('|', "\\|");
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {} ms | {} |",
                    check.name, check.severity, check.status, check.duration_ms, notes
                );
            }
        }
        md
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::LayerKind;
    use common::{IssueClass, Severity};

    fn check(
        id: &str,
        layer: LayerKind,
        class: Option<IssueClass>,
        status: CheckStatus,
    ) -> VerificationCheck {
        VerificationCheck {
            id: id.into(),
            name: id.into(),
            layer,
            severity: Severity::Medium,
            class,
            status,
            error: (status != CheckStatus::Passed).then(|| "broke | badly".to_string()),
            detail: None,
            duration_ms: 3,
        }
    }

    fn report(checks: Vec<VerificationCheck>) -> VerificationReport {
        let layers = LayerKind::ALL
            .iter()
            .map(|kind| {
                let mine = checks.iter().filter(|c| c.layer == *kind).cloned().collect();
                VerificationLayer::new(*kind, mine, 0)
            })
            .collect();
        VerificationReport::build(Path::new("/p"), layers, Duration::from_millis(5))
    }

    #[test]
    fn test_status_precedence() {
        let healthy = report(vec![check(
            "build",
            LayerKind::Compilation,
            Some(IssueClass::Compilation),
            CheckStatus::Passed,
        )]);
        assert_eq!(healthy.status, HealthStatus::Healthy);

        let warning = report(vec![
            check("coverage", LayerKind::Testing, Some(IssueClass::Testing), CheckStatus::Failed),
            check("audit", LayerKind::Runtime, None, CheckStatus::Failed),
        ]);
        assert_eq!(warning.status, HealthStatus::Warning);

        let critical = report(vec![
            check("coverage", LayerKind::Testing, Some(IssueClass::Testing), CheckStatus::Failed),
            check(
                "hallucination-scan",
                LayerKind::StaticAnalysis,
                Some(IssueClass::Hallucination),
                CheckStatus::Failed,
            ),
        ]);
        assert_eq!(critical.status, HealthStatus::Critical);
    }

    #[test]
    fn test_summary_counts() {
        let r = report(vec![
            check("a", LayerKind::Testing, Some(IssueClass::Testing), CheckStatus::Passed),
            check("b", LayerKind::Testing, Some(IssueClass::Testing), CheckStatus::Warning),
            check("c", LayerKind::Architecture, Some(IssueClass::Architecture), CheckStatus::Failed),
        ]);
        assert_eq!(
            r.summary,
            "3 checks across 5 layers: 1 passed, 1 failed, 1 warnings (0 layers failed). Status: warning."
        );
    }

    #[test]
    fn test_artifacts_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let r = report(vec![check(
            "lint",
            LayerKind::Compilation,
            Some(IssueClass::Compilation),
            CheckStatus::Failed,
        )]);
        let paths = r.write_artifacts(dir.path()).unwrap();
        assert!(paths
            .json
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("verification-report-"));

        let loaded = VerificationReport::load(&paths.json).unwrap();
        assert_eq!(loaded, r);

        let md = std::fs::read_to_string(&paths.markdown).unwrap();
        assert!(md.contains("## Layer 2: Compilation (partial)"));
        assert!(md.contains("broke \\| badly"));
        assert!(md.contains("_No checks._"));
    }
}

//! Report Generator.
//!
//! Aggregates a [`DetectionRun`] into severity buckets, per-type counters,
//! an overall [`HealthStatus`], ordered recommendations and a per-file
//! remediation plan, and writes it as JSON + Markdown.

use crate::engine::{DetectionRun, DetectorOutcome};
use crate::OracleError;
use anatomist::Snapshot;
use chrono::{DateTime, Utc};
use common::artifacts::{write_dual, ArtifactPaths};
use common::{DetectionType, HealthStatus, Indicator, IssueClass, Severity};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::path::Path;
use uuid::Uuid;

pub const REPORT_PREFIX: &str = "detection-report";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn get(&self, severity: Severity) -> usize {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// One file in the remediation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationStep {
    /// 1-based; lower is more urgent.
    pub priority: usize,
    pub file: String,
    pub worst_severity: Severity,
    pub indicator_count: usize,
    pub types: BTreeSet<DetectionType>,
    /// Files that import this one, directly or transitively.
    pub dependents: usize,
    pub action: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub root: String,
    pub files_scanned: usize,
    pub status: HealthStatus,
    pub summary: String,
    pub severity_counts: SeverityCounts,
    pub type_counts: BTreeMap<DetectionType, usize>,
    pub indicators: Vec<Indicator>,
    pub recommendations: Vec<String>,
    pub remediation_plan: Vec<RemediationStep>,
    pub detectors: Vec<DetectorOutcome>,
    pub execution_time_ms: u64,
}

impl Report {
    /// Builds the report. `snapshot` supplies file count and impact analysis.
    pub fn build(snapshot: &Snapshot, run: DetectionRun) -> Self {
        let mut severity_counts = SeverityCounts::default();
        let mut type_counts: BTreeMap<DetectionType, usize> =
            DetectionType::ALL.iter().map(|t| (*t, 0)).collect();
        for indicator in &run.indicators {
            severity_counts.add(indicator.severity);
            *type_counts.entry(indicator.kind).or_default() += 1;
        }

        let status = HealthStatus::from_classes(run.indicators.iter().map(|i| i.kind.issue_class()));
        let files_scanned = snapshot.cache.len();
        let summary = format!(
            "Scanned {} files: {} indicators ({} critical, {} high, {} medium, {} low). Status: {}.",
            files_scanned,
            severity_counts.total(),
            severity_counts.critical,
            severity_counts.high,
            severity_counts.medium,
            severity_counts.low,
            status
        );

        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            root: snapshot.cache.root().display().to_string(),
            files_scanned,
            status,
            summary,
            severity_counts,
            recommendations: recommendations(&type_counts),
            remediation_plan: remediation_plan(snapshot, &run.indicators),
            type_counts,
            indicators: run.indicators,
            detectors: run.outcomes,
            execution_time_ms: run.elapsed.as_millis() as u64,
        }
    }

    /// Indicators of one severity, in report order.
    pub fn by_severity(&self, severity: Severity) -> impl Iterator<Item = &Indicator> {
        self.indicators.iter().filter(move |i| i.severity == severity)
    }

    /// Distinct files carrying at least one indicator at `min_severity` or
    /// worse, in path order. This is the quarantine candidate list.
    pub fn flagged_files(&self, min_severity: Severity) -> Vec<String> {
        self.indicators
            .iter()
            .filter(|i| i.severity.at_least(min_severity))
            .map(|i| i.file.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn load(path: &Path) -> Result<Self, OracleError> {
        let bytes = std::fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Writes `detection-report-<ts>.{json,md}` into `logs_dir`.
    pub fn write_artifacts(&self, logs_dir: &Path) -> Result<ArtifactPaths, OracleError> {
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
        let _ = writeln!(md, "# Detection Report\n");
        let _ = writeln!(md, "- **Run:** `{}`", self.run_id);
        let _ = writeln!(md, "- **Generated:** {}", self.generated_at.to_rfc3339());
        let _ = writeln!(md, "- **Root:** `{}`", self.root);
        let _ = writeln!(md, "- **Status:** {}", self.status.as_str().to_uppercase());
        let _ = writeln!(md, "- **Execution time:** {} ms\n", self.execution_time_ms);
        let _ = writeln!(md, "{}\n", self.summary);

        let _ = writeln!(md, "## Severity\n");
        let _ = writeln!(md, "| Severity | Count |\n|---|---|");
        for severity in Severity::ALL {
            let _ = writeln!(md, "| {} | {} |", severity, self.severity_counts.get(severity));
        }

        let _ = writeln!(md, "\n## Detection types\n");
        let _ = writeln!(md, "| Type | Count |\n|---|---|");
        for (kind, count) in &self.type_counts {
            let _ = writeln!(md, "| {} | {} |", kind, count);
        }

        let _ = writeln!(md, "\n## Recommendations\n");
        for (i, rec) in self.recommendations.iter().enumerate() {
            let _ = writeln!(md, "{}. {}", i + 1, rec);
        }

        if !self.remediation_plan.is_empty() {
            let _ = writeln!(md, "\n## Remediation plan\n");
            let _ = writeln!(
                md,
                "| # | File | Worst | Indicators | Dependents | Action |\n|---|---|---|---|---|---|"
            );
            for step in &self.remediation_plan {
                let _ = writeln!(
                    md,
                    "| {} | `{}` | {} | {} | {} | {} |",
                    step.priority,
                    step.file,
                    step.worst_severity,
                    step.indicator_count,
                    step.dependents,
                    step.action
                );
            }
        }

        for severity in Severity::ALL {
            let mut items = self.by_severity(severity).peekable();
            if items.peek().is_none() {
                continue;
            }
            let _ = writeln!(md, "\n## {} indicators\n", capitalize(severity.as_str()));
            for ind in items {
                let _ = writeln!(
                    md,
                    "- `{}:{}:{}` **{}**: {}",
                    ind.file, ind.line, ind.column, ind.kind, ind.reason
                );
                if !ind.content.is_empty() {
                    let _ = writeln!(md, "  - `{}`", ind.content.replace('`', "'"));
                }
                if let Some(suggestion) = &ind.suggestion {
                    let _ = writeln!(md, "  - Suggestion: {}", suggestion);
                }
            }
        }

        let _ = writeln!(md, "\n## Detectors\n");
        let _ = writeln!(md, "| Detector | Indicators | Time (ms) | Error |\n|---|---|---|---|");
        for outcome in &self.detectors {
            let _ = writeln!(
                md,
                "| {} | {} | {} | {} |",
                outcome.name,
                outcome.indicators,
                outcome.duration_ms,
                outcome.error.as_deref().unwrap_or("")
            );
        }
        md
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Recommendations ordered by issue class (hallucination, compilation,
/// testing, architecture), one per detection type present.
fn recommendations(type_counts: &BTreeMap<DetectionType, usize>) -> Vec<String> {
    let mut present: Vec<(IssueClass, DetectionType, usize)> = type_counts
        .iter()
        .filter(|(_, n)| **n > 0)
        .map(|(kind, n)| (kind.issue_class(), *kind, *n))
        .collect();
    present.sort();

    if present.is_empty() {
        return vec!["No issues detected. Keep the detection gate in CI.".to_string()];
    }

    present
        .into_iter()
        .map(|(_, kind, n)| match kind {
            DetectionType::FakeApi => format!(
                "Replace {n} fabricated API call(s) with real implementations before anything ships; consider quarantining the affected files."
            ),
            DetectionType::MissingImport => {
                format!("Fix {n} import(s) that point at files that do not exist.")
            }
            DetectionType::BrokenLogic => format!(
                "Review {n} suspicious control-flow pattern(s) and unfinished-work markers; add tests that exercise them."
            ),
            DetectionType::UndefinedFunction => {
                format!("Import or define {n} undefined function call(s).")
            }
            DetectionType::Circular => format!(
                "Break {n} circular dependency chain(s) by extracting shared code."
            ),
            DetectionType::Orphaned => format!(
                "Remove or consume {n} unused export(s); exports used only by other files are expected here."
            ),
        })
        .collect()
}

fn remediation_plan(snapshot: &Snapshot, indicators: &[Indicator]) -> Vec<RemediationStep> {
    let mut per_file: BTreeMap<&str, (Severity, usize, BTreeSet<DetectionType>)> = BTreeMap::new();
    for ind in indicators {
        let entry = per_file
            .entry(ind.file.as_str())
            .or_insert((Severity::Low, 0, BTreeSet::new()));
        entry.0 = entry.0.min(ind.severity);
        entry.1 += 1;
        entry.2.insert(ind.kind);
    }

    let mut steps: Vec<RemediationStep> = per_file
        .into_iter()
        .map(|(file, (worst, count, types))| RemediationStep {
            priority: 0,
            file: file.to_string(),
            worst_severity: worst,
            indicator_count: count,
            types,
            dependents: snapshot.graph.transitive_dependents(file).len(),
            action: action_for(worst).to_string(),
        })
        .collect();

    steps.sort_by(|a, b| {
        a.worst_severity
            .cmp(&b.worst_severity)
            .then(b.dependents.cmp(&a.dependents))
            .then(b.indicator_count.cmp(&a.indicator_count))
            .then(a.file.cmp(&b.file))
    });
    for (i, step) in steps.iter_mut().enumerate() {
        step.priority = i + 1;
    }
    steps
}

fn action_for(worst: Severity) -> &'static str {
    match worst {
        Severity::Critical => "Quarantine or rewrite before use",
        Severity::High => "Fix before merging",
        Severity::Medium => "Schedule a fix",
        Severity::Low => "Clean up when convenient",
    }
}

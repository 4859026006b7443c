//! Stock checks for each verification layer.

use crate::check::{Check, CheckContext, CheckOutcome};
use crate::layer::LayerKind;
use crate::process::run_command;
use crate::GauntletError;
use async_trait::async_trait;
use common::config::{CommandSpec, VerificationConfig};
use common::{IssueClass, Severity};
use oracle::detectors::FakeApiDetector;
use oracle::{find_cycles, Detector};
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The full check list, grouped by layer in execution order.
pub fn standard_checks(
    config: &common::WardenConfig,
) -> Result<Vec<(LayerKind, Vec<Arc<dyn Check>>)>, GauntletError> {
    let v = &config.verification;
    let pattern = Regex::new(&v.error_pattern)?;
    let timeout = Duration::from_secs(v.timeout_secs);
    let command = |id, name, severity, class, spec: &CommandSpec| {
        shared(CommandCheck {
            id,
            name,
            severity,
            class,
            tolerated: false,
            spec: spec.clone(),
            timeout,
            error_pattern: pattern.clone(),
        })
    };

    let fake_api = FakeApiDetector::new(
        config.rules.fake_api_table()?,
        config.detection.snippet_width,
    );

    Ok(vec![
        (
            LayerKind::StaticAnalysis,
            vec![
                shared(HallucinationScan { detector: fake_api }),
                command(
                    "type-check",
                    "Type check",
                    Severity::Critical,
                    Some(IssueClass::Compilation),
                    &v.type_check,
                ),
            ],
        ),
        (
            LayerKind::Compilation,
            vec![
                command(
                    "build",
                    "Build",
                    Severity::Critical,
                    Some(IssueClass::Compilation),
                    &v.build,
                ),
                command(
                    "lint",
                    "Lint",
                    Severity::Medium,
                    Some(IssueClass::Compilation),
                    &v.lint,
                ),
                shared(BuildArtifacts {
                    dir: v.artifact_dir.clone(),
                }),
            ],
        ),
        (
            LayerKind::Testing,
            vec![
                command(
                    "unit-tests",
                    "Unit tests",
                    Severity::Critical,
                    Some(IssueClass::Testing),
                    &v.unit_tests,
                ),
                shared(CommandCheck {
                    id: "integration",
                    name: "Integration tests",
                    severity: Severity::Medium,
                    class: Some(IssueClass::Testing),
                    tolerated: true,
                    spec: v.integration_tests.clone(),
                    timeout,
                    error_pattern: pattern.clone(),
                }),
                shared(Coverage::from_config(v)),
            ],
        ),
        (
            LayerKind::Architecture,
            vec![
                shared(DirectoryStructure {
                    required: v.required_dirs.clone(),
                }),
                shared(ModuleIsolation),
            ],
        ),
        (
            LayerKind::Runtime,
            vec![
                command(
                    "dependency-audit",
                    "Dependency audit",
                    Severity::High,
                    None,
                    &v.audit,
                ),
                shared(Placeholder {
                    id: "performance-baseline",
                    name: "Performance baseline",
                }),
                shared(Placeholder {
                    id: "error-tracking",
                    name: "Error tracking",
                }),
            ],
        ),
    ])
}

fn shared<C: Check + 'static>(check: C) -> Arc<dyn Check> {
    Arc::new(check)
}

/// Layer 1: re-runs the fake-API detector; any hit fails the check.
pub struct HallucinationScan {
    detector: FakeApiDetector,
}

impl HallucinationScan {
    pub fn new(detector: FakeApiDetector) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl Check for HallucinationScan {
    fn id(&self) -> &'static str {
        "hallucination-scan"
    }

    fn name(&self) -> &'static str {
        "Hallucination scan"
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn class(&self) -> Option<IssueClass> {
        Some(IssueClass::Hallucination)
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let snapshot = ctx.snapshot().await?;
        let found = self.detector.detect(&snapshot)?;
        if found.is_empty() {
            return Ok(CheckOutcome::Passed(Some(format!(
                "{} files clean",
                snapshot.cache.len()
            ))));
        }
        let first = &found[0];
        Ok(CheckOutcome::Failed(format!(
            "{} fake API marker(s), first at {}:{}",
            found.len(),
            first.file,
            first.line
        )))
    }
}

/// Invokes an external tool and judges it by exit status.
pub struct CommandCheck {
    pub id: &'static str,
    pub name: &'static str,
    pub severity: Severity,
    pub class: Option<IssueClass>,
    pub tolerated: bool,
    pub spec: CommandSpec,
    pub timeout: Duration,
    pub error_pattern: Regex,
}

#[async_trait]
impl Check for CommandCheck {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn class(&self) -> Option<IssueClass> {
        self.class
    }

    fn tolerated(&self) -> bool {
        self.tolerated
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let out = run_command(&self.spec, ctx.root(), self.timeout).await?;
        if out.success {
            return Ok(CheckOutcome::Passed(Some(format!("`{}` exited 0", self.spec))));
        }
        let code = out
            .code
            .map_or_else(|| "signal".to_string(), |c| c.to_string());
        let mut message = format!(
            "`{}` exited {} with {} error line(s)",
            self.spec,
            code,
            out.error_count(&self.error_pattern)
        );
        if let Some(last) = out.last_line() {
            message.push_str(": ");
            message.push_str(last);
        }
        Ok(CheckOutcome::Failed(message))
    }
}

/// Layer 2: the build left a non-empty artifact directory behind.
pub struct BuildArtifacts {
    pub dir: String,
}

#[async_trait]
impl Check for BuildArtifacts {
    fn id(&self) -> &'static str {
        "build-artifacts"
    }

    fn name(&self) -> &'static str {
        "Build artifacts"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn class(&self) -> Option<IssueClass> {
        Some(IssueClass::Compilation)
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let path = ctx.root().join(&self.dir);
        let mut entries = match tokio::fs::read_dir(&path).await {
            Ok(entries) => entries,
            Err(_) => {
                return Ok(CheckOutcome::Failed(format!("`{}` does not exist", self.dir)));
            }
        };
        if entries.next_entry().await?.is_none() {
            return Ok(CheckOutcome::Failed(format!("`{}` is empty", self.dir)));
        }
        Ok(CheckOutcome::Passed(Some(format!("`{}` present", self.dir))))
    }
}

/// Layer 3: line coverage from an istanbul `coverage-summary.json`.
pub struct Coverage {
    pub summary: String,
    pub threshold: f64,
}

impl Coverage {
    pub fn from_config(config: &VerificationConfig) -> Self {
        Self {
            summary: config.coverage_summary.clone(),
            threshold: config.coverage_threshold,
        }
    }
}

/// `total.lines.pct` of an istanbul summary.
pub fn line_coverage(summary: &serde_json::Value) -> Option<f64> {
    summary.pointer("/total/lines/pct")?.as_f64()
}

#[async_trait]
impl Check for Coverage {
    fn id(&self) -> &'static str {
        "coverage"
    }

    fn name(&self) -> &'static str {
        "Coverage threshold"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn class(&self) -> Option<IssueClass> {
        Some(IssueClass::Testing)
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let path = ctx.root().join(&self.summary);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(_) => {
                return Ok(CheckOutcome::Failed(format!(
                    "coverage summary `{}` not found",
                    self.summary
                )));
            }
        };
        let value: serde_json::Value = serde_json::from_str(&text)?;
        let Some(pct) = line_coverage(&value) else {
            return Ok(CheckOutcome::Failed("summary has no total line coverage".into()));
        };
        if pct < self.threshold {
            Ok(CheckOutcome::Failed(format!(
                "line coverage {pct:.1}% below {:.1}%",
                self.threshold
            )))
        } else {
            Ok(CheckOutcome::Passed(Some(format!("line coverage {pct:.1}%"))))
        }
    }
}

/// Layer 4: required directories exist.
pub struct DirectoryStructure {
    pub required: Vec<String>,
}

#[async_trait]
impl Check for DirectoryStructure {
    fn id(&self) -> &'static str {
        "directory-structure"
    }

    fn name(&self) -> &'static str {
        "Directory structure"
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn class(&self) -> Option<IssueClass> {
        Some(IssueClass::Architecture)
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .map(String::as_str)
            .filter(|dir| !is_dir(&ctx.root().join(dir)))
            .collect();
        if missing.is_empty() {
            Ok(CheckOutcome::Passed(None))
        } else {
            Ok(CheckOutcome::Failed(format!("missing: {}", missing.join(", "))))
        }
    }
}

fn is_dir(path: &Path) -> bool {
    path.metadata().map(|m| m.is_dir()).unwrap_or(false)
}

/// Layer 4: the import graph has no cycles.
pub struct ModuleIsolation;

#[async_trait]
impl Check for ModuleIsolation {
    fn id(&self) -> &'static str {
        "module-isolation"
    }

    fn name(&self) -> &'static str {
        "Module isolation"
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn class(&self) -> Option<IssueClass> {
        Some(IssueClass::Architecture)
    }

    async fn run(&self, ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        let snapshot = ctx.snapshot().await?;
        let cycles = find_cycles(&snapshot.graph, true);
        match cycles.first() {
            None => Ok(CheckOutcome::Passed(Some(format!(
                "{} imports, no cycles",
                snapshot.graph.edge_count()
            )))),
            Some(first) => Ok(CheckOutcome::Failed(format!(
                "{} import cycle(s), e.g. {}",
                cycles.len(),
                first.join(" -> ")
            ))),
        }
    }
}

/// Layer 5 slot reserved for runtime telemetry. Always passes.
pub struct Placeholder {
    pub id: &'static str,
    pub name: &'static str,
}

#[async_trait]
impl Check for Placeholder {
    fn id(&self) -> &'static str {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn class(&self) -> Option<IssueClass> {
        None
    }

    async fn run(&self, _ctx: &CheckContext) -> Result<CheckOutcome, GauntletError> {
        Ok(CheckOutcome::Passed(Some("not configured".into())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::WardenConfig;
    use std::fs;

    fn ctx(dir: &Path) -> CheckContext {
        CheckContext::new(dir, WardenConfig::default())
    }

    #[test]
    fn test_standard_layout() {
        let layers = standard_checks(&WardenConfig::default()).unwrap();
        let ids: Vec<Vec<&str>> = layers
            .iter()
            .map(|(_, checks)| checks.iter().map(|c| c.id()).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec!["hallucination-scan", "type-check"],
                vec!["build", "lint", "build-artifacts"],
                vec!["unit-tests", "integration", "coverage"],
                vec!["directory-structure", "module-isolation"],
                vec!["dependency-audit", "performance-baseline", "error-tracking"],
            ]
        );
        let integration = &layers[2].1[1];
        assert!(integration.tolerated());
        assert!(layers[4].1.iter().all(|c| c.class().is_none()));
    }

    #[test]
    fn test_bad_error_pattern() {
        let mut config = WardenConfig::default();
        config.verification.error_pattern = "(".into();
        assert!(matches!(
            standard_checks(&config),
            Err(GauntletError::Pattern(_))
        ));
    }

    #[tokio::test]
    async fn test_hallucination_scan() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "export const x = 1;\n").unwrap();
        let config = WardenConfig::default();
        let scan = HallucinationScan::new(FakeApiDetector::new(
            config.rules.fake_api_table().unwrap(),
            80,
        ));
        assert!(matches!(
            scan.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Passed(_)
        ));

        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "fakeThing();\n").unwrap();
        match scan.run(&ctx(dir.path())).await.unwrap() {
            CheckOutcome::Failed(msg) => assert!(msg.contains("a.ts:1"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_build_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let check = BuildArtifacts { dir: "dist".into() };
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Failed(_)
        ));
        fs::create_dir(dir.path().join("dist")).unwrap();
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Failed(ref m) if m.contains("empty")
        ));
        fs::write(dir.path().join("dist/index.js"), "").unwrap();
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Passed(_)
        ));
    }

    #[tokio::test]
    async fn test_coverage_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let check = Coverage {
            summary: "coverage.json".into(),
            threshold: 80.0,
        };
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Failed(_)
        ));

        fs::write(
            dir.path().join("coverage.json"),
            r#"{"total":{"lines":{"total":10,"covered":7,"pct":70}}}"#,
        )
        .unwrap();
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Failed(ref m) if m.contains("70.0%")
        ));

        fs::write(
            dir.path().join("coverage.json"),
            r#"{"total":{"lines":{"pct":92.5}}}"#,
        )
        .unwrap();
        assert!(matches!(
            check.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Passed(_)
        ));
    }

    #[tokio::test]
    async fn test_directory_structure() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("src")).unwrap();
        let check = DirectoryStructure {
            required: vec!["src".into(), "tests".into()],
        };
        match check.run(&ctx(dir.path())).await.unwrap() {
            CheckOutcome::Failed(msg) => assert_eq!(msg, "missing: tests"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_module_isolation() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.ts"), "import './b';\n").unwrap();
        fs::write(dir.path().join("b.ts"), "import './a';\n").unwrap();
        match ModuleIsolation.run(&ctx(dir.path())).await.unwrap() {
            CheckOutcome::Failed(msg) => assert!(msg.contains("a.ts -> b.ts -> a.ts"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }

        fs::write(dir.path().join("b.ts"), "export {};\n").unwrap();
        assert!(matches!(
            ModuleIsolation.run(&ctx(dir.path())).await.unwrap(),
            CheckOutcome::Passed(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_check_reports_errors() {
        let dir = tempfile::tempdir().unwrap();
        let check = CommandCheck {
            id: "build",
            name: "Build",
            severity: Severity::Critical,
            class: Some(IssueClass::Compilation),
            tolerated: false,
            spec: CommandSpec::new("sh", ["-c", "echo 'error: one'; echo 'error: two'; exit 1"]),
            timeout: Duration::from_secs(10),
            error_pattern: Regex::new(r"(?i)\berror\b").unwrap(),
        };
        match check.run(&ctx(dir.path())).await.unwrap() {
            CheckOutcome::Failed(msg) => {
                assert!(msg.contains("exited 1 with 2 error line(s)"), "{msg}");
                assert!(msg.ends_with("error: two"), "{msg}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

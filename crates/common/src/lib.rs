//! Shared vocabulary for every warden crate.
//!
//! Holds the immutable facts the pipeline passes between stages
//! ([`Indicator`], [`Severity`], [`DetectionType`]), the status rule shared by
//! the Report Generator and the Verification Orchestrator ([`HealthStatus`]),
//! and the configuration surface ([`config`], [`capabilities`], [`rules`]).

pub mod artifacts;
pub mod capabilities;
pub mod config;
pub mod rules;

pub use capabilities::CapabilitySet;
pub use config::{ConfigError, WardenConfig};
pub use rules::{PatternMatcher, PatternRule, RuleMatch, RuleScope, RuleTable};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of an indicator or verification check.
///
/// Ordered from most to least severe so that `min()` over a set yields the
/// worst entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// `true` when `self` is at least as severe as `threshold`.
    pub fn at_least(self, threshold: Severity) -> bool {
        self <= threshold
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of defect an indicator describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    FakeApi,
    UndefinedFunction,
    BrokenLogic,
    Orphaned,
    Circular,
    MissingImport,
}

impl DetectionType {
    pub const ALL: [DetectionType; 6] = [
        DetectionType::FakeApi,
        DetectionType::UndefinedFunction,
        DetectionType::BrokenLogic,
        DetectionType::Orphaned,
        DetectionType::Circular,
        DetectionType::MissingImport,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionType::FakeApi => "fake_api",
            DetectionType::UndefinedFunction => "undefined_function",
            DetectionType::BrokenLogic => "broken_logic",
            DetectionType::Orphaned => "orphaned",
            DetectionType::Circular => "circular",
            DetectionType::MissingImport => "missing_import",
        }
    }

    /// Issue class used by the status precedence rule.
    pub fn issue_class(self) -> IssueClass {
        match self {
            DetectionType::FakeApi => IssueClass::Hallucination,
            DetectionType::MissingImport => IssueClass::Compilation,
            DetectionType::BrokenLogic => IssueClass::Testing,
            DetectionType::UndefinedFunction | DetectionType::Orphaned | DetectionType::Circular => {
                IssueClass::Architecture
            }
        }
    }
}

impl fmt::Display for DetectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse issue category driving [`HealthStatus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueClass {
    Hallucination,
    Compilation,
    Testing,
    Architecture,
}

/// Overall run classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Precedence rule: any hallucination or compilation issue is critical,
    /// otherwise any testing or architecture issue is a warning.
    pub fn from_classes<I>(classes: I) -> Self
    where
        I: IntoIterator<Item = IssueClass>,
    {
        let mut status = HealthStatus::Healthy;
        for class in classes {
            match class {
                IssueClass::Hallucination | IssueClass::Compilation => {
                    return HealthStatus::Critical;
                }
                IssueClass::Testing | IssueClass::Architecture => {
                    status = HealthStatus::Warning;
                }
            }
        }
        status
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Warning => "warning",
            HealthStatus::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable finding produced by a detector pass.
///
/// `line` and `column` are 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "type")]
    pub kind: DetectionType,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub content: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Indicator {
    pub fn new(
        kind: DetectionType,
        severity: Severity,
        file: impl Into<String>,
        line: usize,
        column: usize,
    ) -> Self {
        Self {
            kind,
            severity,
            file: file.into(),
            line,
            column,
            content: String::new(),
            reason: String::new(),
            suggestion: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn with_suggestion(mut self, suggestion: Option<String>) -> Self {
        self.suggestion = suggestion;
        self
    }

    /// Total order used to make merged detector output deterministic.
    pub fn sort_key(&self) -> (&str, usize, usize, DetectionType, &str) {
        (&self.file, self.line, self.column, self.kind, &self.reason)
    }
}

/// Trims a source line for display in a report, capping it at `width` chars.
pub fn snippet(line: &str, width: usize) -> String {
    let trimmed = line.trim();
    if trimmed.chars().count() <= width {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

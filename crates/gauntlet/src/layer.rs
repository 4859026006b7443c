//! Verification layers and how their status rolls up.

use crate::check::{CheckStatus, VerificationCheck};
use common::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    StaticAnalysis,
    Compilation,
    Testing,
    Architecture,
    Runtime,
}

impl LayerKind {
    /// Execution order.
    pub const ALL: [LayerKind; 5] = [
        LayerKind::StaticAnalysis,
        LayerKind::Compilation,
        LayerKind::Testing,
        LayerKind::Architecture,
        LayerKind::Runtime,
    ];

    pub fn number(self) -> u8 {
        match self {
            LayerKind::StaticAnalysis => 1,
            LayerKind::Compilation => 2,
            LayerKind::Testing => 3,
            LayerKind::Architecture => 4,
            LayerKind::Runtime => 5,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            LayerKind::StaticAnalysis => "Static Analysis",
            LayerKind::Compilation => "Compilation",
            LayerKind::Testing => "Testing",
            LayerKind::Architecture => "Architecture",
            LayerKind::Runtime => "Runtime",
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer {}: {}", self.number(), self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerStatus {
    Pending,
    Passed,
    Partial,
    Failed,
}

impl LayerStatus {
    /// `failed` if a critical check failed, `partial` if any other check
    /// failed, else `passed`. Warnings do not degrade a layer.
    pub fn of(checks: &[VerificationCheck]) -> Self {
        if checks.iter().any(|c| c.status == CheckStatus::Pending) {
            return LayerStatus::Pending;
        }
        let mut status = LayerStatus::Passed;
        for check in checks.iter().filter(|c| c.status == CheckStatus::Failed) {
            if check.severity == Severity::Critical {
                return LayerStatus::Failed;
            }
            status = LayerStatus::Partial;
        }
        status
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerStatus::Pending => "pending",
            LayerStatus::Passed => "passed",
            LayerStatus::Partial => "partial",
            LayerStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for LayerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationLayer {
    pub kind: LayerKind,
    pub status: LayerStatus,
    pub checks: Vec<VerificationCheck>,
    pub duration_ms: u64,
}

impl VerificationLayer {
    pub fn new(kind: LayerKind, checks: Vec<VerificationCheck>, duration_ms: u64) -> Self {
        Self {
            kind,
            status: LayerStatus::of(&checks),
            checks,
            duration_ms,
        }
    }

    pub fn count(&self, status: CheckStatus) -> usize {
        self.checks.iter().filter(|c| c.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(id: &str, severity: Severity, status: CheckStatus) -> VerificationCheck {
        VerificationCheck {
            id: id.into(),
            name: id.into(),
            layer: LayerKind::Testing,
            severity,
            class: None,
            status,
            error: None,
            detail: None,
            duration_ms: 0,
        }
    }

    #[test]
    fn test_critical_failure_fails_layer() {
        let checks = vec![
            check("a", Severity::Critical, CheckStatus::Failed),
            check("b", Severity::Low, CheckStatus::Passed),
            check("c", Severity::Medium, CheckStatus::Passed),
        ];
        assert_eq!(LayerStatus::of(&checks), LayerStatus::Failed);
    }

    #[test]
    fn test_non_critical_failure_is_partial() {
        let checks = vec![
            check("a", Severity::Critical, CheckStatus::Passed),
            check("b", Severity::High, CheckStatus::Failed),
            check("c", Severity::Medium, CheckStatus::Failed),
        ];
        assert_eq!(LayerStatus::of(&checks), LayerStatus::Partial);
    }

    #[test]
    fn test_no_failures_passes() {
        let checks = vec![
            check("a", Severity::Critical, CheckStatus::Passed),
            check("b", Severity::Medium, CheckStatus::Warning),
        ];
        assert_eq!(LayerStatus::of(&checks), LayerStatus::Passed);
        assert_eq!(LayerStatus::of(&[]), LayerStatus::Passed);
    }

    #[test]
    fn test_unresolved_check_keeps_layer_pending() {
        let checks = vec![check("a", Severity::Low, CheckStatus::Pending)];
        assert_eq!(LayerStatus::of(&checks), LayerStatus::Pending);
    }

    #[test]
    fn test_layer_order() {
        let numbers: Vec<u8> = LayerKind::ALL.iter().map(|k| k.number()).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
        assert_eq!(LayerKind::Runtime.to_string(), "Layer 5: Runtime");
    }
}

use super::{scan_lines, Detector};
use crate::OracleError;
use anatomist::Snapshot;
use common::{snippet, DetectionType, Indicator, RuleTable};

/// Anti-pattern table (tautological conditions, dead branches, bare throws,
/// unfinished-work markers). Severity comes from the matching record.
pub struct BrokenLogicDetector {
    table: RuleTable,
    snippet_width: usize,
}

impl BrokenLogicDetector {
    pub fn new(table: RuleTable, snippet_width: usize) -> Self {
        Self {
            table,
            snippet_width,
        }
    }
}

impl Detector for BrokenLogicDetector {
    fn name(&self) -> &'static str {
        "broken_logic"
    }

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
        Ok(scan_lines(snapshot, &self.table, |file, line_no, line, hit| {
            Indicator::new(
                DetectionType::BrokenLogic,
                hit.rule.severity,
                &file.path,
                line_no,
                hit.column + 1,
            )
            .with_content(snippet(line, self.snippet_width))
            .with_reason(hit.rule.reason.clone())
            .with_suggestion(hit.rule.suggestion.clone())
        }))
    }
}

//! Fabrication markers: placeholder calls, mock-prefixed calls and explicit
//! "not implemented" text.

use super::{scan_lines, Detector};
use crate::OracleError;
use anatomist::Snapshot;
use common::{snippet, DetectionType, Indicator, RuleTable, Severity};

pub struct FakeApiDetector {
    table: RuleTable,
    snippet_width: usize,
}

impl FakeApiDetector {
    pub fn new(table: RuleTable, snippet_width: usize) -> Self {
        Self {
            table,
            snippet_width,
        }
    }
}

impl Detector for FakeApiDetector {
    fn name(&self) -> &'static str {
        "fake_api"
    }

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
        Ok(scan_lines(snapshot, &self.table, |file, line_no, line, hit| {
            // Always critical, whatever the table record says.
            Indicator::new(
                DetectionType::FakeApi,
                Severity::Critical,
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

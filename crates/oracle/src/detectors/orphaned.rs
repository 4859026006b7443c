use super::{line_snippet, Detector};
use crate::OracleError;
use anatomist::Snapshot;
use common::{DetectionType, Indicator, Severity};

/// Exports whose single-file "used" flag is false.
///
/// Inherits the symbol builder's heuristic: an export consumed only by other
/// files is still reported.
pub struct OrphanedExportDetector {
    snippet_width: usize,
}

impl OrphanedExportDetector {
    pub fn new(snippet_width: usize) -> Self {
        Self { snippet_width }
    }
}

impl Detector for OrphanedExportDetector {
    fn name(&self) -> &'static str {
        "orphaned_export"
    }

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError> {
        let mut out = Vec::new();
        for table in snapshot.symbols.iter() {
            let Some(file) = snapshot.cache.get(&table.file) else {
                continue;
            };
            for (name, export) in table.exports.iter().filter(|(_, e)| !e.used) {
                out.push(
                    Indicator::new(
                        DetectionType::Orphaned,
                        Severity::Low,
                        &table.file,
                        export.line,
                        export.column,
                    )
                    .with_content(line_snippet(file, export.line, self.snippet_width))
                    .with_reason(format!("Export `{name}` is never called in its own file"))
                    .with_suggestion(Some(format!(
                        "Remove `{name}` or confirm another module consumes it"
                    ))),
                );
            }
        }
        Ok(out)
    }
}

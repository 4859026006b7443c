//! The five snapshot detectors.
//!
//! Each detector is read-only over the [`Snapshot`] and returns its own
//! indicator buffer; the engine merges buffers after every detector has
//! finished.

mod broken_logic;
mod circular;
mod fake_api;
mod orphaned;
mod undefined;

pub use broken_logic::BrokenLogicDetector;
pub use circular::{find_cycles, CircularDependencyDetector};
pub use fake_api::FakeApiDetector;
pub use orphaned::OrphanedExportDetector;
pub use undefined::UndefinedSymbolDetector;

use crate::OracleError;
use anatomist::lexer::mask_non_code;
use anatomist::{SourceFile, Snapshot};
use common::{snippet, Indicator, RuleTable};

/// A single analysis pass over a snapshot.
pub trait Detector: Send + Sync {
    /// Stable identifier used in logs and detector outcomes.
    fn name(&self) -> &'static str;

    fn detect(&self, snapshot: &Snapshot) -> Result<Vec<Indicator>, OracleError>;
}

/// Trimmed text of 1-indexed `line` in `file`, or empty.
pub(crate) fn line_snippet(file: &SourceFile, line: usize, width: usize) -> String {
    file.content
        .lines()
        .nth(line.saturating_sub(1))
        .map(|l| snippet(l, width))
        .unwrap_or_default()
}

/// Runs `table` over every line of every cached file. `Code` rules see the
/// line with strings and comments blanked.
///
/// `build` turns a rule hit into an indicator; line and column are 1-indexed.
pub(crate) fn scan_lines<F>(snapshot: &Snapshot, table: &RuleTable, mut build: F) -> Vec<Indicator>
where
    F: FnMut(&SourceFile, usize, &str, common::RuleMatch<'_>) -> Indicator,
{
    let mut out = Vec::new();
    for file in snapshot.cache.iter() {
        let masked = mask_non_code(&file.content);
        for ((line_no, line), code) in file.numbered_lines().zip(masked.lines()) {
            for hit in table.scan(line, code) {
                out.push(build(file, line_no, line, hit));
            }
        }
    }
    out
}

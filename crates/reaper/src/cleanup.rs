//! Removing imports of quarantined files from the rest of the project.

use crate::journal::{splice_out, Journal};
use crate::ReaperError;
use anatomist::imports::{extract_statements, is_relative, resolve_specifier};
use anatomist::path_util::{join_relative, parent_key, strip_extension};
use anatomist::FileCache;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRemoval {
    pub file: String,
    pub line: usize,
    pub specifier: String,
    /// Quarantined file the specifier pointed at.
    pub target: String,
}

/// The quarantined file `specifier` (written in `importer`) refers to, by
/// exact path, by extension-stripped path, or through a suffix variant.
pub fn quarantined_target(
    importer: &str,
    specifier: &str,
    quarantined: &BTreeSet<String>,
    cache: &FileCache,
    variants: &[String],
) -> Option<String> {
    if !is_relative(specifier) {
        return None;
    }
    let base = join_relative(parent_key(importer), specifier)?;
    if let Some(hit) = quarantined
        .iter()
        .find(|q| base == **q || base == strip_extension(q))
    {
        return Some(hit.clone());
    }
    resolve_specifier(importer, specifier, cache, variants).filter(|r| quarantined.contains(r))
}

/// Cached files with at least one import that resolves to a member of
/// `targets`, in path order. Uses cached content.
pub fn importers_of(
    cache: &FileCache,
    targets: &BTreeSet<String>,
    variants: &[String],
) -> Vec<String> {
    cache
        .iter()
        .filter(|f| !targets.contains(&f.path))
        .filter(|f| {
            extract_statements(&f.content).iter().any(|stmt| {
                quarantined_target(&f.path, &stmt.specifier, targets, cache, variants).is_some()
            })
        })
        .map(|f| f.path.clone())
        .collect()
}

/// Strips every import statement that targets a quarantined file from every
/// other cached file. Reads current content from disk.
pub fn remove_quarantined_imports(
    root: &Path,
    cache: &FileCache,
    quarantined: &BTreeSet<String>,
    variants: &[String],
    journal: &mut Journal,
) -> Result<Vec<ImportRemoval>, ReaperError> {
    let mut removals = Vec::new();

    for key in cache.paths().filter(|k| !quarantined.contains(*k)) {
        let path = root.join(key);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                debug!(file = %key, error = %e, "skipping unreadable file");
                continue;
            }
        };

        let mut spans = Vec::new();
        for stmt in extract_statements(&content) {
            if let Some(target) =
                quarantined_target(key, &stmt.specifier, quarantined, cache, variants)
            {
                removals.push(ImportRemoval {
                    file: key.to_string(),
                    line: stmt.line,
                    specifier: stmt.specifier.clone(),
                    target,
                });
                spans.push(stmt.span);
            }
        }
        if spans.is_empty() {
            continue;
        }

        journal.touch(&path)?;
        let (cleaned, removed) = splice_out(&content, &spans);
        fs::write(&path, cleaned)?;
        debug!(file = %key, removed, "imports removed");
    }

    Ok(removals)
}

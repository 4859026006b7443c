//! # Import Extraction & Resolution
//!
//! Finds module specifiers in `import ... from '...'`, `export ... from '...'`
//! and side-effect `import '...'` statements, and resolves relative ones to
//! cached files by trying suffix variants in a fixed order.

use crate::cache::FileCache;
use crate::lexer::LineIndex;
use crate::path_util::{join_relative, parent_key};
use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

/// One module specifier found in an import/export statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportStatement {
    /// The string between the quotes (`./b`, `react`).
    pub specifier: String,
    /// Byte range of the whole statement, including a trailing `;`.
    pub span: Range<usize>,
    /// Line/column of the specifier (1-indexed).
    pub line: usize,
    pub column: usize,
}

impl ImportStatement {
    /// `./x` and `../x` specifiers; bare package names are external.
    pub fn is_relative(&self) -> bool {
        is_relative(&self.specifier)
    }
}

pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with('.')
}

static STATEMENT_RE: OnceLock<Regex> = OnceLock::new();

fn statement_re() -> &'static Regex {
    STATEMENT_RE.get_or_init(|| {
        Regex::new(
            r#"(?m)^[ \t]*(?:(?:import|export)\b[^;'"`()=]*?\bfrom\s*|import\s*)['"]([^'"\n]+)['"][ \t]*;?"#,
        )
        .expect("Invalid import statement regex")
    })
}

/// Extracts every import/export-from statement in `source`, in file order.
///
/// # Examples
/// ```
/// use anatomist::imports::extract_statements;
///
/// let src = "import { a } from './a';\nimport 'polyfill';\nexport * from '../b';\n";
/// let specs: Vec<String> = extract_statements(src).into_iter().map(|s| s.specifier).collect();
/// assert_eq!(specs, vec!["./a", "polyfill", "../b"]);
/// ```
pub fn extract_statements(source: &str) -> Vec<ImportStatement> {
    let index = LineIndex::new(source);
    statement_re()
        .captures_iter(source)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let spec = caps.get(1)?;
            let (line, column) = index.position(spec.start());
            Some(ImportStatement {
                specifier: spec.as_str().to_string(),
                span: whole.start()..whole.end(),
                line,
                column,
            })
        })
        .collect()
}

/// Suffixes tried, in order, when resolving a relative specifier: as written,
/// then `.<ext>` for each extension, then `/index.<ext>` for each extension.
pub fn suffix_variants(extensions: &[String]) -> Vec<String> {
    let mut variants = Vec::with_capacity(1 + extensions.len() * 2);
    variants.push(String::new());
    variants.extend(extensions.iter().map(|ext| format!(".{ext}")));
    variants.extend(extensions.iter().map(|ext| format!("/index.{ext}")));
    variants
}

/// Resolves `specifier`, written in `importer`, to a cached file key.
///
/// Returns `None` for non-relative specifiers, specifiers that climb out of
/// the project, and specifiers no variant of which is cached.
pub fn resolve_specifier(
    importer: &str,
    specifier: &str,
    cache: &FileCache,
    variants: &[String],
) -> Option<String> {
    if !is_relative(specifier) {
        return None;
    }
    let base = join_relative(parent_key(importer), specifier)?;
    variants
        .iter()
        .map(|suffix| format!("{base}{suffix}"))
        .find(|candidate| cache.contains(candidate))
}

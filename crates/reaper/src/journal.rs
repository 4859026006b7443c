//! Undo journal for files the pipeline mutates.
//!
//! ## Workflow
//! 1. `touch(path)` before the first write to a file records its original
//!    bytes (in memory, once per file).
//! 2. `created(path)` records files the pipeline brought into existence.
//! 3. `rollback()` writes every original back and deletes created files.
//!
//! Import cleanup edits go through [`splice_out`], which removes byte ranges
//! bottom-to-top so earlier offsets stay valid during the edit.

use crate::ReaperError;
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Default)]
pub struct Journal {
    /// `path → original bytes`
    originals: BTreeMap<PathBuf, Vec<u8>>,
    created: Vec<PathBuf>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `path`'s current content if this is the first touch.
    pub fn touch(&mut self, path: &Path) -> Result<(), ReaperError> {
        if !self.originals.contains_key(path) {
            let bytes = std::fs::read(path)?;
            self.originals.insert(path.to_path_buf(), bytes);
        }
        Ok(())
    }

    pub fn created(&mut self, path: &Path) {
        self.created.push(path.to_path_buf());
    }

    pub fn touched(&self) -> usize {
        self.originals.len()
    }

    /// Restores every touched file and removes created ones. Keeps going
    /// past individual failures and returns how many operations failed.
    pub fn rollback(&self) -> usize {
        let mut failures = 0;
        for (path, bytes) in &self.originals {
            if let Err(e) = std::fs::write(path, bytes) {
                warn!(file = %path.display(), error = %e, "rollback write failed");
                failures += 1;
            }
        }
        for path in self.created.iter().rev() {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(file = %path.display(), error = %e, "rollback remove failed");
                    failures += 1;
                }
            }
        }
        failures
    }
}

/// Removes `spans` from `content`, last span first. A newline directly after
/// a span goes with it so no blank line is left behind. Overlapping or
/// out-of-range spans are skipped.
pub fn splice_out(content: &str, spans: &[Range<usize>]) -> (String, usize) {
    let mut ordered: Vec<&Range<usize>> = spans.iter().collect();
    ordered.sort_by(|a, b| b.start.cmp(&a.start));

    let mut out = content.to_string();
    let mut removed = 0;
    let mut floor = content.len();
    for span in ordered {
        if span.start >= span.end
            || span.end > floor
            || !out.is_char_boundary(span.start)
            || !out.is_char_boundary(span.end)
        {
            continue;
        }
        let mut end = span.end;
        if out.as_bytes().get(end) == Some(&b'\n') {
            end += 1;
        } else if out.as_bytes().get(end) == Some(&b'\r')
            && out.as_bytes().get(end + 1) == Some(&b'\n')
        {
            end += 2;
        }
        out.replace_range(span.start..end, "");
        floor = span.start;
        removed += 1;
    }
    (out, removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_splice_bottom_to_top() {
        let src = "import a from './a';\nimport b from './b';\nconst x = 1;\n";
        let a = 0..20;
        let b = 21..41;
        assert_eq!(&src[b.clone()], "import b from './b';");
        let (out, n) = splice_out(src, &[a, b]);
        assert_eq!(out, "const x = 1;\n");
        assert_eq!(n, 2);
    }

    #[test]
    fn test_splice_crlf_and_overlap() {
        let src = "import a from './a';\r\nrest";
        assert_eq!(splice_out(src, &[0..20]), ("rest".to_string(), 1));

        let (out, n) = splice_out("abcdef", &[0..4, 2..6]);
        assert_eq!(out, "ab");
        assert_eq!(n, 1);
    }

    #[test]
    fn test_splice_ignores_bad_spans() {
        let src = "héllo";
        let (out, n) = splice_out(src, &[2..3, 4..100, 3..3]);
        assert_eq!(out, src);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_rollback_restores_and_removes() {
        let dir = tempfile::tempdir().unwrap();
        let edited = dir.path().join("a.ts");
        let created = dir.path().join("copy.ts");
        fs::write(&edited, "original").unwrap();

        let mut journal = Journal::new();
        journal.touch(&edited).unwrap();
        fs::write(&edited, "first edit").unwrap();
        journal.touch(&edited).unwrap();
        fs::write(&edited, "second edit").unwrap();
        fs::write(&created, "new").unwrap();
        journal.created(&created);

        assert_eq!(journal.touched(), 1);
        assert_eq!(journal.rollback(), 0);
        assert_eq!(fs::read_to_string(&edited).unwrap(), "original");
        assert!(!created.exists());
    }
}

//! File Collector & Cache.
//!
//! Walks the project once, loads every source file into an immutable map keyed
//! by project-relative path, and hands out shared references for the rest of
//! the run. Unreadable files are skipped: they are simply absent from the
//! cache.

use crate::path_util::{canonical_root, relative_key};
use crate::AnatomistError;
use common::config::CollectorConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// One cached source file. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Project-relative, forward-slash path.
    pub path: String,
    pub content: String,
}

impl SourceFile {
    /// Iterates `(line_number, line)` pairs, 1-indexed.
    pub fn numbered_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.content.lines().enumerate().map(|(i, l)| (i + 1, l))
    }
}

/// Run-scoped, read-only file cache.
#[derive(Debug, Clone, Default)]
pub struct FileCache {
    root: PathBuf,
    files: BTreeMap<String, SourceFile>,
}

impl FileCache {
    /// Collects every source file under `project_root`.
    ///
    /// Excluded directories and warden's own `work_dir` (relative to the
    /// root) are pruned during the walk, so their contents are never read.
    /// The work dir is pruned whatever `exclude_dirs` says.
    ///
    /// # Errors
    /// Only fails if `project_root` itself cannot be canonicalized.
    pub fn collect(
        project_root: &Path,
        config: &CollectorConfig,
        work_dir: &str,
    ) -> Result<Self, AnatomistError> {
        let root = canonical_root(project_root)?;
        let work = root.join(work_dir);
        let work = dunce::canonicalize(&work).unwrap_or(work);
        let mut files = BTreeMap::new();

        for entry in WalkDir::new(&root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                e.depth() == 0
                    || !e.file_type().is_dir()
                    || (e.path() != work
                        && e
                            .file_name()
                            .to_str()
                            .map(|name| !config.is_excluded_dir(name))
                            .unwrap_or(true))
            })
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let is_source = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| config.is_source_extension(ext))
                .unwrap_or(false);
            if !is_source {
                continue;
            }

            if let Ok(meta) = entry.metadata() {
                if meta.len() > config.max_file_size {
                    debug!(file = %path.display(), size = meta.len(), "skipping oversized file");
                    continue;
                }
            }

            let key = match relative_key(&root, path) {
                Ok(k) => k,
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "skipping file");
                    continue;
                }
            };
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    files.insert(key.clone(), SourceFile { path: key, content });
                }
                Err(e) => {
                    debug!(file = %path.display(), error = %e, "skipping unreadable file");
                }
            }
        }

        debug!(root = %root.display(), files = files.len(), "file cache populated");
        Ok(Self { root, files })
    }

    /// Builds a cache from in-memory sources (no filesystem access).
    pub fn from_sources<I, P, C>(root: impl Into<PathBuf>, sources: I) -> Self
    where
        I: IntoIterator<Item = (P, C)>,
        P: Into<String>,
        C: Into<String>,
    {
        let files = sources
            .into_iter()
            .map(|(p, c)| {
                let path = p.into();
                (
                    path.clone(),
                    SourceFile {
                        path,
                        content: c.into(),
                    },
                )
            })
            .collect();
        Self {
            root: root.into(),
            files,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, path: &str) -> Option<&SourceFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    /// Files in path order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

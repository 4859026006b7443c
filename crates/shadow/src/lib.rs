//! # Shadow: Pre-Mutation Backups
//!
//! Copies the project's source directories, every individual file a run is
//! about to touch, and the primary config files into a timestamp-named
//! directory before anything on disk is changed.
//!
//! ```text
//! <backup_root>/backup-20260301T101500123Z/
//! ├── manifest.json                 the BackupSnapshot itself
//! ├── src/...                       mirrored source tree
//! ├── a.ts                          affected file outside the source dirs
//! ├── package.json.backup           config files, relative path kept
//! └── config/app.json.backup
//! ```

use chrono::{DateTime, Utc};
use common::artifacts::file_timestamp;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Prefix of every snapshot directory name.
pub const BACKUP_PREFIX: &str = "backup-";

/// Suffix appended to backed-up config files.
pub const CONFIG_SUFFIX: &str = ".backup";

/// Snapshot description written at the top of every backup directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Errors from backup operations.
#[derive(Debug, thiserror::Error)]
pub enum ShadowError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Walk error: {0}")]
    WalkError(#[from] walkdir::Error),
    #[error("Invalid backup manifest: {0}")]
    Manifest(#[from] serde_json::Error),
    #[error("Path escapes project root: {0}")]
    OutsideRoot(String),
}

/// A finished backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSnapshot {
    pub path: PathBuf,
    /// Source directories that existed and were copied.
    pub source_dirs: Vec<String>,
    /// Individual files copied because they lie outside `source_dirs`.
    #[serde(default)]
    pub files: Vec<String>,
    /// Config files copied, by original relative path.
    pub config_files: Vec<String>,
    pub files_copied: usize,
}

impl BackupSnapshot {
    /// Reads `<dir>/manifest.json`.
    pub fn load(dir: &Path) -> Result<Self, ShadowError> {
        let text = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Where `config` lives inside the snapshot, relative to it.
    pub fn config_backup_name(config: &str) -> String {
        format!("{config}{CONFIG_SUFFIX}")
    }

    /// `true` if `file` was copied, either on its own or as part of a
    /// source directory.
    pub fn covers(&self, file: &str) -> bool {
        self.files.iter().any(|f| f == file) || under_any(file, &self.source_dirs)
    }
}

/// Writes and enumerates snapshots under one backup root.
pub struct BackupManager {
    project_root: PathBuf,
    backup_root: PathBuf,
    exclude_dirs: Vec<String>,
    work_dir: Option<PathBuf>,
}

impl BackupManager {
    pub fn new(project_root: &Path, backup_root: &Path) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            backup_root: backup_root.to_path_buf(),
            exclude_dirs: Vec::new(),
            work_dir: None,
        }
    }

    /// Directory names never copied (dependency folders, warden's own state).
    pub fn with_exclusions(mut self, exclude_dirs: &[String]) -> Self {
        self.exclude_dirs = exclude_dirs.to_vec();
        self
    }

    /// A directory never copied, whatever its name (warden's own state).
    pub fn with_work_dir(mut self, work_dir: &Path) -> Self {
        self.work_dir = Some(work_dir.to_path_buf());
        self
    }

    pub fn backup_root(&self) -> &Path {
        &self.backup_root
    }

    /// Snapshots `source_dirs`, `files` and `config_files` (all relative to
    /// the project root). Missing entries are skipped, as are files already
    /// inside a copied source directory.
    ///
    /// # Errors
    /// Any copy failure, or a path that leaves the project root; a partial
    /// snapshot directory may remain.
    pub fn create(
        &self,
        source_dirs: &[String],
        files: &[String],
        config_files: &[String],
        at: DateTime<Utc>,
    ) -> Result<BackupSnapshot, ShadowError> {
        fs::create_dir_all(&self.backup_root)?;
        let dest = self.reserve_dir(at)?;

        let mut snapshot = BackupSnapshot {
            path: dest.clone(),
            source_dirs: Vec::new(),
            files: Vec::new(),
            config_files: Vec::new(),
            files_copied: 0,
        };

        for dir in source_dirs {
            let src = self.project_root.join(dir);
            if !src.is_dir() {
                debug!(dir = %dir, "source dir missing, not backed up");
                continue;
            }
            snapshot.files_copied += self.copy_tree(&src, &dest.join(dir))?;
            snapshot.source_dirs.push(dir.clone());
        }

        for file in files {
            let relative = confined(file)?;
            let src = self.project_root.join(&relative);
            if !src.is_file()
                || under_any(file, &snapshot.source_dirs)
                || snapshot.files.contains(file)
            {
                continue;
            }
            copy_file(&src, &dest.join(&relative))?;
            snapshot.files_copied += 1;
            snapshot.files.push(file.clone());
        }

        for name in config_files {
            let relative = confined(name)?;
            let src = self.project_root.join(&relative);
            if !src.is_file() {
                continue;
            }
            copy_file(&src, &dest.join(BackupSnapshot::config_backup_name(name)))?;
            snapshot.files_copied += 1;
            snapshot.config_files.push(name.clone());
        }

        fs::write(dest.join(MANIFEST_FILE), serde_json::to_string_pretty(&snapshot)?)?;

        info!(
            backup = %dest.display(),
            files = snapshot.files_copied,
            "backup created"
        );
        Ok(snapshot)
    }

    /// Snapshot directories, oldest first.
    pub fn list(&self) -> Result<Vec<PathBuf>, ShadowError> {
        if !self.backup_root.is_dir() {
            return Ok(Vec::new());
        }
        let mut found = Vec::new();
        for entry in fs::read_dir(&self.backup_root)? {
            let entry = entry?;
            let is_backup = entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(BACKUP_PREFIX));
            if is_backup && entry.file_type()?.is_dir() {
                found.push(entry.path());
            }
        }
        found.sort();
        Ok(found)
    }

    pub fn latest(&self) -> Result<Option<PathBuf>, ShadowError> {
        Ok(self.list()?.pop())
    }

    /// Creates `backup-<ts>`, or `backup-<ts>-N` if that name is taken.
    fn reserve_dir(&self, at: DateTime<Utc>) -> Result<PathBuf, ShadowError> {
        let stem = format!("{BACKUP_PREFIX}{}", file_timestamp(at));
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}-{attempt}")
            };
            let candidate = self.backup_root.join(name);
            match fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn copy_tree(&self, src: &Path, dest: &Path) -> Result<usize, ShadowError> {
        let mut copied = 0;
        let walker = WalkDir::new(src).into_iter().filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || (self.work_dir.as_deref() != Some(e.path())
                    && !e.path().starts_with(&self.backup_root)
                    && e
                        .file_name()
                        .to_str()
                        .map_or(true, |n| !self.exclude_dirs.iter().any(|x| x == n)))
        });

        for entry in walker {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(src)
                .map_err(|_| ShadowError::OutsideRoot(entry.path().display().to_string()))?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&target)?;
            } else if entry.file_type().is_file() {
                copy_file(entry.path(), &target)?;
                copied += 1;
            }
        }
        Ok(copied)
    }
}

fn copy_file(src: &Path, dest: &Path) -> Result<(), ShadowError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;
    Ok(())
}

/// `file` lies inside one of `dirs` (all project-relative).
fn under_any(file: &str, dirs: &[String]) -> bool {
    dirs.iter().any(|d| Path::new(file).starts_with(d))
}

/// Rejects absolute paths and `..` components.
fn confined(relative: &str) -> Result<PathBuf, ShadowError> {
    let path = Path::new(relative);
    let ok = !relative.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok {
        Ok(path.to_path_buf())
    } else {
        Err(ShadowError::OutsideRoot(relative.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/util")).unwrap();
        fs::create_dir_all(root.join("src/node_modules/pkg")).unwrap();
        fs::write(root.join("src/a.ts"), "export const a = 1;\n").unwrap();
        fs::write(root.join("src/util/b.ts"), "export const b = 2;\n").unwrap();
        fs::write(root.join("src/node_modules/pkg/index.js"), "").unwrap();
        fs::write(root.join("package.json"), "{}").unwrap();
        dir
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 15, 0).unwrap()
    }

    #[test]
    fn test_backup_copies_sources_and_configs() {
        let dir = project();
        let root = dir.path();
        let manager = BackupManager::new(root, &root.join(".warden/backups"))
            .with_exclusions(&["node_modules".to_string()]);

        let snap = manager
            .create(
                &["src".into(), "lib".into()],
                &[],
                &["package.json".into(), "tsconfig.json".into()],
                at(),
            )
            .unwrap();

        assert_eq!(
            snap.path.file_name().unwrap().to_str().unwrap(),
            "backup-20260301T101500000Z"
        );
        assert_eq!(snap.source_dirs, vec!["src".to_string()]);
        assert_eq!(snap.config_files, vec!["package.json".to_string()]);
        assert_eq!(snap.files_copied, 3);
        assert_eq!(
            fs::read_to_string(snap.path.join("src/util/b.ts")).unwrap(),
            "export const b = 2;\n"
        );
        assert!(snap.path.join("package.json.backup").is_file());
        assert!(!snap.path.join("src/node_modules").exists());
    }

    #[test]
    fn test_same_timestamp_never_overwrites() {
        let dir = project();
        let root = dir.path();
        let manager = BackupManager::new(root, &root.join("backups"));
        let first = manager.create(&["src".into()], &[], &[], at()).unwrap();
        let second = manager.create(&["src".into()], &[], &[], at()).unwrap();

        assert_ne!(first.path, second.path);
        assert!(second.path.to_str().unwrap().ends_with("-1"));
        assert_eq!(manager.list().unwrap(), vec![first.path, second.path.clone()]);
        assert_eq!(manager.latest().unwrap(), Some(second.path));
    }

    #[test]
    fn test_list_without_root() {
        let dir = tempfile::tempdir().unwrap();
        let manager = BackupManager::new(dir.path(), &dir.path().join("nope"));
        assert!(manager.list().unwrap().is_empty());
        assert_eq!(manager.latest().unwrap(), None);
    }

    #[test]
    fn test_loose_files_and_nested_configs() {
        let dir = project();
        let root = dir.path();
        fs::write(root.join("main.ts"), "import './src/a';\n").unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("config/app.json"), "{\"port\":1}").unwrap();
        let manager = BackupManager::new(root, &root.join(".warden/backups"));

        let snap = manager
            .create(
                &["src".into()],
                &["main.ts".into(), "src/a.ts".into(), "gone.ts".into(), "main.ts".into()],
                &["config/app.json".into()],
                at(),
            )
            .unwrap();

        assert_eq!(snap.files, vec!["main.ts".to_string()]);
        assert!(snap.covers("main.ts"));
        assert!(snap.covers("src/util/b.ts"));
        assert!(!snap.covers("other.ts"));
        assert_eq!(
            fs::read_to_string(snap.path.join("main.ts")).unwrap(),
            "import './src/a';\n"
        );
        assert!(snap.path.join("config/app.json.backup").is_file());
        assert_eq!(BackupSnapshot::load(&snap.path).unwrap(), snap);
    }

    #[test]
    fn test_escaping_file_is_refused() {
        let dir = project();
        let root = dir.path();
        let manager = BackupManager::new(root, &root.join("backups"));
        assert!(matches!(
            manager.create(&[], &["../outside.ts".into()], &[], at()),
            Err(ShadowError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_work_dir_never_copied() {
        let dir = project();
        let root = dir.path();
        fs::create_dir_all(root.join("state/quarantine")).unwrap();
        fs::write(root.join("state/quarantine/old.ts"), "x").unwrap();
        let manager = BackupManager::new(root, &root.join("state/backups"))
            .with_work_dir(&root.join("state"));

        let first = manager.create(&[".".into()], &[], &[], at()).unwrap();
        let second = manager.create(&[".".into()], &[], &[], at()).unwrap();

        assert!(first.path.join("src/a.ts").is_file());
        assert!(!first.path.join("state").exists());
        assert!(!second.path.join("state").exists());
    }
}

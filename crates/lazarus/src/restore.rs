//! Putting quarantined files and backup snapshots back.

use crate::header::QuarantineHeader;
use crate::LazarusError;
use serde::Serialize;
use shadow::BackupSnapshot;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredFile {
    pub original: String,
    pub path: PathBuf,
    pub bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreeRestore {
    pub files: usize,
    pub config_files: Vec<String>,
}

/// Writes the payload of `quarantined` back to its original location under
/// `project_root`, after checking its checksum.
///
/// # Errors
/// - `LazarusError::MalformedHeader` if the file is not a quarantine copy
/// - `LazarusError::ChecksumMismatch` if the payload was altered
/// - `LazarusError::OutsideRoot` if the recorded path escapes the project
pub fn restore_quarantined(
    quarantined: &Path,
    project_root: &Path,
) -> Result<RestoredFile, LazarusError> {
    let bytes = fs::read(quarantined)?;
    let (header, payload) = QuarantineHeader::parse(&bytes)?;
    if !header.verify(payload) {
        return Err(LazarusError::ChecksumMismatch(header.original));
    }

    let target = project_root.join(confined(&header.original)?);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&target, payload)?;
    info!(file = %header.original, from = %quarantined.display(), "restored from quarantine");

    Ok(RestoredFile {
        original: header.original,
        path: target,
        bytes: payload.len(),
    })
}

/// Every readable quarantine copy in `dir`, oldest first.
pub fn list_quarantined(dir: &Path) -> Result<Vec<(PathBuf, QuarantineHeader)>, LazarusError> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        match fs::read(&path).map_err(LazarusError::from).and_then(|b| {
            QuarantineHeader::parse(&b).map(|(h, _)| h)
        }) {
            Ok(header) => found.push((path, header)),
            Err(e) => debug!(file = %path.display(), error = %e, "not a quarantine copy"),
        }
    }
    found.sort_by(|a, b| {
        a.1.quarantined_at
            .cmp(&b.1.quarantined_at)
            .then_with(|| a.0.cmp(&b.0))
    });
    Ok(found)
}

/// Most recent quarantine copy of `original`.
pub fn find_quarantined(dir: &Path, original: &str) -> Result<Option<PathBuf>, LazarusError> {
    Ok(list_quarantined(dir)?
        .into_iter()
        .filter(|(_, h)| h.original == original)
        .map(|(p, _)| p)
        .last())
}

/// Copies a whole backup snapshot over `project_root`, driven by its
/// manifest: source directories and loose files go back to the same
/// relative path, `*.backup` config files to their original path.
pub fn restore_tree(backup_dir: &Path, project_root: &Path) -> Result<TreeRestore, LazarusError> {
    if !backup_dir.is_dir() {
        return Err(LazarusError::NotFound(backup_dir.display().to_string()));
    }
    let manifest = BackupSnapshot::load(backup_dir)?;
    let mut summary = TreeRestore::default();

    for dir in &manifest.source_dirs {
        let relative_dir = confined(dir)?;
        let src_dir = backup_dir.join(&relative_dir);
        for entry in WalkDir::new(&src_dir).min_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&src_dir)
                .map_err(|_| LazarusError::OutsideRoot(entry.path().display().to_string()))?;
            put_back(entry.path(), &project_root.join(&relative_dir).join(relative))?;
            summary.files += 1;
        }
    }

    for file in &manifest.files {
        let relative = confined(file)?;
        put_back(&backup_dir.join(&relative), &project_root.join(&relative))?;
        summary.files += 1;
    }

    for name in &manifest.config_files {
        let relative = confined(name)?;
        let stored = backup_dir.join(confined(&BackupSnapshot::config_backup_name(name))?);
        put_back(&stored, &project_root.join(relative))?;
        summary.files += 1;
        summary.config_files.push(name.clone());
    }

    summary.config_files.sort();
    info!(backup = %backup_dir.display(), files = summary.files, "backup restored");
    Ok(summary)
}

fn put_back(stored: &Path, target: &Path) -> Result<(), LazarusError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(stored, target)?;
    debug!(file = %target.display(), "restored");
    Ok(())
}

/// `relative` as a path that cannot leave the directory it is joined to.
fn confined(relative: &str) -> Result<PathBuf, LazarusError> {
    let path = Path::new(relative);
    let ok = path
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    if ok && !relative.is_empty() {
        Ok(path.to_path_buf())
    } else {
        Err(LazarusError::OutsideRoot(relative.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn quarantine(dir: &Path, name: &str, original: &str, content: &[u8], sec: u32) -> PathBuf {
        let at = Utc.with_ymd_and_hms(2026, 5, 2, 8, 30, sec).unwrap();
        let header = QuarantineHeader::new(original, at, content).unwrap();
        let path = dir.join(name);
        fs::write(&path, header.wrap(content)).unwrap();
        path
    }

    #[test]
    fn test_restore_reproduces_original_bytes() {
        let project = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let content = b"export function b() {}\r\n// trailing, no newline";
        let q = quarantine(store.path(), "1_src_b.ts", "src/b.ts", content, 0);
        fs::create_dir_all(project.path().join("src")).unwrap();
        fs::write(project.path().join("src/b.ts"), "// stub\nexport {};\n").unwrap();

        let restored = restore_quarantined(&q, project.path()).unwrap();
        assert_eq!(restored.original, "src/b.ts");
        assert_eq!(restored.bytes, content.len());
        assert_eq!(fs::read(project.path().join("src/b.ts")).unwrap(), content);
    }

    #[test]
    fn test_tampered_copy_is_refused() {
        let project = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let q = quarantine(store.path(), "q", "a.ts", b"original", 0);
        let mut bytes = fs::read(&q).unwrap();
        bytes.push(b'!');
        fs::write(&q, bytes).unwrap();

        assert!(matches!(
            restore_quarantined(&q, project.path()),
            Err(LazarusError::ChecksumMismatch(_))
        ));
        assert!(!project.path().join("a.ts").exists());
    }

    #[test]
    fn test_escaping_path_is_refused() {
        let project = tempfile::tempdir().unwrap();
        let store = tempfile::tempdir().unwrap();
        let q = quarantine(store.path(), "q", "../evil.ts", b"x", 0);
        assert!(matches!(
            restore_quarantined(&q, project.path()),
            Err(LazarusError::OutsideRoot(_))
        ));
    }

    #[test]
    fn test_find_latest_copy() {
        let store = tempfile::tempdir().unwrap();
        quarantine(store.path(), "z_old", "src/b.ts", b"v1", 0);
        let newer = quarantine(store.path(), "a_new", "src/b.ts", b"v2", 5);
        quarantine(store.path(), "other", "src/c.ts", b"c", 9);
        fs::write(store.path().join("README"), "not a copy").unwrap();

        assert_eq!(list_quarantined(store.path()).unwrap().len(), 3);
        assert_eq!(find_quarantined(store.path(), "src/b.ts").unwrap(), Some(newer));
        assert_eq!(find_quarantined(store.path(), "src/x.ts").unwrap(), None);
    }

    #[test]
    fn test_restore_tree() {
        use shadow::BackupManager;

        let project = tempfile::tempdir().unwrap();
        let root = project.path();
        fs::create_dir_all(root.join("src/util")).unwrap();
        fs::create_dir_all(root.join("config")).unwrap();
        fs::write(root.join("src/util/a.ts"), "a").unwrap();
        fs::write(root.join("main.ts"), "import './src/util/a';\n").unwrap();
        fs::write(root.join("package.json"), "{\"name\":\"x\"}").unwrap();
        fs::write(root.join("config/app.json"), "{\"port\":1}").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 5, 2, 9, 0, 0).unwrap();
        let snap = BackupManager::new(root, &root.join(".warden/backups"))
            .create(
                &["src".into()],
                &["main.ts".into()],
                &["package.json".into(), "config/app.json".into()],
                at,
            )
            .unwrap();

        fs::write(root.join("src/util/a.ts"), "stub").unwrap();
        fs::write(root.join("main.ts"), "").unwrap();
        fs::remove_file(root.join("config/app.json")).unwrap();

        let summary = restore_tree(&snap.path, root).unwrap();
        assert_eq!(summary.files, 4);
        assert_eq!(
            summary.config_files,
            vec!["config/app.json".to_string(), "package.json".to_string()]
        );
        assert_eq!(fs::read_to_string(root.join("src/util/a.ts")).unwrap(), "a");
        assert_eq!(fs::read_to_string(root.join("main.ts")).unwrap(), "import './src/util/a';\n");
        assert_eq!(fs::read_to_string(root.join("config/app.json")).unwrap(), "{\"port\":1}");
        assert!(!root.join("config_app.json").exists());

        assert!(matches!(
            restore_tree(&root.join("missing"), root),
            Err(LazarusError::NotFound(_))
        ));
    }
}

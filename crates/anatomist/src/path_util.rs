//! Path normalization for cache keys and import resolution.
//!
//! Cache keys are project-relative, UTF-8, forward-slash paths (`src/api/user.ts`).

use std::path::{Component, Path};

use crate::AnatomistError;

/// Converts `path` under `root` into a project-relative cache key.
///
/// # Errors
/// - `AnatomistError::OutsideRoot` if `path` is not below `root`
/// - `AnatomistError::NonUtf8Path` if the relative path is not valid UTF-8
pub fn relative_key(root: &Path, path: &Path) -> Result<String, AnatomistError> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| AnatomistError::OutsideRoot(path.display().to_string()))?;
    let s = rel
        .to_str()
        .ok_or_else(|| AnatomistError::NonUtf8Path(rel.display().to_string()))?;
    Ok(s.replace('\\', "/"))
}

/// Directory part of a cache key (`""` for top-level files).
pub fn parent_key(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[..idx],
        None => "",
    }
}

/// Lexically joins a relative specifier onto a directory key, folding `.`
/// and `..`.
///
/// Returns `None` when the specifier climbs above the project root.
///
/// # Examples
/// ```
/// use anatomist::path_util::join_relative;
///
/// assert_eq!(join_relative("src/api", "../lib/db").as_deref(), Some("src/lib/db"));
/// assert_eq!(join_relative("", "./b").as_deref(), Some("b"));
/// assert_eq!(join_relative("", "../outside"), None);
/// ```
pub fn join_relative(dir: &str, specifier: &str) -> Option<String> {
    let mut parts: Vec<&str> = dir.split('/').filter(|s| !s.is_empty()).collect();
    for component in Path::new(specifier).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::Normal(seg) => parts.push(seg.to_str()?),
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(parts.join("/"))
}

/// Strips the final extension of a cache key (`src/b.ts` → `src/b`).
pub fn strip_extension(key: &str) -> &str {
    let file_start = key.rfind('/').map_or(0, |i| i + 1);
    match key[file_start..].rfind('.') {
        Some(dot) if dot > 0 => &key[..file_start + dot],
        _ => key,
    }
}

/// Canonicalizes `path` (dropping the `\\?\` prefix on Windows).
pub fn canonical_root(path: &Path) -> Result<std::path::PathBuf, AnatomistError> {
    Ok(dunce::canonicalize(path)?)
}

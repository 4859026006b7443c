//! Moving flagged files into the quarantine store.

use crate::journal::Journal;
use crate::ReaperError;
use chrono::{DateTime, Utc};
use common::artifacts::file_timestamp;
use lazarus::QuarantineHeader;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantinedFile {
    /// Project-relative path of the flagged file.
    pub original: String,
    /// Where the header-prefixed copy lives.
    pub quarantine_path: PathBuf,
    pub checksum: String,
    pub bytes: usize,
}

/// `src/api/user.ts` → `src_api_user.ts`; anything outside `[A-Za-z0-9._-]`
/// becomes `_`.
pub fn sanitize(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Replacement content left at the original location.
pub fn stub(original: &str, quarantine_ref: &str) -> String {
    format!(
        "// Quarantined by warden: original content of {original} moved to {quarantine_ref}\n\
         // Restore with `warden restore --file {original}`\n\
         export {{}};\n"
    )
}

/// Copies `original` (relative to `root`) into `store` behind a provenance
/// header, then overwrites it with a stub. Both writes are journaled.
///
/// Symlinks are refused: the stub write would land on the link target.
pub fn quarantine_file(
    root: &Path,
    original: &str,
    store: &Path,
    at: DateTime<Utc>,
    journal: &mut Journal,
) -> Result<QuarantinedFile, ReaperError> {
    let source = root.join(original);
    if fs::symlink_metadata(&source)?.file_type().is_symlink() {
        return Err(ReaperError::Symlink(original.to_string()));
    }
    let content = fs::read(&source)?;
    let header = QuarantineHeader::new(original, at, &content)?;

    let name = format!("{}_{}", file_timestamp(at), sanitize(original));
    let dest = write_new_copy(store, &name, &header.wrap(&content))?;
    journal.created(&dest);

    let reference = dest
        .strip_prefix(root)
        .unwrap_or(&dest)
        .display()
        .to_string()
        .replace('\\', "/");
    journal.touch(&source)?;
    fs::write(&source, stub(original, &reference))?;

    Ok(QuarantinedFile {
        original: original.to_string(),
        quarantine_path: dest,
        checksum: header.checksum,
        bytes: content.len(),
    })
}

/// Creates `<store>/<name>`, or `<name>-N` if taken. Never overwrites.
fn write_new_copy(store: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf, ReaperError> {
    fs::create_dir_all(store)?;
    let mut attempt = 0u32;
    loop {
        let candidate = if attempt == 0 {
            store.join(name)
        } else {
            store.join(format!("{name}-{attempt}"))
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut file) => {
                file.write_all(bytes)?;
                return Ok(candidate);
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

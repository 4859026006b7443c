//! Dual-format (JSON + Markdown) report artifacts.
//!
//! Files are named `<prefix>-<timestamp>.{json,md}` and created with
//! `create_new`; an existing pair is never overwritten, a numeric suffix is
//! appended instead.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Filesystem-safe UTC timestamp used in artifact and directory names.
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%S%3fZ").to_string()
}

/// Paths of a written artifact pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactPaths {
    pub json: PathBuf,
    pub markdown: PathBuf,
}

/// Writes `value` as pretty JSON and `markdown` verbatim into `dir`.
pub fn write_dual<T: Serialize>(
    dir: &Path,
    prefix: &str,
    at: DateTime<Utc>,
    value: &T,
    markdown: &str,
) -> std::io::Result<ArtifactPaths> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_vec_pretty(value).map_err(std::io::Error::other)?;
    let stem = format!("{}-{}", prefix, file_timestamp(at));

    for attempt in 0u32.. {
        let name = if attempt == 0 {
            stem.clone()
        } else {
            format!("{stem}-{attempt}")
        };
        let json_path = dir.join(format!("{name}.json"));
        let md_path = dir.join(format!("{name}.md"));
        if json_path.exists() || md_path.exists() {
            continue;
        }
        write_new(&json_path, &json)?;
        write_new(&md_path, markdown.as_bytes())?;
        return Ok(ArtifactPaths {
            json: json_path,
            markdown: md_path,
        });
    }
    unreachable!("u32 attempt space exhausted")
}

fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();
        assert_eq!(file_timestamp(at), "20260304T050607000Z");
    }

    #[test]
    fn test_never_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let at = Utc::now();
        let first = write_dual(tmp.path(), "report", at, &vec![1, 2], "# one").unwrap();
        let second = write_dual(tmp.path(), "report", at, &vec![3], "# two").unwrap();

        assert_ne!(first.json, second.json);
        assert_eq!(std::fs::read_to_string(&first.markdown).unwrap(), "# one");
        assert_eq!(std::fs::read_to_string(&second.markdown).unwrap(), "# two");
        let parsed: Vec<u32> =
            serde_json::from_slice(&std::fs::read(&first.json).unwrap()).unwrap();
        assert_eq!(parsed, vec![1, 2]);
    }
}

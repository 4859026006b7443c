//! Provenance header prepended to every quarantined file.
//!
//! The header is exactly [`HEADER_LINES`] `//` comment lines; everything after
//! it is the original content, byte for byte.

use crate::LazarusError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

pub const HEADER_LINES: usize = 6;

const START: &str = "// ===== WARDEN QUARANTINE =====";
const END: &str = "// ===== END WARDEN QUARANTINE HEADER =====";
const DO_NOT_EXECUTE: &str =
    "// DO NOT EXECUTE: quarantined copy, restore with `warden restore --file`";
const ORIGINAL: &str = "// original: ";
const AT: &str = "// quarantined-at: ";
const CHECKSUM: &str = "// blake3: ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineHeader {
    /// Project-relative path the content came from.
    pub original: String,
    pub quarantined_at: DateTime<Utc>,
    /// Hex blake3 of the original content.
    pub checksum: String,
}

impl QuarantineHeader {
    /// # Errors
    /// `LazarusError::InvalidPath` if `original` contains a line break.
    pub fn new(original: &str, at: DateTime<Utc>, content: &[u8]) -> Result<Self, LazarusError> {
        if original.contains(['\n', '\r']) {
            return Err(LazarusError::InvalidPath(original.to_string()));
        }
        Ok(Self {
            original: original.to_string(),
            quarantined_at: at,
            checksum: checksum(content),
        })
    }

    pub fn render(&self) -> String {
        format!(
            "{START}\n{ORIGINAL}{}\n{AT}{}\n{CHECKSUM}{}\n{DO_NOT_EXECUTE}\n{END}\n",
            self.original,
            self.quarantined_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            self.checksum
        )
    }

    /// Header followed by `content`.
    pub fn wrap(&self, content: &[u8]) -> Vec<u8> {
        let header = self.render();
        let mut out = Vec::with_capacity(header.len() + content.len());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(content);
        out
    }

    /// Splits a quarantined file into its header and original payload.
    pub fn parse(bytes: &[u8]) -> Result<(Self, &[u8]), LazarusError> {
        let mut lines = Vec::with_capacity(HEADER_LINES);
        let mut rest = bytes;
        for _ in 0..HEADER_LINES {
            let end = rest
                .iter()
                .position(|b| *b == b'\n')
                .ok_or_else(|| LazarusError::MalformedHeader("header truncated".into()))?;
            let line = std::str::from_utf8(&rest[..end])
                .map_err(|_| LazarusError::MalformedHeader("header is not UTF-8".into()))?;
            lines.push(line);
            rest = &rest[end + 1..];
        }

        if lines[0] != START || lines[4] != DO_NOT_EXECUTE || lines[5] != END {
            return Err(LazarusError::MalformedHeader("missing warden markers".into()));
        }
        let field = |line: &str, prefix: &str| {
            line.strip_prefix(prefix)
                .map(str::to_string)
                .ok_or_else(|| LazarusError::MalformedHeader(format!("expected `{}`", prefix.trim())))
        };
        let original = field(lines[1], ORIGINAL)?;
        let quarantined_at = DateTime::parse_from_rfc3339(&field(lines[2], AT)?)
            .map_err(|e| LazarusError::MalformedHeader(format!("bad timestamp: {e}")))?
            .with_timezone(&Utc);
        let checksum = field(lines[3], CHECKSUM)?;

        Ok((
            Self {
                original,
                quarantined_at,
                checksum,
            },
            rest,
        ))
    }

    pub fn verify(&self, payload: &[u8]) -> bool {
        self.checksum == checksum(payload)
    }
}

pub fn checksum(content: &[u8]) -> String {
    blake3::hash(content).to_hex().to_string()
}

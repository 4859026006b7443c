//! # Lazarus: Recovery
//!
//! Everything needed to undo a quarantine run: the provenance header written
//! in front of quarantined content, restores from the quarantine store and
//! from backup snapshots, and the literal recovery steps printed in the
//! isolation report.

pub mod header;
pub mod instructions;
pub mod restore;

pub use header::{checksum, QuarantineHeader, HEADER_LINES};
pub use instructions::RecoveryInstruction;
pub use restore::{
    find_quarantined, list_quarantined, restore_quarantined, restore_tree, RestoredFile,
    TreeRestore,
};

#[derive(Debug, thiserror::Error)]
pub enum LazarusError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Not a quarantine copy: {0}")]
    MalformedHeader(String),

    #[error("Checksum mismatch for {0}; the quarantine copy was modified")]
    ChecksumMismatch(String),

    #[error("Path escapes project root: {0}")]
    OutsideRoot(String),

    #[error("Path cannot be recorded: {0:?}")]
    InvalidPath(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Backup(#[from] shadow::ShadowError),
}

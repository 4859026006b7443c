//! # The Anatomist: Collection, Symbols & Dependency Graph
//!
//! **Role**: Turns a project tree into the read-only [`Snapshot`] every
//! detector and verification check consumes.
//!
//! **Stages**:
//! - [`cache`]: one walk, one read per file, keyed by project-relative path.
//! - [`symbols`]: per-file imports, exports and local definitions.
//! - [`graph`]: file-level import graph with forward and reverse adjacency.
//!
//! **Design**:
//! - Lexical only. [`lexer::mask_non_code`] blanks strings and comments so the
//!   regex passes never see text that is not code.
//! - Everything built here is immutable once constructed and shared by
//!   reference (or `Arc`) for the rest of the run.

pub mod cache;
pub mod graph;
pub mod imports;
pub mod lexer;
pub mod path_util;
pub mod snapshot;
pub mod symbols;

pub use cache::{FileCache, SourceFile};
pub use graph::{DependencyGraph, DependencyNode, ImportEdge, UnresolvedImport};
pub use snapshot::Snapshot;
pub use symbols::{ExportEntry, ImportBinding, ImportKind, SymbolIndex, SymbolTable};

/// Errors produced by the Anatomist crate.
#[derive(Debug, thiserror::Error)]
pub enum AnatomistError {
    /// I/O error (root canonicalization).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// A walked path did not live under the project root.
    #[error("Path outside project root: {0}")]
    OutsideRoot(String),

    /// Cache keys must be UTF-8.
    #[error("Non UTF-8 path: {0}")]
    NonUtf8Path(String),
}

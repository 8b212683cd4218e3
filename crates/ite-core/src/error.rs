//! Error types for `ite-core`

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// The error type for decode/encode/save operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The buffer is too short to hold the fixed header and index regions.
    #[error("truncated file: need at least {needed} bytes, got {got}")]
    TruncatedFile { needed: usize, got: usize },

    /// The pre-edit backup could not be written; nothing was overwritten.
    #[error("backup failed for {path}: {source}")]
    BackupFailure {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No known dialect signature matched and none was supplied.
    #[error("unrecognized file signature; pick a format explicitly")]
    UnknownFormat,

    /// A cell id outside the model was addressed.
    #[error("no cell with id {0}")]
    UnknownCell(u32),

    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal structural findings collected during decode.
///
/// Legacy files are known to be internally inconsistent, so anything short
/// of truncation decodes best-effort and lands here instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    /// The 16-byte signature does not match the selected dialect.
    SignatureMismatch { expected: String, found: String },
    /// Entry 0 of a pair table is not the `(0, 0)` sentinel.
    MissingSentinel { count: u32, offset: u32 },
    /// An index pointer does not land on any cell boundary.
    UnresolvedReference { entry: usize, slot: usize, pointer: u32 },
    /// A pair entry claims more consecutive cells than the pool holds.
    ShortEntryRun { entry: usize, have: u32, want: u32 },
    /// Header count vs index-reachable cells vs extracted cells disagree.
    CellCountMismatch {
        declared: u32,
        referenced: u32,
        extracted: u32,
    },
    /// The pool's last run has no terminator; it was kept as a cell.
    UnterminatedPool { cell_id: u32, offset: u32 },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::SignatureMismatch { expected, found } => {
                write!(f, "signature mismatch: expected {expected:?}, found {found:?}")
            }
            DecodeWarning::MissingSentinel { count, offset } => {
                write!(f, "entry 0 is ({count}, {offset:#x}), expected the (0, 0) sentinel")
            }
            DecodeWarning::UnresolvedReference { entry, slot, pointer } => {
                write!(f, "entry {entry} slot {slot}: pointer {pointer:#x} resolves to no cell")
            }
            DecodeWarning::ShortEntryRun { entry, have, want } => {
                write!(f, "entry {entry}: wants {want} cells, only {have} available")
            }
            DecodeWarning::CellCountMismatch { declared, referenced, extracted } => {
                write!(
                    f,
                    "cell count mismatch: header declares {declared}, index reaches {referenced}, pool holds {extracted}"
                )
            }
            DecodeWarning::UnterminatedPool { cell_id, offset } => {
                write!(f, "pool ends without terminator at {offset:#x} (kept as cell {cell_id})")
            }
        }
    }
}

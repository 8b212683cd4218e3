//! In-memory model of one decoded text table, plus the per-edit session.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DecodeWarning, Error, Result};
use crate::format::FormatDescriptor;

#[derive(Debug, Clone)]
pub struct Header {
    pub signature: [u8; 16],
    /// Raw u32 fields after the signature; only `fields[1]` (declared cell
    /// count) is interpreted, the rest replay verbatim on encode.
    pub fields: Vec<u32>,
}

impl Header {
    pub fn declared_cells(&self) -> u32 {
        self.fields.get(1).copied().unwrap_or(0)
    }

    pub fn signature_text(&self) -> String {
        let end = self
            .signature
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.signature.len());
        String::from_utf8_lossy(&self.signature[..end]).into_owned()
    }
}

/// One pointer slot of a pointer-row entry: the raw stored value plus the
/// cell it resolved to (None for unset or unresolvable pointers).
#[derive(Debug, Clone, Copy)]
pub struct SlotRef {
    pub raw: u32,
    pub cell: Option<u32>,
}

#[derive(Debug, Clone)]
pub enum IndexEntry {
    /// Pointer-row layout: the full original row bytes plus the decoded
    /// slots. Bytes outside the slots are opaque.
    Row { raw: Vec<u8>, slots: [SlotRef; 3] },
    /// Count/offset-pair layout: `count` consecutive cells starting at the
    /// cell whose pool offset is `offset`.
    Pair {
        count: u32,
        offset: u32,
        first_cell: Option<u32>,
    },
}

/// Back-reference from a cell to the index entry (and slot) that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    pub entry: usize,
    pub slot: usize,
}

#[derive(Debug, Clone)]
pub struct Cell {
    /// Stable 1-based id in decode order.
    pub id: u32,
    /// Pool-relative byte offset at decode time.
    pub offset: u32,
    /// Original bytes, preserved exactly.
    pub bytes: Vec<u8>,
    /// Display form with non-printable bytes reversibly escaped.
    pub text: String,
    pub modified: bool,
    /// Pending replacement, in the same escaped display form.
    pub replacement: Option<String>,
    pub refs: Vec<EntryRef>,
}

#[derive(Debug, Clone)]
pub struct TextFile {
    pub format: FormatDescriptor,
    pub header: Header,
    pub entries: Vec<IndexEntry>,
    pub cells: Vec<Cell>,
    /// Trailing pool NULs beyond the cell terminators, replayed on encode.
    pub pool_pad: usize,
}

impl TextFile {
    pub fn cell(&self, id: u32) -> Option<&Cell> {
        if id == 0 {
            return None;
        }
        self.cells.get(id as usize - 1)
    }

    pub fn cell_mut(&mut self, id: u32) -> Option<&mut Cell> {
        if id == 0 {
            return None;
        }
        self.cells.get_mut(id as usize - 1)
    }

    /// Absolute file offset of a cell at decode time.
    pub fn file_offset(&self, cell: &Cell) -> u64 {
        self.format.pool_start() as u64 + u64::from(cell.offset)
    }

    /// Queue a replacement (escaped display text) for one cell. The binary
    /// is untouched until the model is encoded.
    pub fn apply_translation(&mut self, id: u32, text: &str) -> Result<()> {
        let cell = self.cell_mut(id).ok_or(Error::UnknownCell(id))?;
        cell.replacement = Some(text.to_string());
        cell.modified = true;
        Ok(())
    }

    pub fn modified_count(&self) -> usize {
        self.cells.iter().filter(|c| c.modified).count()
    }
}

/// One edit session: the model, the path it came from, and the pre-edit
/// bytes (the backup source). Created per file, discarded after saving;
/// nothing is shared across sessions.
#[derive(Debug)]
pub struct Session {
    pub path: PathBuf,
    pub original: Vec<u8>,
    pub file: TextFile,
    pub warnings: Vec<DecodeWarning>,
}

impl Session {
    /// Open a file, picking the dialect by signature.
    pub fn open(path: &Path) -> Result<Session> {
        let data = fs::read(path)?;
        let format = crate::format::detect(&data).ok_or(Error::UnknownFormat)?;
        Self::from_bytes(path, data, format)
    }

    /// Open a file as a specific dialect, ignoring the signature.
    pub fn open_as(path: &Path, format: &FormatDescriptor) -> Result<Session> {
        let data = fs::read(path)?;
        Self::from_bytes(path, data, format)
    }

    fn from_bytes(path: &Path, data: Vec<u8>, format: &FormatDescriptor) -> Result<Session> {
        let (file, warnings) = crate::decode::decode(&data, format)?;
        Ok(Session {
            path: path.to_path_buf(),
            original: data,
            file,
            warnings,
        })
    }
}

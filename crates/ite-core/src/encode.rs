//! Encode: a `TextFile` model back into bytes, and the backed-up save.
//!
//! The pool is rebuilt from scratch in cell-id order, so every pointer that
//! depends on a cell's position or length is recomputed from the id → new
//! offset map, never from the stale decode-time offsets. Unknown header
//! fields and the opaque parts of pointer rows replay verbatim.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::cursor::{put_cstr, put_u32};
use crate::error::{Error, Result};
use crate::escape;
use crate::format::{PairOrder, TableLayout};
use crate::model::{IndexEntry, Session, TextFile};

#[derive(Debug, Clone, Default)]
pub struct EncodeReport {
    pub cells_written: usize,
    /// Cells whose replacement had characters with no code-page form and
    /// was written with lossy `?` substitutes.
    pub lossy_cells: Vec<u32>,
}

pub fn encode(file: &TextFile) -> (Vec<u8>, EncodeReport) {
    let mut report = EncodeReport::default();

    // 1. Fresh pool, cells in id order; remember each cell's new offset.
    let mut pool = Vec::new();
    let mut new_offsets: HashMap<u32, u32> = HashMap::with_capacity(file.cells.len());
    for cell in &file.cells {
        new_offsets.insert(cell.id, pool.len() as u32);
        match (&cell.replacement, cell.modified) {
            (Some(text), true) => {
                let (bytes, lossy) = escape::unescape(text);
                if lossy {
                    warn!(cell = cell.id, "replacement not fully representable, wrote ? substitutes");
                    report.lossy_cells.push(cell.id);
                }
                put_cstr(&mut pool, &bytes);
            }
            _ => put_cstr(&mut pool, &cell.bytes),
        }
    }
    pool.extend(std::iter::repeat_n(0u8, file.pool_pad));
    report.cells_written = file.cells.len();

    // 2. Index table with re-derived pointers.
    let mut table = Vec::with_capacity(file.format.table_len());
    for entry in &file.entries {
        match entry {
            IndexEntry::Row { raw, slots } => {
                let TableLayout::PointerRows {
                    slot_offsets, bias, ..
                } = file.format.layout
                else {
                    continue;
                };
                let mut row = raw.clone();
                for (slot, &off) in slots.iter().zip(slot_offsets.iter()) {
                    let Some(cell_id) = slot.cell else {
                        // unset or unresolved at decode time: replay raw value
                        continue;
                    };
                    if let Some(&new_off) = new_offsets.get(&cell_id) {
                        row[off..off + 4].copy_from_slice(&(bias + new_off).to_le_bytes());
                    }
                }
                table.extend_from_slice(&row);
            }
            IndexEntry::Pair {
                count,
                offset,
                first_cell,
            } => {
                let TableLayout::CountOffsetPairs { order, .. } = file.format.layout else {
                    continue;
                };
                let new_off = first_cell
                    .and_then(|id| new_offsets.get(&id).copied())
                    .unwrap_or(*offset);
                match order {
                    PairOrder::CountFirst => {
                        put_u32(&mut table, *count);
                        put_u32(&mut table, new_off);
                    }
                    PairOrder::OffsetFirst => {
                        put_u32(&mut table, new_off);
                        put_u32(&mut table, *count);
                    }
                }
            }
        }
    }
    // the index region is a fixed size; pad if entries came up short
    if table.len() < file.format.table_len() {
        table.resize(file.format.table_len(), 0);
    }

    // 3. Header: declared cell count tracks what was actually written,
    //    everything else replays verbatim.
    let mut out = Vec::with_capacity(file.format.pool_start() + pool.len());
    out.extend_from_slice(&file.header.signature);
    let mut fields = file.header.fields.clone();
    if fields.len() > 1 {
        fields[1] = report.cells_written as u32;
    }
    for v in &fields {
        put_u32(&mut out, *v);
    }
    out.extend_from_slice(&table);
    out.extend_from_slice(&pool);

    debug!(
        cells = report.cells_written,
        modified = file.modified_count(),
        bytes = out.len(),
        "encoded text table"
    );
    (out, report)
}

#[derive(Debug)]
pub struct SaveReport {
    pub backup: PathBuf,
    pub bytes_written: usize,
    pub encode: EncodeReport,
}

impl Session {
    /// Encode the model and overwrite the source file, writing the pre-edit
    /// bytes to a timestamped backup first. A failed backup aborts with the
    /// target untouched. Backups are never overwritten.
    pub fn save(&mut self) -> Result<SaveReport> {
        let (data, encode) = encode(&self.file);
        let backup = write_backup(&self.path, &self.original)?;
        fs::write(&self.path, &data)?;
        let report = SaveReport {
            backup,
            bytes_written: data.len(),
            encode,
        };
        // the written bytes are the next save's backup baseline
        self.original = data;
        Ok(report)
    }
}

fn write_backup(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    use std::io::Write as _;
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let base = path.with_file_name(format!(
        "{}.backup_{stamp}",
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string())
    ));
    let mut candidate = base.clone();
    let mut n = 2u32;
    while candidate.exists() {
        candidate = base.with_file_name(format!(
            "{}_{n}",
            base.file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        ));
        n += 1;
    }
    let write = |p: &Path| -> std::io::Result<()> {
        let mut f = fs::OpenOptions::new().write(true).create_new(true).open(p)?;
        f.write_all(bytes)?;
        f.sync_all()
    };
    match write(&candidate) {
        Ok(()) => Ok(candidate),
        Err(source) => Err(Error::BackupFailure {
            path: candidate,
            source,
        }),
    }
}

//! Decode: raw bytes into a `TextFile` model.
//!
//! Only truncation is fatal. Legacy files in this family are known to carry
//! inconsistent headers and stray pointers, so every other anomaly is
//! collected as a `DecodeWarning` and the decode returns best-effort data a
//! translator can still work with.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::cursor::Cursor;
use crate::error::{DecodeWarning, Error, Result};
use crate::escape;
use crate::format::{FormatDescriptor, PairOrder, TableLayout};
use crate::model::{Cell, EntryRef, Header, IndexEntry, SlotRef, TextFile};

pub fn decode(
    data: &[u8],
    format: &FormatDescriptor,
) -> Result<(TextFile, Vec<DecodeWarning>)> {
    let mut warnings = Vec::new();

    if data.len() < format.min_len() {
        return Err(Error::TruncatedFile {
            needed: format.min_len(),
            got: data.len(),
        });
    }

    let mut cur = Cursor::new(data);
    let mut signature = [0u8; 16];
    signature.copy_from_slice(cur.read_slice(16)?);
    if signature != format.signature_bytes() {
        note(
            &mut warnings,
            DecodeWarning::SignatureMismatch {
                expected: format.signature.to_string(),
                found: String::from_utf8_lossy(
                    &signature[..signature.iter().position(|&b| b == 0).unwrap_or(16)],
                )
                .into_owned(),
            },
        );
    }

    let mut fields = Vec::with_capacity(format.header_fields);
    for _ in 0..format.header_fields {
        fields.push(cur.read_u32()?);
    }
    let header = Header { signature, fields };

    let entries = read_entries(data, format, &mut warnings)?;
    let (mut cells, pool_pad) = read_pool(data, format, &mut warnings);
    let entries = resolve(entries, format, &mut cells, &mut warnings);

    let referenced = cells.iter().filter(|c| !c.refs.is_empty()).count() as u32;
    let extracted = cells.len() as u32;
    if header.declared_cells() != referenced || referenced != extracted {
        note(
            &mut warnings,
            DecodeWarning::CellCountMismatch {
                declared: header.declared_cells(),
                referenced,
                extracted,
            },
        );
    }
    debug!(
        format = format.name,
        entries = entries.len(),
        cells = cells.len(),
        warnings = warnings.len(),
        "decoded text table"
    );

    Ok((
        TextFile {
            format: *format,
            header,
            entries,
            cells,
            pool_pad,
        },
        warnings,
    ))
}

fn read_entries(
    data: &[u8],
    format: &FormatDescriptor,
    warnings: &mut Vec<DecodeWarning>,
) -> Result<Vec<IndexEntry>> {
    let mut cur = Cursor::at(data, format.table_start());
    let mut entries = Vec::with_capacity(format.entry_count());
    match format.layout {
        TableLayout::PointerRows {
            row_size,
            row_count,
            slot_offsets,
            ..
        } => {
            for _ in 0..row_count {
                let raw = cur.read_slice(row_size)?.to_vec();
                let mut slots = [SlotRef { raw: 0, cell: None }; 3];
                for (slot, &off) in slots.iter_mut().zip(slot_offsets.iter()) {
                    let mut field = Cursor::at(&raw, off);
                    slot.raw = field.read_u32()?;
                }
                entries.push(IndexEntry::Row { raw, slots });
            }
        }
        TableLayout::CountOffsetPairs { entry_count, order } => {
            for i in 0..entry_count {
                let a = cur.read_u32()?;
                let b = cur.read_u32()?;
                let (count, offset) = match order {
                    PairOrder::CountFirst => (a, b),
                    PairOrder::OffsetFirst => (b, a),
                };
                if i == 0 && (count != 0 || offset != 0) {
                    note(warnings, DecodeWarning::MissingSentinel { count, offset });
                }
                entries.push(IndexEntry::Pair {
                    count,
                    offset,
                    first_cell: None,
                });
            }
        }
    }
    Ok(entries)
}

/// Scan the pool from its fixed start, splitting on NUL. Empty runs between
/// terminators are real (empty) cells; only zero-length runs at end-of-pool
/// are dropped, and their terminators are remembered as trailing padding.
fn read_pool(
    data: &[u8],
    format: &FormatDescriptor,
    warnings: &mut Vec<DecodeWarning>,
) -> (Vec<Cell>, usize) {
    let pool_start = format.pool_start();
    let mut cur = Cursor::at(data, pool_start);
    let mut cells = Vec::new();
    let mut pool_pad = 0usize;
    loop {
        let offset = (cur.pos() - pool_start) as u32;
        match cur.read_until_nul() {
            Some(bytes) => {
                if bytes.is_empty() && cur.remaining() == 0 {
                    // terminator(s) with nothing behind them
                    pool_pad += 1;
                    break;
                }
                cells.push(new_cell(cells.len() as u32 + 1, offset, bytes));
            }
            None => {
                let tail = cur.tail();
                if !tail.is_empty() {
                    let cell = new_cell(cells.len() as u32 + 1, offset, tail);
                    note(
                        warnings,
                        DecodeWarning::UnterminatedPool {
                            cell_id: cell.id,
                            offset,
                        },
                    );
                    cells.push(cell);
                }
                break;
            }
        }
        if cur.remaining() == 0 {
            break;
        }
    }
    (cells, pool_pad)
}

fn new_cell(id: u32, offset: u32, bytes: &[u8]) -> Cell {
    Cell {
        id,
        offset,
        bytes: bytes.to_vec(),
        text: escape::escape(bytes),
        modified: false,
        replacement: None,
        refs: Vec::new(),
    }
}

/// Resolve every index reference to a cell by pool offset, recording
/// back-references on the cells.
fn resolve(
    mut entries: Vec<IndexEntry>,
    format: &FormatDescriptor,
    cells: &mut [Cell],
    warnings: &mut Vec<DecodeWarning>,
) -> Vec<IndexEntry> {
    let by_offset: HashMap<u32, usize> =
        cells.iter().enumerate().map(|(i, c)| (c.offset, i)).collect();

    for (entry_idx, entry) in entries.iter_mut().enumerate() {
        match entry {
            IndexEntry::Row { slots, .. } => {
                let TableLayout::PointerRows { bias, .. } = format.layout else {
                    continue;
                };
                for (slot_idx, slot) in slots.iter_mut().enumerate() {
                    if slot.raw == 0 {
                        continue;
                    }
                    let resolved = slot
                        .raw
                        .checked_sub(bias)
                        .and_then(|off| by_offset.get(&off).copied());
                    match resolved {
                        Some(cell_idx) => {
                            slot.cell = Some(cells[cell_idx].id);
                            cells[cell_idx].refs.push(EntryRef {
                                entry: entry_idx,
                                slot: slot_idx,
                            });
                        }
                        None => note(
                            warnings,
                            DecodeWarning::UnresolvedReference {
                                entry: entry_idx,
                                slot: slot_idx,
                                pointer: slot.raw,
                            },
                        ),
                    }
                }
            }
            IndexEntry::Pair {
                count,
                offset,
                first_cell,
            } => {
                if *count == 0 {
                    continue;
                }
                let Some(&start) = by_offset.get(offset) else {
                    note(
                        warnings,
                        DecodeWarning::UnresolvedReference {
                            entry: entry_idx,
                            slot: 0,
                            pointer: *offset,
                        },
                    );
                    continue;
                };
                *first_cell = Some(cells[start].id);
                let have = (cells.len() - start).min(*count as usize);
                for (k, cell) in cells[start..start + have].iter_mut().enumerate() {
                    cell.refs.push(EntryRef {
                        entry: entry_idx,
                        slot: k,
                    });
                }
                if (have as u32) < *count {
                    note(
                        warnings,
                        DecodeWarning::ShortEntryRun {
                            entry: entry_idx,
                            have: have as u32,
                            want: *count,
                        },
                    );
                }
            }
        }
    }
    entries
}

fn note(warnings: &mut Vec<DecodeWarning>, w: DecodeWarning) {
    warn!("{w}");
    warnings.push(w);
}

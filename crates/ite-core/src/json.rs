//! Machine-readable JSON dump of a decoded model, for CLI inspection.

use serde_json::{Value, json};

use crate::error::DecodeWarning;
use crate::model::{IndexEntry, TextFile};

pub fn model_to_json(file: &TextFile, warnings: &[DecodeWarning]) -> Value {
    let entries: Vec<Value> = file
        .entries
        .iter()
        .enumerate()
        .map(|(i, e)| match e {
            IndexEntry::Row { slots, .. } => json!({
                "entry": i,
                "slots": slots
                    .iter()
                    .map(|s| json!({"raw": s.raw, "cell": s.cell}))
                    .collect::<Vec<_>>(),
            }),
            IndexEntry::Pair {
                count,
                offset,
                first_cell,
            } => json!({
                "entry": i,
                "count": count,
                "offset": offset,
                "firstCell": first_cell,
            }),
        })
        .collect();

    let cells: Vec<Value> = file
        .cells
        .iter()
        .map(|c| {
            json!({
                "id": c.id,
                "offset": format!("0x{:08X}", file.file_offset(c)),
                "bytes": c.bytes.len(),
                "text": c.text,
                "modified": c.modified,
                "replacement": c.replacement,
                "refs": c.refs
                    .iter()
                    .map(|r| json!({"entry": r.entry, "slot": r.slot}))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    json!({
        "format": file.format.name,
        "signature": file.header.signature_text(),
        "header": file.header.fields,
        "declaredCells": file.header.declared_cells(),
        "entries": entries,
        "cells": cells,
        "warnings": warnings.iter().map(|w| w.to_string()).collect::<Vec<_>>(),
    })
}

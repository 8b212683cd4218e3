//! The plain-text translation ledger: additive export, block parsing, and
//! the textual translation-line patch.
//!
//! Block format (UTF-8, blocks separated by a blank line, `#` comments):
//!
//! ```text
//! OFFSET: 0x0013A8B2
//! CELULA: 42  GRUPO: 7
//! ORIGINAL [11 chars]: Hello @L all
//! TRADUÇÃO:
//! Olá @L todos
//! ```
//!
//! Export never rewrites existing blocks: it only appends cells whose id
//! is not present yet, so in-progress edits survive re-extraction.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::Result;
use crate::model::{Cell, IndexEntry, TextFile};

static OFFSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^OFFSET:\s*0x([0-9A-Fa-f]+)").expect("static regex"));
static CELL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CELULA:\s*(\d+)").expect("static regex"));
static ORIG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ORIGINAL\s*\[(\d+)\s*chars\]:\s?(.*)$").expect("static regex"));

pub const TRANSLATION_TAG: &str = "TRADUÇÃO:";

#[derive(Debug, Clone, Default)]
pub struct LedgerBlock {
    pub cell_id: Option<u32>,
    pub offset: Option<u64>,
    pub declared_chars: Option<usize>,
    pub original: String,
    pub translation: String,
    /// The block's text as it appeared, for batch hand-off.
    pub raw: String,
}

impl LedgerBlock {
    pub fn has_translation(&self) -> bool {
        !self.translation.trim().is_empty()
    }
}

/// Parse ledger text into blocks. Lines outside any `OFFSET:` block
/// (comments, banners) are ignored.
pub fn parse_blocks(text: &str) -> Vec<LedgerBlock> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut current: Option<(LedgerBlock, usize)> = None;

    for (i, line) in lines.iter().enumerate() {
        if let Some(caps) = OFFSET_RE.captures(line) {
            if let Some((block, start)) = current.take() {
                blocks.push(finish_block(block, &lines[start..i]));
            }
            let block = LedgerBlock {
                offset: u64::from_str_radix(&caps[1], 16).ok(),
                ..LedgerBlock::default()
            };
            current = Some((block, i));
            continue;
        }
        let Some((block, _)) = current.as_mut() else {
            continue;
        };
        if let Some(caps) = CELL_RE.captures(line) {
            if block.cell_id.is_none() {
                block.cell_id = caps[1].parse().ok();
            }
        } else if let Some(caps) = ORIG_RE.captures(line) {
            block.declared_chars = caps[1].parse().ok();
            block.original = caps[2].to_string();
        } else if line.trim() == TRANSLATION_TAG {
            if let Some(next) = lines.get(i + 1)
                && !OFFSET_RE.is_match(next)
            {
                block.translation = (*next).to_string();
            }
        }
    }
    if let Some((block, start)) = current.take() {
        blocks.push(finish_block(block, &lines[start..]));
    }
    blocks
}

fn finish_block(mut block: LedgerBlock, lines: &[&str]) -> LedgerBlock {
    let mut end = lines.len();
    while end > 0 && lines[end - 1].trim().is_empty() {
        end -= 1;
    }
    block.raw = lines[..end].join("\n");
    block
}

/// Cell ids already present anywhere in the ledger text.
pub fn existing_ids(text: &str) -> HashSet<u32> {
    CELL_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse().ok())
        .collect()
}

/// Render one cell as a ledger block (with trailing blank separator).
pub fn format_block(file: &TextFile, cell: &Cell) -> String {
    let mut tag = String::new();
    let mut row_refs = Vec::new();
    for r in &cell.refs {
        match file.entries.get(r.entry) {
            Some(IndexEntry::Row { .. }) => row_refs.push(format!("L{}[S{}]", r.entry, r.slot + 1)),
            Some(IndexEntry::Pair { .. }) if tag.is_empty() => {
                tag = format!("  GRUPO: {}", r.entry);
            }
            _ => {}
        }
    }
    if !row_refs.is_empty() {
        tag = format!("  REFERÊNCIAS: {}", row_refs.join(", "));
    }
    format!(
        "OFFSET: 0x{:08X}\nCELULA: {}{}\nORIGINAL [{} chars]: {}\n{TRANSLATION_TAG}\n\n",
        file.file_offset(cell),
        cell.id,
        tag,
        cell.text.chars().count(),
        cell.text,
    )
}

/// Banner written at the top of a fresh ledger file.
pub fn ledger_banner(file: &TextFile) -> String {
    format!(
        "# Ledger de tradução: {}\n\
         # Criado em: {}\n\
         # Formato de bloco:\n\
         # OFFSET: 0x<hex>\n\
         # CELULA: <id>  GRUPO: <entrada>\n\
         # ORIGINAL [<n> chars]: <texto original>\n\
         # {TRANSLATION_TAG}\n\
         # <texto traduzido>\n\n",
        file.format.name,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    )
}

/// Blocks (ids not yet in `existing`) to append, strictly additive.
pub fn export_missing(file: &TextFile, existing: &str) -> (String, usize) {
    let present = existing_ids(existing);
    let mut out = String::new();
    let mut count = 0;
    for cell in &file.cells {
        if present.contains(&cell.id) {
            continue;
        }
        out.push_str(&format_block(file, cell));
        count += 1;
    }
    (out, count)
}

/// Additive export straight to a ledger file: creates it (with banner) when
/// missing, appends missing blocks otherwise, never touches existing ones.
pub fn export_to_path(file: &TextFile, path: &Path) -> Result<usize> {
    let existing = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };
    let (appended, count) = export_missing(file, &existing);
    if count == 0 {
        return Ok(0);
    }
    let mut content = if existing.is_empty() {
        ledger_banner(file)
    } else {
        existing
    };
    if !content.ends_with("\n\n") {
        if !content.ends_with('\n') {
            content.push('\n');
        }
        content.push('\n');
    }
    content.push_str(&appended);
    fs::write(path, content)?;
    debug!(count, path = %path.display(), "appended ledger blocks");
    Ok(count)
}

/// Untranslated blocks in id order, capped at `limit` (0 = no cap); the
/// batch a translator takes away.
pub fn untranslated_blocks(text: &str, limit: usize) -> Vec<LedgerBlock> {
    let mut out: Vec<LedgerBlock> = parse_blocks(text)
        .into_iter()
        .filter(|b| b.cell_id.is_some() && !b.has_translation())
        .collect();
    out.sort_by_key(|b| b.cell_id);
    if limit > 0 {
        out.truncate(limit);
    }
    out
}

/// Replace (or insert) the translation line of one cell's block, leaving
/// every other byte of the ledger alone. `None` when the id has no block.
pub fn patch_translation(text: &str, cell_id: u32, translation: &str) -> Option<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut in_target = false;
    let mut original_line: Option<usize> = None;
    let mut tag_line: Option<usize> = None;
    let mut block_end = lines.len();

    'scan: for (i, line) in lines.iter().enumerate() {
        if OFFSET_RE.is_match(line) {
            if in_target {
                block_end = i;
                break 'scan;
            }
            original_line = None;
            tag_line = None;
        } else if in_target {
            if ORIG_RE.is_match(line) {
                original_line = Some(i);
            } else if line.trim() == TRANSLATION_TAG {
                tag_line = Some(i);
            }
        } else if let Some(caps) = CELL_RE.captures(line)
            && caps[1].parse() == Ok(cell_id)
        {
            in_target = true;
        }
    }
    if !in_target {
        return None;
    }

    let mut out: Vec<String> = lines.iter().map(|s| (*s).to_string()).collect();
    match tag_line {
        Some(t) => {
            let next = t + 1;
            let replace = next < block_end
                && !out[next].trim().is_empty()
                && !out[next].trim_start().starts_with('#');
            if replace {
                out[next] = translation.to_string();
            } else {
                out.insert(next, translation.to_string());
            }
        }
        None => {
            // block without a translation tag; add one after the original
            let at = original_line.map(|i| i + 1).unwrap_or(block_end);
            out.insert(at, format!("{TRANSLATION_TAG}\n{translation}"));
        }
    }
    Some(out.join("\n"))
}

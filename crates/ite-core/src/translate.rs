//! External translation-service seam and the ledger auto-fill walker.
//!
//! The service itself is out of scope; anything that can turn text into
//! text implements `Translator`. Implementations are expected to return
//! the input unchanged on failure or rate limiting rather than erroring
//! the whole batch.

use tracing::debug;

use crate::ledger;

pub trait Translator {
    /// Translate `text` between the given language codes, or fail with a
    /// human-readable reason. Transient failures should return `Ok` with
    /// the input unchanged.
    fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, String>;
}

#[derive(Debug, Clone)]
pub struct FillOpts {
    /// Re-translate blocks that already carry a translation.
    pub overwrite: bool,
    /// Originals shorter than this many chars are left alone (tags,
    /// numbers, single glyphs).
    pub min_chars: usize,
    /// Stop after this many filled blocks; 0 means no cap.
    pub limit: usize,
    pub source_lang: String,
    pub target_lang: String,
}

impl Default for FillOpts {
    fn default() -> Self {
        Self {
            overwrite: false,
            min_chars: 4,
            limit: 0,
            source_lang: "EN".to_string(),
            target_lang: "PT-BR".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    pub total: usize,
    pub filled: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Walk a ledger and fill translation lines through `tr`, returning the
/// updated ledger text. Untouched blocks keep their exact bytes.
pub fn fill_ledger(text: &str, tr: &dyn Translator, opts: &FillOpts) -> (String, FillStats) {
    let mut stats = FillStats::default();
    let mut out = text.to_string();
    for block in ledger::parse_blocks(text) {
        stats.total += 1;
        let Some(cell_id) = block.cell_id else {
            stats.skipped += 1;
            continue;
        };
        if (block.has_translation() && !opts.overwrite)
            || block.original.trim().chars().count() < opts.min_chars
        {
            stats.skipped += 1;
            continue;
        }
        if opts.limit > 0 && stats.filled >= opts.limit {
            stats.skipped += 1;
            continue;
        }
        match tr.translate(&block.original, &opts.source_lang, &opts.target_lang) {
            Ok(translated) if translated != block.original => {
                if let Some(patched) = ledger::patch_translation(&out, cell_id, &translated) {
                    out = patched;
                    stats.filled += 1;
                } else {
                    stats.failed += 1;
                }
            }
            Ok(_) => stats.skipped += 1,
            Err(reason) => {
                debug!(cell = cell_id, %reason, "translation failed, block left as is");
                stats.failed += 1;
            }
        }
    }
    (out, stats)
}

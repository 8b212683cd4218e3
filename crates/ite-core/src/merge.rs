//! Reconciliation: validated merge of externally edited ledger blocks.
//!
//! A pasted block only reaches the binary when its recorded original text
//! still matches both the authoritative ledger and the live cell content.
//! This is the safety gate of the whole pipeline: ids and offsets in a
//! pasted batch can silently go stale whenever the binary was regenerated
//! by another tool in the meantime, and a stale block must be rejected, not
//! written.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::error::Result;
use crate::ledger::{self, LedgerBlock};
use crate::model::TextFile;

#[derive(Debug, Clone)]
pub struct Rejection {
    pub cell_id: u32,
    pub offset: Option<u64>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// `(cell_id, translation)` updates queued for the model, in paste
    /// order. Nothing is applied until `apply` is called explicitly.
    pub accepted: Vec<(u32, String)>,
    pub rejected: Vec<Rejection>,
    /// Blocks without an id or without any translation text.
    pub skipped: usize,
    /// The authoritative ledger with accepted translation lines patched in.
    pub ledger: String,
}

impl MergeOutcome {
    /// Apply the queued updates to the model. Call only after the user
    /// confirmed the report; rejected cells are never touched.
    pub fn apply(&self, file: &mut TextFile) -> Result<usize> {
        for (id, text) in &self.accepted {
            file.apply_translation(*id, text)?;
        }
        Ok(self.accepted.len())
    }
}

/// Validate a pasted batch against the authoritative ledger and the live
/// model, producing the accept/reject/skip report and the patched ledger.
pub fn reconcile(file: &TextFile, ledger_text: &str, pasted: &str) -> MergeOutcome {
    let authoritative: HashMap<u32, LedgerBlock> = ledger::parse_blocks(ledger_text)
        .into_iter()
        .filter_map(|b| b.cell_id.map(|id| (id, b)))
        .collect();

    let mut outcome = MergeOutcome {
        ledger: ledger_text.to_string(),
        ..MergeOutcome::default()
    };

    for block in ledger::parse_blocks(pasted) {
        let Some(cell_id) = block.cell_id else {
            outcome.skipped += 1;
            continue;
        };
        let translation = block.translation.trim();
        if translation.is_empty() {
            outcome.skipped += 1;
            continue;
        }

        let Some(recorded) = authoritative.get(&cell_id) else {
            reject(&mut outcome, &block, cell_id, "no block with this id in the ledger");
            continue;
        };
        if block.original != recorded.original {
            if block.original.trim() == recorded.original.trim() {
                // surrounding whitespace only: auto-correct and accept
                debug!(cell = cell_id, "whitespace-only drift in pasted original, corrected");
            } else {
                reject(
                    &mut outcome,
                    &block,
                    cell_id,
                    &format!(
                        "original text does not match the ledger (ledger {:?}, pasted {:?})",
                        recorded.original, block.original
                    ),
                );
                continue;
            }
        }

        // the ledger itself may be stale against a regenerated binary
        let Some(cell) = file.cell(cell_id) else {
            reject(&mut outcome, &block, cell_id, "no such cell in the loaded file");
            continue;
        };
        if cell.text.trim() != recorded.original.trim() {
            reject(
                &mut outcome,
                &block,
                cell_id,
                &format!(
                    "cell content has drifted from the ledger (file {:?}, ledger {:?})",
                    cell.text, recorded.original
                ),
            );
            continue;
        }

        if let Some(patched) = ledger::patch_translation(&outcome.ledger, cell_id, translation) {
            outcome.ledger = patched;
        }
        outcome.accepted.push((cell_id, translation.to_string()));
    }

    debug!(
        accepted = outcome.accepted.len(),
        rejected = outcome.rejected.len(),
        skipped = outcome.skipped,
        "reconciled pasted batch"
    );
    outcome
}

fn reject(outcome: &mut MergeOutcome, block: &LedgerBlock, cell_id: u32, reason: &str) {
    warn!(cell = cell_id, reason, "rejected pasted block");
    outcome.rejected.push(Rejection {
        cell_id,
        offset: block.offset,
        reason: reason.to_string(),
    });
}

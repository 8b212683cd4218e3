//! ite-core: codec, ledger and reconciliation logic for Impressions text
//! tables
//!
//! This crate focuses on a small, well-factored surface:
//! - Dialect descriptors for the two index-table layouts, resolved once at
//!   load
//! - Decode/encode of the signature/header/index/pool structure with full
//!   pointer recomputation
//! - Additive plain-text ledger export and the validated merge that brings
//!   translations back
//! - A JSON dump of any decoded table for CLI use
//!
pub mod cursor;
pub mod decode;
pub mod encode;
pub mod error;
pub mod escape;
pub mod format;
pub mod json;
pub mod ledger;
pub mod merge;
pub mod model;
pub mod translate;

pub use decode::decode;
pub use encode::{EncodeReport, SaveReport, encode};
pub use error::{DecodeWarning, Error, Result};
pub use escape::{escape, unescape};
pub use format::{EMPEROR, FormatDescriptor, POSEIDON, PairOrder, TableLayout, ZEUS};
pub use ledger::{LedgerBlock, export_missing, export_to_path, parse_blocks, patch_translation};
pub use merge::{MergeOutcome, Rejection, reconcile};
pub use model::{Cell, EntryRef, Header, IndexEntry, Session, SlotRef, TextFile};
pub use translate::{FillOpts, FillStats, Translator, fill_ledger};

use ite_core::format::{FormatDescriptor, PairOrder, TableLayout};
use ite_core::model::Session;

const TEST_ROWS: FormatDescriptor = FormatDescriptor {
    name: "test-rows",
    signature: "Test Rows file.",
    header_fields: 6,
    layout: TableLayout::PointerRows {
        row_size: 0x50,
        row_count: 3,
        slot_offsets: [0x34, 0x38, 0x3C],
        bias: 0x10,
    },
};

const TEST_PAIRS: FormatDescriptor = FormatDescriptor {
    name: "test-pairs",
    signature: "Test Pairs file.",
    header_fields: 4,
    layout: TableLayout::CountOffsetPairs {
        entry_count: 4,
        order: PairOrder::CountFirst,
    },
};

fn pool_of(cells: &[&[u8]]) -> (Vec<u8>, Vec<u32>) {
    let mut pool = Vec::new();
    let mut offsets = Vec::new();
    for c in cells {
        offsets.push(pool.len() as u32);
        pool.extend_from_slice(c);
        pool.push(0);
    }
    (pool, offsets)
}

/// Pointer-row fixture: one slot assignment per row, header declaring the
/// real cell count.
fn rows_file(cells: &[&[u8]], rows: &[[Option<usize>; 3]]) -> Vec<u8> {
    let (pool, offsets) = pool_of(cells);
    let mut out = Vec::new();
    out.extend_from_slice(&TEST_ROWS.signature_bytes());
    for v in [0u32, cells.len() as u32, 0, 0, 0, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    for row in rows {
        let mut r = vec![0u8; 0x50];
        for (slot, cell_idx) in row.iter().enumerate() {
            if let Some(ci) = cell_idx {
                let ptr = 0x10 + offsets[*ci];
                r[0x34 + slot * 4..0x34 + slot * 4 + 4].copy_from_slice(&ptr.to_le_bytes());
            }
        }
        out.extend_from_slice(&r);
    }
    for _ in rows.len()..3 {
        out.extend_from_slice(&[0u8; 0x50]);
    }
    out.extend_from_slice(&pool);
    out
}

/// Count/offset-pair fixture: entry 0 is the sentinel, then one entry per
/// `(count, first_cell_index)`.
fn pairs_file(cells: &[&[u8]], groups: &[(u32, usize)]) -> Vec<u8> {
    let (pool, offsets) = pool_of(cells);
    let mut out = Vec::new();
    out.extend_from_slice(&TEST_PAIRS.signature_bytes());
    for v in [0u32, cells.len() as u32, 0, 0] {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    for (count, first) in groups {
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&offsets[*first].to_le_bytes());
    }
    for _ in groups.len() + 1..4 {
        out.extend_from_slice(&[0u8; 8]);
    }
    out.extend_from_slice(&pool);
    out
}

#[test]
fn round_trip_unmodified_rows_is_byte_identical() {
    let data = rows_file(
        &[b"Hello", b"World", b"!"],
        &[[Some(0), None, None], [Some(1), Some(2), None]],
    );
    let (file, warnings) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    let (out, report) = ite_core::encode(&file);
    assert_eq!(report.cells_written, 3);
    assert!(report.lossy_cells.is_empty());
    assert_eq!(out, data);
}

#[test]
fn round_trip_unmodified_pairs_is_byte_identical() {
    let data = pairs_file(&[b"alpha", b"beta", b"gamma"], &[(2, 0), (1, 2)]);
    let (file, warnings) = ite_core::decode(&data, &TEST_PAIRS).expect("decode");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    let (out, _) = ite_core::encode(&file);
    assert_eq!(out, data);
}

#[test]
fn pairs_offset_first_order_round_trips() {
    const SWAPPED: FormatDescriptor = FormatDescriptor {
        name: "test-pairs-swapped",
        signature: "Test Pairs file.",
        header_fields: 4,
        layout: TableLayout::CountOffsetPairs {
            entry_count: 4,
            order: PairOrder::OffsetFirst,
        },
    };
    // same table as pairs_file but with each pair's fields swapped
    let count_first = pairs_file(&[b"one", b"two"], &[(2, 0)]);
    let mut data = count_first.clone();
    let table = 32;
    for pair in 0..4 {
        let at = table + pair * 8;
        let (a, b) = (
            <[u8; 4]>::try_from(&count_first[at..at + 4]).unwrap(),
            <[u8; 4]>::try_from(&count_first[at + 4..at + 8]).unwrap(),
        );
        data[at..at + 4].copy_from_slice(&b);
        data[at + 4..at + 8].copy_from_slice(&a);
    }
    let (file, warnings) = ite_core::decode(&data, &SWAPPED).expect("decode");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(file.cells.len(), 2);
    assert_eq!(file.cells[0].refs.len(), 1);
    let (out, _) = ite_core::encode(&file);
    assert_eq!(out, data);
}

#[test]
fn pointers_shift_by_length_delta_after_translation() {
    let data = rows_file(&[b"Hello", b"World"], &[[Some(0), None, None], [Some(1), None, None]]);
    let (mut file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let old_next_offset = file.cells[1].offset;

    // "Olá mundo" is 9 CP-1252 bytes vs 5 original
    file.apply_translation(1, "Olá mundo").expect("apply");
    let (out, report) = ite_core::encode(&file);
    assert!(report.lossy_cells.is_empty());

    let (reloaded, warnings) = ite_core::decode(&out, &TEST_ROWS).expect("decode encoded");
    assert!(warnings.is_empty(), "unexpected warnings: {warnings:?}");
    assert_eq!(reloaded.cells[0].text, "Olá mundo");
    assert_eq!(reloaded.cells[1].text, "World");
    let delta = 9u32 - 5;
    assert_eq!(reloaded.cells[1].offset, old_next_offset + delta);

    // pointer integrity: each slot still resolves to the same cell id
    for (i, entry) in reloaded.entries.iter().take(2).enumerate() {
        let ite_core::IndexEntry::Row { slots, .. } = entry else {
            panic!("expected row entry");
        };
        assert_eq!(slots[0].cell, Some(i as u32 + 1));
        assert_eq!(slots[0].raw, 0x10 + reloaded.cells[i].offset);
    }
}

#[test]
fn header_count_tracks_written_cells() {
    // header lies about the cell count: decode warns, encode corrects
    let mut data = rows_file(&[b"a", b"b"], &[[Some(0), Some(1), None]]);
    data[20..24].copy_from_slice(&99u32.to_le_bytes());
    let (file, warnings) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    assert!(warnings.iter().any(|w| matches!(
        w,
        ite_core::DecodeWarning::CellCountMismatch { declared: 99, .. }
    )));
    let (out, _) = ite_core::encode(&file);
    assert_eq!(u32::from_le_bytes(<[u8; 4]>::try_from(&out[20..24]).unwrap()), 2);
}

#[test]
fn truncated_file_is_fatal() {
    let data = rows_file(&[b"x"], &[[Some(0), None, None]]);
    let short = &data[..TEST_ROWS.min_len() - 1];
    match ite_core::decode(short, &TEST_ROWS) {
        Err(ite_core::Error::TruncatedFile { needed, got }) => {
            assert_eq!(needed, TEST_ROWS.min_len());
            assert_eq!(got, short.len());
        }
        other => panic!("expected TruncatedFile, got {other:?}"),
    }
}

#[test]
fn unresolved_pointer_is_a_warning_not_an_error() {
    let mut data = rows_file(&[b"abc"], &[[Some(0), None, None]]);
    // point slot 2 of row 0 into the middle of the only cell
    let at = TEST_ROWS.table_start() + 0x38;
    data[at..at + 4].copy_from_slice(&(0x10u32 + 1).to_le_bytes());
    let (file, warnings) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    assert!(warnings.iter().any(|w| matches!(
        w,
        ite_core::DecodeWarning::UnresolvedReference { entry: 0, slot: 1, .. }
    )));
    // the unresolved raw value replays verbatim
    let (out, _) = ite_core::encode(&file);
    assert_eq!(&out[at..at + 4], &(0x10u32 + 1).to_le_bytes());
}

#[test]
fn empty_cells_mid_pool_keep_their_ids() {
    let data = pairs_file(&[b"a", b"", b"c"], &[(3, 0)]);
    let (file, _) = ite_core::decode(&data, &TEST_PAIRS).expect("decode");
    assert_eq!(file.cells.len(), 3);
    assert_eq!(file.cells[1].text, "");
    assert_eq!(file.cells[1].offset, 2);
    let (out, _) = ite_core::encode(&file);
    assert_eq!(out, data);
}

#[test]
fn unterminated_pool_tail_is_kept_and_warned() {
    let mut data = pairs_file(&[b"a"], &[(1, 0)]);
    data.extend_from_slice(b"tail");
    let (file, warnings) = ite_core::decode(&data, &TEST_PAIRS).expect("decode");
    assert_eq!(file.cells.len(), 2);
    assert_eq!(file.cells[1].text, "tail");
    assert!(warnings
        .iter()
        .any(|w| matches!(w, ite_core::DecodeWarning::UnterminatedPool { cell_id: 2, .. })));
}

#[test]
fn escape_unescape_is_a_bijection() {
    // every possible cell byte (NUL terminates cells, so it never occurs)
    for b in 1u8..=255 {
        let bytes = vec![b, b'A', b];
        let (back, lossy) = ite_core::unescape(&ite_core::escape(&bytes));
        assert!(!lossy, "byte {b:#04x} went lossy");
        assert_eq!(back, bytes, "byte {b:#04x} did not round-trip");
    }
    // pseudo-random sequences, deterministic seed
    let mut state = 0x2545_F491u32;
    for _ in 0..200 {
        let len = (state % 40) as usize + 1;
        let mut bytes = Vec::with_capacity(len);
        for _ in 0..len {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let b = (state >> 24) as u8;
            bytes.push(if b == 0 { 1 } else { b });
        }
        let text = ite_core::escape(&bytes);
        let (back, lossy) = ite_core::unescape(&text);
        assert!(!lossy);
        assert_eq!(back, bytes, "sequence {bytes:?} via {text:?}");
    }
}

#[test]
fn escape_renders_controls_and_backslashes() {
    assert_eq!(ite_core::escape(b"Hi\x0Ethere"), "Hi\\x0Ethere");
    assert_eq!(ite_core::escape(b"a\\b"), "a\\\\b");
    assert_eq!(ite_core::escape(b"line1\nline2"), "line1\\nline2");
    // 0xE1 is a-acute in CP-1252
    assert_eq!(ite_core::escape(&[b'O', b'l', 0xE1]), "Olá");
}

#[test]
fn unescape_flags_unencodable_chars() {
    let (bytes, lossy) = ite_core::unescape("漢字");
    assert!(lossy);
    assert_eq!(bytes, b"??");
}

#[test]
fn export_is_additive_and_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let data = rows_file(&[b"Hello", b"World"], &[[Some(0), Some(1), None]]);
    let (file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");

    let ledger = dir.path().join("texts.txt");
    let added = ite_core::export_to_path(&file, &ledger).expect("export");
    assert_eq!(added, 2);
    let first = std::fs::read_to_string(&ledger).unwrap();
    assert!(first.contains("CELULA: 1"));
    assert!(first.contains("ORIGINAL [5 chars]: Hello"));

    // translator fills something in; re-export must not clobber it
    let edited = ite_core::patch_translation(&first, 1, "Olá").unwrap();
    std::fs::write(&ledger, &edited).unwrap();
    let added = ite_core::export_to_path(&file, &ledger).expect("re-export");
    assert_eq!(added, 0);
    assert_eq!(std::fs::read_to_string(&ledger).unwrap(), edited);
}

#[test]
fn reconcile_accepts_valid_blocks_and_patches_ledger() {
    let data = rows_file(&[b"Hello", b"World"], &[[Some(0), Some(1), None]]);
    let (mut file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");

    let pasted = ite_core::patch_translation(&ledger, 1, "Olá mundo").unwrap();
    let outcome = ite_core::reconcile(&file, &ledger, &pasted);
    assert_eq!(outcome.accepted, vec![(1, "Olá mundo".to_string())]);
    assert!(outcome.rejected.is_empty());
    // cell 2's block has no translation: skipped, not rejected
    assert_eq!(outcome.skipped, 1);
    assert!(outcome.ledger.contains("Olá mundo"));

    outcome.apply(&mut file).expect("apply");
    let (out, _) = ite_core::encode(&file);
    let (reloaded, _) = ite_core::decode(&out, &TEST_ROWS).expect("decode encoded");
    assert_eq!(reloaded.cells[0].text, "Olá mundo");
    assert_eq!(reloaded.cells[1].text, "World");
}

#[test]
fn reconcile_rejects_original_drift() {
    let data = rows_file(&[b"Hallo"], &[[Some(0), None, None]]);
    let (mut file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");

    let pasted = "OFFSET: 0x00000118\nCELULA: 1\nORIGINAL [5 chars]: Hello\nTRADUÇÃO:\nOlá\n";
    let outcome = ite_core::reconcile(&file, &ledger, pasted);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].cell_id, 1);
    assert_eq!(outcome.ledger, ledger);

    // the binary stays untouched for the rejected cell
    outcome.apply(&mut file).expect("apply");
    let (out, _) = ite_core::encode(&file);
    assert_eq!(out, data);
}

#[test]
fn reconcile_tolerates_whitespace_only_drift() {
    let data = rows_file(&[b"Hello"], &[[Some(0), None, None]]);
    let (file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");

    let pasted = "OFFSET: 0x00000118\nCELULA: 1\nORIGINAL [5 chars]:  Hello \nTRADUÇÃO:\nOlá\n";
    let outcome = ite_core::reconcile(&file, &ledger, pasted);
    assert_eq!(outcome.accepted, vec![(1, "Olá".to_string())]);
    assert!(outcome.rejected.is_empty());
}

#[test]
fn reconcile_rejects_stale_ledger_after_regeneration() {
    // the ledger was written against different binary content
    let data = rows_file(&[b"Howdy"], &[[Some(0), None, None]]);
    let (file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let ledger = "OFFSET: 0x00000118\nCELULA: 1\nORIGINAL [5 chars]: Hello\nTRADUÇÃO:\n\n";
    let pasted = "OFFSET: 0x00000118\nCELULA: 1\nORIGINAL [5 chars]: Hello\nTRADUÇÃO:\nOlá\n";
    let outcome = ite_core::reconcile(&file, ledger, pasted);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
    assert!(outcome.rejected[0].reason.contains("drifted"));
}

#[test]
fn reconcile_rejects_unknown_id_and_skips_untranslated() {
    let data = rows_file(&[b"Hello"], &[[Some(0), None, None]]);
    let (file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");

    let pasted = "OFFSET: 0x0\nCELULA: 7\nORIGINAL [5 chars]: Hello\nTRADUÇÃO:\nOlá\n\n\
                  OFFSET: 0x00000118\nCELULA: 1\nORIGINAL [5 chars]: Hello\nTRADUÇÃO:\n\n";
    let outcome = ite_core::reconcile(&file, &ledger, pasted);
    assert!(outcome.accepted.is_empty());
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.rejected[0].cell_id, 7);
    assert_eq!(outcome.skipped, 1);
}

#[test]
fn session_save_backs_up_before_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Test.eng");
    let data = rows_file(&[b"Hello", b"World"], &[[Some(0), Some(1), None]]);
    std::fs::write(&path, &data).unwrap();

    let mut session = Session::open_as(&path, &TEST_ROWS).expect("open");
    session.file.apply_translation(2, "Mundo!").expect("apply");
    let report = session.save().expect("save");

    assert!(report.backup.exists());
    assert_eq!(std::fs::read(&report.backup).unwrap(), data);
    let (reloaded, _) =
        ite_core::decode(&std::fs::read(&path).unwrap(), &TEST_ROWS).expect("decode saved");
    assert_eq!(reloaded.cells[1].text, "Mundo!");

    // a second save must not reuse the first backup file
    session.file.apply_translation(1, "Oi").expect("apply");
    let second = session.save().expect("save again");
    assert_ne!(second.backup, report.backup);
    assert!(second.backup.exists());
}

#[test]
fn lossy_replacement_is_flagged() {
    let data = rows_file(&[b"Hello"], &[[Some(0), None, None]]);
    let (mut file, _) = ite_core::decode(&data, &TEST_ROWS).expect("decode");
    file.apply_translation(1, "漢字").expect("apply");
    let (out, report) = ite_core::encode(&file);
    assert_eq!(report.lossy_cells, vec![1]);
    let (reloaded, _) = ite_core::decode(&out, &TEST_ROWS).expect("decode encoded");
    assert_eq!(reloaded.cells[0].text, "??");
}

#[test]
fn fill_ledger_respects_skip_rules() {
    struct Upper;
    impl ite_core::Translator for Upper {
        fn translate(&self, text: &str, _s: &str, _t: &str) -> Result<String, String> {
            Ok(text.to_uppercase())
        }
    }

    let data = pairs_file(&[b"Hi", b"long enough", b"another one"], &[(3, 0)]);
    let (file, _) = ite_core::decode(&data, &TEST_PAIRS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");
    // cell 3 already translated by hand
    let ledger = ite_core::patch_translation(&ledger, 3, "feito").unwrap();

    let (filled, stats) =
        ite_core::fill_ledger(&ledger, &Upper, &ite_core::FillOpts::default());
    assert_eq!(stats.filled, 1);
    assert_eq!(stats.skipped, 2); // "Hi" too short, cell 3 already done
    assert_eq!(stats.failed, 0);
    assert!(filled.contains("LONG ENOUGH"));
    assert!(filled.contains("feito"));
    assert!(!filled.contains("ANOTHER ONE"));

    // filled output merges cleanly back through reconciliation
    let outcome = ite_core::reconcile(&file, &ledger, &filled);
    assert!(outcome.rejected.is_empty());
    assert!(outcome.accepted.contains(&(2, "LONG ENOUGH".to_string())));
}

#[test]
fn untranslated_batch_extraction() {
    let data = pairs_file(&[b"first text", b"second text"], &[(2, 0)]);
    let (file, _) = ite_core::decode(&data, &TEST_PAIRS).expect("decode");
    let (ledger, _) = ite_core::export_missing(&file, "");
    let ledger = ite_core::patch_translation(&ledger, 1, "primeiro").unwrap();

    let batch = ite_core::ledger::untranslated_blocks(&ledger, 10);
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].cell_id, Some(2));
    assert!(batch[0].raw.contains("second text"));
}

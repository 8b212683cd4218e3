//! Dialect descriptors: the closed set of index-table layouts.
//!
//! Each supported file family is described once, up front, by a
//! `FormatDescriptor`; everything downstream (decode, encode, ledger) is
//! driven off the descriptor instead of per-family code paths. The layout
//! variant is resolved at load time, either by signature sniffing or by the
//! caller naming the dialect.

/// Field order inside a count/offset pair. Same shape, two observed
/// orderings between dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairOrder {
    CountFirst,
    OffsetFirst,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// Fixed-size rows, each carrying up to three independent pointer
    /// slots. A non-zero slot stores `bias + pool_offset`; zero is unset.
    /// Row bytes outside the slots are opaque and replayed verbatim.
    PointerRows {
        row_size: usize,
        row_count: usize,
        slot_offsets: [usize; 3],
        bias: u32,
    },
    /// Fixed-count table of `(count, pool_offset)` u32 pairs; entry 0 is
    /// the `(0, 0)` sentinel and owns no cells.
    CountOffsetPairs { entry_count: usize, order: PairOrder },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub name: &'static str,
    /// Signature text; NUL-padded to 16 bytes on disk.
    pub signature: &'static str,
    /// Number of u32 header fields following the signature.
    pub header_fields: usize,
    pub layout: TableLayout,
}

impl FormatDescriptor {
    /// Byte offset where the index table begins (right after the header).
    pub fn table_start(&self) -> usize {
        16 + 4 * self.header_fields
    }

    pub fn table_len(&self) -> usize {
        match self.layout {
            TableLayout::PointerRows { row_size, row_count, .. } => row_size * row_count,
            TableLayout::CountOffsetPairs { entry_count, .. } => 8 * entry_count,
        }
    }

    /// Byte offset where the string pool begins.
    pub fn pool_start(&self) -> usize {
        self.table_start() + self.table_len()
    }

    pub fn entry_count(&self) -> usize {
        match self.layout {
            TableLayout::PointerRows { row_count, .. } => row_count,
            TableLayout::CountOffsetPairs { entry_count, .. } => entry_count,
        }
    }

    /// Minimum file size: header plus the full index region.
    pub fn min_len(&self) -> usize {
        self.pool_start()
    }

    pub fn signature_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        for (slot, b) in out.iter_mut().zip(self.signature.as_bytes()) {
            *slot = *b;
        }
        out
    }

    pub fn matches(&self, data: &[u8]) -> bool {
        data.len() >= 16 && data[..16] == self.signature_bytes()
    }
}

/// Emperor: Rise of the Middle Kingdom text table (`EmperorMM.eng`).
pub const EMPEROR: FormatDescriptor = FormatDescriptor {
    name: "emperor",
    signature: "Emperor MM file.",
    header_fields: 6,
    layout: TableLayout::PointerRows {
        row_size: 0x50,
        row_count: 1000,
        slot_offsets: [0x34, 0x38, 0x3C],
        bias: 0x10,
    },
};

/// Zeus: Master of Olympus text table (`Zeus_Text.eng`).
pub const ZEUS: FormatDescriptor = FormatDescriptor {
    name: "zeus",
    signature: "Zeus Text file.",
    header_fields: 4,
    layout: TableLayout::CountOffsetPairs {
        entry_count: 367,
        order: PairOrder::CountFirst,
    },
};

/// Poseidon expansion table; same pair shape as Zeus with the fields
/// swapped.
pub const POSEIDON: FormatDescriptor = FormatDescriptor {
    name: "poseidon",
    signature: "Poseidon file.",
    header_fields: 4,
    layout: TableLayout::CountOffsetPairs {
        entry_count: 367,
        order: PairOrder::OffsetFirst,
    },
};

pub const KNOWN: [&FormatDescriptor; 3] = [&EMPEROR, &ZEUS, &POSEIDON];

/// Match a buffer's signature against the known dialects.
pub fn detect(data: &[u8]) -> Option<&'static FormatDescriptor> {
    KNOWN.iter().copied().find(|d| d.matches(data))
}

pub fn by_name(name: &str) -> Option<&'static FormatDescriptor> {
    KNOWN
        .iter()
        .copied()
        .find(|d| d.name.eq_ignore_ascii_case(name))
}

//! Reversible display escaping for raw cell bytes.
//!
//! Cells are stored in an 8-bit code page (CP-1252) and may contain control
//! bytes the game interprets as markup. `escape` renders the bytes as
//! editable text (`\n`, `\r`, `\t`, `\\`, `\xHH`); `unescape` maps that
//! text back to bytes. The pair is a bijection: `unescape(escape(b))`
//! returns `b` for every byte sequence, with no loss flag.

/// CP-1252 0x80..=0x9F. `None` marks the five undefined code points, which
/// round-trip as `\xHH` instead.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'), // 0x80 €
    None,             // 0x81
    Some('\u{201A}'), // 0x82 ‚
    Some('\u{0192}'), // 0x83 ƒ
    Some('\u{201E}'), // 0x84 „
    Some('\u{2026}'), // 0x85 …
    Some('\u{2020}'), // 0x86 †
    Some('\u{2021}'), // 0x87 ‡
    Some('\u{02C6}'), // 0x88 ˆ
    Some('\u{2030}'), // 0x89 ‰
    Some('\u{0160}'), // 0x8A Š
    Some('\u{2039}'), // 0x8B ‹
    Some('\u{0152}'), // 0x8C Œ
    None,             // 0x8D
    Some('\u{017D}'), // 0x8E Ž
    None,             // 0x8F
    None,             // 0x90
    Some('\u{2018}'), // 0x91 '
    Some('\u{2019}'), // 0x92 '
    Some('\u{201C}'), // 0x93 "
    Some('\u{201D}'), // 0x94 "
    Some('\u{2022}'), // 0x95 •
    Some('\u{2013}'), // 0x96 –
    Some('\u{2014}'), // 0x97 —
    Some('\u{02DC}'), // 0x98 ˜
    Some('\u{2122}'), // 0x99 ™
    Some('\u{0161}'), // 0x9A š
    Some('\u{203A}'), // 0x9B ›
    Some('\u{0153}'), // 0x9C œ
    None,             // 0x9D
    Some('\u{017E}'), // 0x9E ž
    Some('\u{0178}'), // 0x9F Ÿ
];

/// Render raw cell bytes as display text.
pub fn escape(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() + 8);
    for &b in bytes {
        match b {
            b'\t' => out.push_str("\\t"),
            b'\n' => out.push_str("\\n"),
            b'\r' => out.push_str("\\r"),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7E => out.push(b as char),
            0x80..=0x9F => match CP1252_HIGH[(b - 0x80) as usize] {
                Some(c) => out.push(c),
                None => {
                    write!(&mut out, "\\x{b:02X}").ok();
                }
            },
            0xA0..=0xFF => out.push(char::from_u32(u32::from(b)).unwrap_or('?')),
            _ => {
                write!(&mut out, "\\x{b:02X}").ok();
            }
        }
    }
    out
}

/// Map display text back to CP-1252 bytes. The flag is true when a
/// character had no CP-1252 form and was replaced with `?` (the caller
/// records this as a lossy-encoding fallback for the cell).
pub fn unescape(text: &str) -> (Vec<u8>, bool) {
    let mut out = Vec::with_capacity(text.len());
    let mut lossy = false;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.peek().copied() {
                Some('n') => {
                    chars.next();
                    out.push(b'\n');
                }
                Some('r') => {
                    chars.next();
                    out.push(b'\r');
                }
                Some('t') => {
                    chars.next();
                    out.push(b'\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push(b'\\');
                }
                Some('x') => {
                    // \xHH; kept literally when the digits are malformed
                    let mut ahead = chars.clone();
                    ahead.next();
                    let hi = ahead.next().and_then(|d| d.to_digit(16));
                    let lo = ahead.next().and_then(|d| d.to_digit(16));
                    if let (Some(hi), Some(lo)) = (hi, lo) {
                        out.push((hi * 16 + lo) as u8);
                        chars = ahead;
                    } else {
                        out.push(b'\\');
                    }
                }
                _ => out.push(b'\\'),
            }
        } else {
            match cp1252_byte(c) {
                Some(b) => out.push(b),
                None => {
                    out.push(b'?');
                    lossy = true;
                }
            }
        }
    }
    (out, lossy)
}

fn cp1252_byte(c: char) -> Option<u8> {
    let u = c as u32;
    match u {
        // NUL would split the cell in the pool; treated as unencodable
        0 => None,
        0x01..=0x7F | 0xA0..=0xFF => Some(u as u8),
        _ => CP1252_HIGH
            .iter()
            .position(|&hc| hc == Some(c))
            .map(|i| 0x80 + i as u8),
    }
}

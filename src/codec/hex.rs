//! Hex dump rendering
//!
//! Rows of 16 bytes: `<offset>: <hex pairs>`, optionally followed by an
//! ASCII gutter. With the gutter the hex column is padded to 47 columns
//! (16 pairs with single-space separators) and two spaces precede the text.

use std::fmt::Write;

const ROW_WIDTH: usize = 16;
const HEX_COLUMN: usize = ROW_WIDTH * 3 - 1;

pub fn hex_dump(data: &[u8], base_offset: u64, ascii_gutter: bool) -> String {
    let mut out = String::with_capacity(data.len() * 4 + 16);
    for (row, chunk) in data.chunks(ROW_WIDTH).enumerate() {
        if row > 0 {
            out.push('\n');
        }
        let offset = base_offset + (row * ROW_WIDTH) as u64;
        let hex: Vec<String> = chunk.iter().map(|b| format!("{b:02x}")).collect();
        let hex = hex.join(" ");
        if ascii_gutter {
            let ascii: String = chunk.iter().map(|&b| printable_char(b)).collect();
            let _ = write!(out, "{offset:08x}: {hex:<width$}  {ascii}", width = HEX_COLUMN);
        } else {
            let _ = write!(out, "{offset:08x}: {hex}");
        }
    }
    out
}

/// Space-separated lowercase hex without offsets, used for inline blobs.
pub fn hex_string(data: &[u8]) -> String {
    data.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ")
}

fn printable_char(b: u8) -> char {
    if (0x20..0x7f).contains(&b) {
        b as char
    } else {
        '.'
    }
}

//! Entry lists inside `BLKs` / `ITMs` sections
//!
//! An entry starts with three leading fields:
//!
//! ```text
//! u16 name_len, [name_len] name        (UTF-8)
//! u32 secondary                        (collection index / item id)
//! u16 label_len, [label_len] label     (author / collection name)
//! ```
//!
//! followed by a body whose length is not stored anywhere. The end of an
//! entry is found by scanning forward for something that looks like the
//! leading fields of the next one ([`next_entry_start`]). The last entry of
//! a section always ends at the section boundary.
//!
//! A failed read marks that entry with an error and resumes at the next
//! plausible entry start, so one bad entry never loses its siblings.

pub mod block;
pub mod item;

use serde::{Serialize, Serializer};
use tracing::debug;

use crate::codec::hex_string;
use crate::codec::types::{f32_at, u16_at, u32_at, GridCoord, Located, Vec3};
use crate::codec::BinaryReader;
use crate::config::DecoderConfig;
use crate::error::{Error, Result};
use super::sections::Section;

pub use block::BlockEntry;
pub use item::ItemEntry;

/// Shortest string `note_hidden_string` reports.
const HIDDEN_STRING_MIN: usize = 3;

/// Where one entry may live inside its section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRegion {
    pub start: usize,
    pub section_end: usize,
    /// Last of the section's declared count.
    pub is_last: bool,
}

/// Verbatim bytes that no field claimed
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Blob {
    pub offset: usize,
    #[serde(serialize_with = "serialize_hex")]
    pub bytes: Vec<u8>,
}

impl Blob {
    fn capture(payload: &[u8], start: usize, end: usize) -> Option<Self> {
        let bytes = payload.get(start..end)?;
        (!bytes.is_empty()).then(|| Self { offset: start, bytes: bytes.to_vec() })
    }
}

fn serialize_hex<S: Serializer>(bytes: &[u8], s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&hex_string(bytes))
}

/// The three leading fields, each kept if it was read.
#[derive(Debug, Default)]
pub(crate) struct Leading {
    pub name: Option<Located<String>>,
    pub secondary: Option<Located<u32>>,
    pub label: Option<Located<String>>,
}

impl Leading {
    /// Fill fields in order; stops at the first failing read. `names` label
    /// the secondary and label fields in errors.
    pub fn read(&mut self, reader: &mut BinaryReader, names: [&'static str; 2]) -> Result<()> {
        self.name = Some(read_field(reader, "name", |r| r.read_lp_string())?);
        self.secondary = Some(read_field(reader, names[0], |r| r.read_u32_le())?);
        self.label = Some(read_field(reader, names[1], |r| r.read_lp_string())?);
        Ok(())
    }
}

/// Located read whose error names the field.
pub(crate) fn read_field<'a, T>(
    reader: &mut BinaryReader<'a>,
    field: &'static str,
    read: impl FnOnce(&mut BinaryReader<'a>) -> Result<T>,
) -> Result<Located<T>> {
    reader.located(read).map_err(|e| Error::Field {
        field,
        source: Box::new(e),
    })
}

/// Decode `section.count` entries with `parse_one`, which returns the entry
/// and the offset where the next one starts.
pub(crate) fn walk_entries<E>(
    section: &Section,
    mut parse_one: impl FnMut(EntryRegion) -> (E, usize),
) -> Vec<E> {
    let count = section.count as usize;
    let mut entries = Vec::with_capacity(count.min(1024));
    let mut pos = section.entries_start();
    for i in 0..count {
        if pos >= section.end {
            debug!(
                tag = section.tag.as_str(),
                declared = count,
                decoded = i,
                "Section exhausted before declared count"
            );
            break;
        }
        let region = EntryRegion {
            start: pos,
            section_end: section.end,
            is_last: i + 1 == count,
        };
        let (entry, next) = parse_one(region);
        entries.push(entry);
        pos = next.max(pos + 1);
    }
    entries
}

/// End of an entry whose fields ended at `from`: the section end for the
/// last entry, otherwise the next plausible entry start.
pub(crate) fn entry_boundary(
    payload: &[u8],
    region: EntryRegion,
    from: usize,
    config: &DecoderConfig,
    notes: &mut Vec<String>,
) -> usize {
    if region.is_last {
        return region.section_end;
    }
    match next_entry_start(payload, from, region.section_end, config) {
        Some(next) => next,
        None => {
            notes.push("next entry start not found, using section end".into());
            region.section_end
        }
    }
}

/// Note the first printable length-prefixed string in the unclaimed bytes
/// `from..end`. A corrupt name length in the following entry makes the
/// boundary scan skip it, leaving its fields here.
pub(crate) fn note_hidden_string(
    payload: &[u8],
    from: usize,
    end: usize,
    config: &DecoderConfig,
    notes: &mut Vec<String>,
) {
    let end = end.min(payload.len());
    let max_len = config.max_name_len as usize;
    let hidden = (from..end).find(|&at| printable_lp_string(payload, at, end, HIDDEN_STRING_MIN, max_len).is_some());
    if let Some(at) = hidden {
        notes.push(format!("unclaimed bytes hold a string at {at}, an entry may be hidden here"));
    }
}

/// Resume point after a failed read at `failed_at`.
pub(crate) fn recover(payload: &[u8], region: EntryRegion, failed_at: usize, config: &DecoderConfig) -> usize {
    if region.is_last {
        return region.section_end;
    }
    let from = failed_at.max(region.start + 1);
    let next = next_entry_start(payload, from, region.section_end, config);
    debug!(
        entry = region.start,
        failed_at,
        resume = next,
        "Entry decode failed, scanning for next entry"
    );
    next.unwrap_or(region.section_end)
}

/// First offset in `from..end` that looks like the leading fields of an
/// entry: a printable name, a u32 below `max_secondary_value`, and a
/// printable label, all inside `end`.
pub fn next_entry_start(payload: &[u8], from: usize, end: usize, config: &DecoderConfig) -> Option<usize> {
    let end = end.min(payload.len());
    (from..end).find(|&at| looks_like_entry_start(payload, at, end, config))
}

fn looks_like_entry_start(payload: &[u8], at: usize, end: usize, config: &DecoderConfig) -> bool {
    let max_len = config.max_name_len as usize;
    let Some(name_end) = printable_lp_string(payload, at, end, 1, max_len) else {
        return false;
    };
    if name_end + 4 > end {
        return false;
    }
    match u32_at(payload, name_end) {
        Some(v) if v < config.max_secondary_value => {}
        _ => return false,
    }
    printable_lp_string(payload, name_end + 4, end, 0, max_len).is_some()
}

/// End offset of a printable u16 length-prefixed string at `at`.
fn printable_lp_string(payload: &[u8], at: usize, end: usize, min_len: usize, max_len: usize) -> Option<usize> {
    if at + 2 > end {
        return None;
    }
    let len = u16_at(payload, at)? as usize;
    if len < min_len || len > max_len {
        return None;
    }
    let stop = at + 2 + len;
    if stop > end {
        return None;
    }
    payload[at + 2..stop].iter().all(|&b| is_text_byte(b)).then_some(stop)
}

fn is_text_byte(b: u8) -> bool {
    (0x20..0x7f).contains(&b) || matches!(b, b'\t' | b'\r' | b'\n')
}

// Field scanners shared by the free-scan profiles.

/// First byte offset whose three u32 values are all below `limit`.
pub(crate) fn scan_grid_coord(payload: &[u8], from: usize, end: usize, limit: u32) -> Option<Located<GridCoord>> {
    let last = end.min(payload.len()).checked_sub(12)?;
    (from..=last).find_map(|i| {
        let c = GridCoord::from_slice(&payload[i..i + 12])?;
        c.fits_grid(limit).then(|| Located::new(i, c))
    })
}

/// First byte offset holding a u32 direction in `0..=max`.
pub(crate) fn scan_direction(payload: &[u8], from: usize, end: usize, max: u16) -> Option<Located<u16>> {
    let last = end.min(payload.len()).checked_sub(4)?;
    (from..=last).find_map(|i| {
        let v = u32_at(payload, i)?;
        (v <= max as u32).then(|| Located::new(i, v as u16))
    })
}

/// First 4-aligned (relative to `from`) finite triple inside `bound` whose
/// components do not all sit near zero.
pub(crate) fn scan_position(payload: &[u8], from: usize, end: usize, bound: f32) -> Option<Located<Vec3>> {
    scan_triple(payload, from, end, |v| is_position(v, bound))
}

pub(crate) fn is_position(v: Vec3, bound: f32) -> bool {
    v.within(bound) && v.is_plausible() && v.abs_sum() > 1.0
}

pub(crate) fn scan_triple(
    payload: &[u8],
    from: usize,
    end: usize,
    accept: impl Fn(Vec3) -> bool,
) -> Option<Located<Vec3>> {
    let last = end.min(payload.len()).checked_sub(12)?;
    (from..=last).step_by(4).find_map(|i| {
        let v = Vec3::from_slice(&payload[i..i + 12])?;
        accept(v).then(|| Located::new(i, v))
    })
}

pub(crate) fn scan_f32(payload: &[u8], from: usize, end: usize, accept: impl Fn(f32) -> bool) -> Option<Located<f32>> {
    let last = end.min(payload.len()).checked_sub(4)?;
    (from..=last).step_by(4).find_map(|i| {
        let v = f32_at(payload, i)?;
        accept(v).then(|| Located::new(i, v))
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::codec::types::{GridCoord, Vec3};
    use crate::codec::BinaryWriter;

    pub struct BlockFixture {
        pub name: &'static str,
        pub index: u32,
        pub author: &'static str,
        pub coord: GridCoord,
        pub direction: u16,
        pub position: Vec3,
        pub rotation: Vec3,
        pub tail: Vec<u8>,
    }

    impl BlockFixture {
        pub fn sample(name: &'static str) -> Self {
            Self {
                name,
                index: 3,
                author: "alice",
                coord: GridCoord::new(10, 20, 30),
                direction: 2,
                position: Vec3::new(5.0, 1.5, -12.25),
                rotation: Vec3::new(0.0, std::f32::consts::FRAC_PI_2, 0.0),
                tail: vec![0xEE, 0xEE],
            }
        }

        pub fn write(&self, w: &mut BinaryWriter) {
            w.write_lp_string(self.name);
            w.write_u32_le(self.index);
            w.write_lp_string(self.author);
            w.write_grid_coord(self.coord);
            w.write_u16_le(self.direction);
            w.write_vec3(self.position);
            w.write_vec3(self.rotation);
            w.write_bytes(&self.tail);
        }
    }

    /// Section header for `tag` followed by the entry bodies produced by `fill`.
    pub fn section_payload(prefix: &[u8], tag: &[u8; 4], count: u16, fill: impl FnOnce(&mut BinaryWriter)) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_bytes(prefix);
        w.write_bytes(tag);
        w.write_u16_le(count);
        fill(&mut w);
        w.into_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryWriter;

    fn leading(name: &str, secondary: u32, label: &str) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_lp_string(name);
        w.write_u32_le(secondary);
        w.write_lp_string(label);
        w.into_vec()
    }

    #[test]
    fn test_next_entry_start_finds_leading_fields() {
        let mut data = vec![0xFF, 0x00, 0x01, 0x02, 0x03];
        data.extend(leading("Floor_Wood", 7, "bob"));
        let config = DecoderConfig::default();
        assert_eq!(next_entry_start(&data, 0, data.len(), &config), Some(5));
    }

    #[test]
    fn test_next_entry_start_rejects_implausible() {
        let config = DecoderConfig::default();
        // secondary field out of range
        let data = leading("Floor_Wood", 1 << 20, "bob");
        assert_eq!(next_entry_start(&data, 0, data.len(), &config), None);
        // non-printable name
        let data = leading("Fl\x01or", 1, "bob");
        assert_eq!(next_entry_start(&data, 0, data.len(), &config), None);
        // label runs past the boundary
        let data = leading("Floor", 1, "bob");
        assert_eq!(next_entry_start(&data, 0, data.len() - 1, &config), None);
    }

    #[test]
    fn test_next_entry_start_accepts_empty_label_and_whitespace() {
        let config = DecoderConfig::default();
        let data = leading("Sign\ttext\r\n", 0, "");
        assert_eq!(next_entry_start(&data, 0, data.len(), &config), Some(0));
    }

    #[test]
    fn test_walk_entries_stops_at_section_end() {
        let section = Section {
            tag: crate::decode::sections::SectionTag::Blocks,
            offset: 0,
            count: 5,
            end: 20,
        };
        let mut starts = Vec::new();
        let out = walk_entries(&section, |region| {
            starts.push(region.start);
            (region.start, region.start + 7)
        });
        assert_eq!(out, vec![6, 13]);
        assert_eq!(starts, vec![6, 13]);
    }

    #[test]
    fn test_walk_entries_always_progresses() {
        let section = Section {
            tag: crate::decode::sections::SectionTag::Items,
            offset: 0,
            count: 3,
            end: 100,
        };
        let out = walk_entries(&section, |region| (region.is_last, region.start));
        assert_eq!(out, vec![false, false, true]);
    }

    #[test]
    fn test_field_scanners() {
        let mut w = BinaryWriter::new();
        w.write_u32_le(0xFFFF_FFFF);
        w.write_grid_coord(GridCoord::new(100, 2, 3));
        let data = w.into_vec();
        let c = scan_grid_coord(&data, 0, data.len(), 4096).unwrap();
        assert_eq!(c.offset, 4);
        assert_eq!(c.value, GridCoord::new(100, 2, 3));

        let d = scan_direction(&data, 0, data.len(), 7).unwrap();
        assert_eq!(d.offset, 8);
        assert_eq!(d.value, 2);

        assert!(scan_grid_coord(&data, 0, 11, 4096).is_none());
    }

    #[test]
    fn test_blob_capture() {
        let data = [1u8, 2, 3, 4];
        let blob = Blob::capture(&data, 1, 3).unwrap();
        assert_eq!(blob.offset, 1);
        assert_eq!(blob.bytes, vec![2, 3]);
        assert!(Blob::capture(&data, 2, 2).is_none());
        assert!(Blob::capture(&data, 2, 9).is_none());
        assert_eq!(serde_json::to_value(&blob).unwrap()["bytes"], "02 03");
    }
}

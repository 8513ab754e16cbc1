//! Item entries (`ITMs`)
//!
//! Items share the leading fields of blocks but their body has no reliable
//! fixed layout. The core of it is a 26-byte window:
//!
//! ```text
//! u16 direction, f32 px, f32 py, f32 pz, f32 rx, f32 ry, f32 rz
//! ```
//!
//! usually preceded by a grid coordinate and followed by a scale, a pivot
//! and two u32 flags near the end of the entry.

use serde::Serialize;
use tracing::trace;

use super::{
    entry_boundary, is_position, note_hidden_string, recover, scan_direction, scan_f32, scan_grid_coord, scan_position, scan_triple,
    walk_entries, Blob, EntryRegion, Leading,
};
use crate::codec::types::{u16_at, u32_at, GridCoord, Located, Rotation, Vec3};
use crate::codec::BinaryReader;
use crate::config::{DecoderConfig, TrailerProfile};
use crate::decode::sections::Section;

const WINDOW_LEN: usize = 26;
const SCALE_MIN: f32 = 0.01;
const SCALE_MAX: f32 = 64.0;
const SCALE_SEARCH: usize = 64;
const PIVOT_SEARCH: usize = 128;
const FLAG_TAIL: usize = 24;
const VARIANT_LIMIT: u32 = 1 << 20;
/// Free-scan looks for coordinate and direction only this far into the body.
const FREE_SCAN_HEAD: usize = 96;
const FREE_SCAN_ROTATION_SEARCH: usize = 96;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ItemEntry {
    pub offset: usize,
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Located<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<Located<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<Located<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coord: Option<Located<GridCoord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Located<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Located<Vec3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Located<Rotation>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<Located<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pivot: Option<Located<Vec3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_flying: Option<Located<bool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_index: Option<Located<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<Blob>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ItemEntry {
    fn set_leading(&mut self, leading: Leading) {
        self.name = leading.name;
        self.item_id = leading.secondary;
        self.collection = leading.label;
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Direction + position + rotation, all plausible.
struct Window {
    offset: usize,
    direction: u16,
    position: Vec3,
    rotation: Vec3,
}

/// Decode every declared entry of an `ITMs` section.
pub fn parse_item_entries(payload: &[u8], section: &Section, config: &DecoderConfig) -> Vec<ItemEntry> {
    walk_entries(section, |region| {
        let entry = decode_item(payload, region, config);
        let next = entry.end;
        (entry, next)
    })
}

fn decode_item(payload: &[u8], region: EntryRegion, config: &DecoderConfig) -> ItemEntry {
    let mut entry = ItemEntry {
        offset: region.start,
        ..Default::default()
    };
    let mut reader = BinaryReader::bounded(payload, region.start, region.section_end);
    let mut leading = Leading::default();
    let result = leading.read(&mut reader, ["item id", "collection"]);
    entry.set_leading(leading);
    if let Err(e) = result {
        trace!(offset = region.start, error = %e, "Item entry failed");
        entry.error = Some(e.to_string());
        entry.end = recover(payload, region, reader.position(), config);
        return entry;
    }

    let body = reader.position();
    let end = entry_boundary(payload, region, body, config, &mut entry.notes);
    let cursor = match config.profile {
        TrailerProfile::FixedOffset => locate_window_fields(payload, body, end, config, &mut entry),
        TrailerProfile::FreeScan => locate_free_fields(payload, body, end, config, &mut entry),
    };
    match cursor {
        Some(cursor) => {
            let cursor = locate_extras(payload, cursor, end, &mut entry);
            if config.profile == TrailerProfile::FixedOffset {
                note_hidden_string(payload, cursor, end, config, &mut entry.notes);
            }
            entry.tail = Blob::capture(payload, cursor, end);
        }
        None => {
            entry.notes.push("body fields not located".into());
            entry.tail = Blob::capture(payload, body, end);
        }
    }
    entry.end = end;
    entry
}

/// Fill the window fields and the coordinate before them. Returns the
/// offset right after the rotation.
fn locate_window_fields(
    payload: &[u8],
    body: usize,
    end: usize,
    config: &DecoderConfig,
    entry: &mut ItemEntry,
) -> Option<usize> {
    let w = find_window(payload, body, end, config)?;
    if let Some(at) = w.offset.checked_sub(12).filter(|&at| at >= body) {
        entry.coord = GridCoord::from_slice(&payload[at..])
            .filter(|c| c.fits_grid(config.max_grid_component))
            .map(|c| Located::new(at, c));
    }
    entry.direction = Some(Located::new(w.offset, w.direction));
    entry.position = Some(Located::new(w.offset + 2, w.position));
    entry.rotation = Some(Located::new(w.offset + 14, Rotation::from(w.rotation)));
    Some(w.offset + WINDOW_LEN)
}

fn find_window(payload: &[u8], from: usize, end: usize, config: &DecoderConfig) -> Option<Window> {
    let last = end.min(payload.len()).checked_sub(WINDOW_LEN)?;
    (from..=last).find_map(|j| {
        let direction = u16_at(payload, j)?;
        if direction > config.max_direction {
            return None;
        }
        let position = Vec3::from_slice(&payload[j + 2..])?;
        if !is_position(position, config.position_bound) {
            return None;
        }
        let rotation = Vec3::from_slice(&payload[j + 14..])?;
        is_rotation(rotation, config).then_some(Window {
            offset: j,
            direction,
            position,
            rotation,
        })
    })
}

fn is_rotation(v: Vec3, config: &DecoderConfig) -> bool {
    v.within(config.rotation_bound) && v.is_plausible()
}

/// Search each field independently. Returns the offset after the last
/// located vector, or `None` when no position was found.
fn locate_free_fields(
    payload: &[u8],
    body: usize,
    end: usize,
    config: &DecoderConfig,
    entry: &mut ItemEntry,
) -> Option<usize> {
    let head = (body + FREE_SCAN_HEAD).min(end);
    entry.coord = scan_grid_coord(payload, body, head, config.max_grid_component);
    entry.direction = scan_direction(payload, body, head, config.max_direction);

    let position = scan_position(payload, body, end, config.position_bound)?;
    let mut cursor = position.offset + 12;
    entry.position = Some(position);

    let search_end = (cursor + FREE_SCAN_ROTATION_SEARCH).min(end);
    if let Some(rot) = scan_triple(payload, cursor, search_end, |v| is_rotation(v, config)) {
        cursor = rot.offset + 12;
        entry.rotation = Some(Located::new(rot.offset, Rotation::from(rot.value)));
    }
    Some(cursor)
}

/// Scale, pivot and trailing flags after `cursor`. Returns the offset after
/// the last vector field located.
fn locate_extras(payload: &[u8], mut cursor: usize, end: usize, entry: &mut ItemEntry) -> usize {
    let scale_end = (cursor + SCALE_SEARCH).min(end);
    if let Some(scale) = scan_f32(payload, cursor, scale_end, |v| (SCALE_MIN..=SCALE_MAX).contains(&v)) {
        cursor = scale.offset + 4;
        let pivot_end = (scale.offset + PIVOT_SEARCH).min(end);
        if let Some(pivot) = scan_triple(payload, cursor, pivot_end, |v| v.is_finite()) {
            cursor = pivot.offset + 12;
            entry.pivot = Some(pivot);
        }
        entry.scale = Some(scale);
    }
    locate_flags(payload, cursor, end, entry);
    cursor
}

/// Within the last bytes of the region: the first u32 in {0, 1} is the
/// flying flag, the first other small u32 the variant index. Either may
/// come first.
fn locate_flags(payload: &[u8], cursor: usize, end: usize, entry: &mut ItemEntry) {
    let start = cursor.max(end.saturating_sub(FLAG_TAIL));
    for j in (start..end.saturating_sub(3)).step_by(4) {
        let Some(v) = u32_at(payload, j) else {
            break;
        };
        if entry.is_flying.is_none() && v <= 1 {
            entry.is_flying = Some(Located::new(j, v == 1));
        } else if entry.variant_index.is_none() && v < VARIANT_LIMIT {
            entry.variant_index = Some(Located::new(j, v));
        }
        if entry.is_flying.is_some() && entry.variant_index.is_some() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BinaryWriter;
    use crate::decode::entries::fixtures::section_payload;
    use crate::decode::sections::{find_sections, SectionTag};
    use std::f32::consts::FRAC_PI_2;

    struct ItemFixture {
        name: &'static str,
        coord: GridCoord,
        flags: [u32; 2],
    }

    impl ItemFixture {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                coord: GridCoord::new(4, 5, 6),
                flags: [0, 12],
            }
        }

        fn write_leading(&self, w: &mut BinaryWriter) {
            w.write_lp_string(self.name);
            w.write_u32_le(77);
            w.write_lp_string("Props");
        }

        fn write_tail(&self, w: &mut BinaryWriter) {
            w.write_vec3(Vec3::new(12.0, 3.0, -4.5));
            w.write_vec3(Vec3::new(0.0, FRAC_PI_2, 0.0));
            w.write_f32_le(1.0);
            w.write_vec3(Vec3::new(0.0, 0.5, 0.0));
            w.write_u32_le(self.flags[0]);
            w.write_u32_le(self.flags[1]);
        }

        /// Window layout: u16 direction.
        fn write(&self, w: &mut BinaryWriter) {
            self.write_leading(w);
            w.write_grid_coord(self.coord);
            w.write_u16_le(3);
            self.write_tail(w);
        }

        /// Free-scan layout: u32 direction.
        fn write_u32_direction(&self, w: &mut BinaryWriter) {
            self.write_leading(w);
            w.write_grid_coord(self.coord);
            w.write_u32_le(3);
            self.write_tail(w);
        }
    }

    fn items_section(payload: &[u8]) -> Section {
        *find_sections(payload)
            .iter()
            .find(|s| s.tag == SectionTag::Items)
            .unwrap()
    }

    #[test]
    fn test_item_window() {
        let payload = section_payload(&[], b"ITMs", 1, |w| ItemFixture::new("Lamp_Post").write(w));
        let section = items_section(&payload);
        let entries = parse_item_entries(&payload, &section, &DecoderConfig::default());
        assert_eq!(entries.len(), 1);

        let e = &entries[0];
        assert!(!e.is_error());
        assert_eq!(e.item_id.as_ref().unwrap().value, 77);
        assert_eq!(e.collection.as_ref().unwrap().value, "Props");
        assert_eq!(e.coord.as_ref().unwrap(), &Located::new(28, GridCoord::new(4, 5, 6)));
        assert_eq!(e.direction.as_ref().unwrap(), &Located::new(40, 3));
        assert_eq!(e.position.as_ref().unwrap(), &Located::new(42, Vec3::new(12.0, 3.0, -4.5)));
        assert_eq!(e.rotation.as_ref().unwrap().offset, 54);
        assert_eq!(e.scale.as_ref().unwrap(), &Located::new(66, 1.0));
        assert_eq!(e.pivot.as_ref().unwrap(), &Located::new(70, Vec3::new(0.0, 0.5, 0.0)));
        assert_eq!(e.is_flying.as_ref().unwrap(), &Located::new(82, false));
        assert_eq!(e.variant_index.as_ref().unwrap(), &Located::new(86, 12));
        assert_eq!(e.tail.as_ref().unwrap().offset, 82);
        assert_eq!(e.end, payload.len());
        assert!(e.notes.is_empty());
    }

    #[test]
    fn test_two_items_split_at_boundary() {
        let payload = section_payload(&[], b"ITMs", 2, |w| {
            ItemFixture::new("Lamp_Post").write(w);
            ItemFixture::new("Crate_Big").write(w);
        });
        let section = items_section(&payload);
        let entries = parse_item_entries(&payload, &section, &DecoderConfig::default());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].end, entries[1].offset);
        assert_eq!(entries[0].variant_index.as_ref().unwrap().value, 12);
        assert_eq!(entries[1].name.as_ref().unwrap().value, "Crate_Big");
        assert_eq!(entries[1].direction.as_ref().unwrap().value, 3);
    }

    #[test]
    fn test_item_without_window_keeps_leading_fields() {
        let payload = section_payload(&[], b"ITMs", 1, |w| {
            ItemFixture::new("Lamp_Post").write_leading(w);
            w.write_bytes(&[0xFF; 20]);
        });
        let section = items_section(&payload);
        let entries = parse_item_entries(&payload, &section, &DecoderConfig::default());
        let e = &entries[0];
        assert!(!e.is_error());
        assert_eq!(e.name.as_ref().unwrap().value, "Lamp_Post");
        assert!(e.position.is_none());
        assert_eq!(e.notes, vec!["body fields not located".to_string()]);
        assert_eq!(e.tail.as_ref().unwrap().bytes.len(), 20);
    }

    #[test]
    fn test_corrupt_item_recovers() {
        let payload = section_payload(&[], b"ITMs", 2, |w| {
            w.write_u16_le(0xFFFF);
            w.write_bytes(b"Lamp_Post");
            w.write_u32_le(77);
            w.write_lp_string("Props");
            w.write_grid_coord(GridCoord::new(4, 5, 6));
            w.write_u16_le(3);
            ItemFixture::new("Lamp_Post").write_tail(w);
            ItemFixture::new("Crate_Big").write(w);
        });
        let section = items_section(&payload);
        let entries = parse_item_entries(&payload, &section, &DecoderConfig::default());
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_error());
        assert!(!entries[1].is_error());
        assert_eq!(entries[1].name.as_ref().unwrap().value, "Crate_Big");
        assert_eq!(entries[1].scale.as_ref().unwrap().value, 1.0);
    }

    #[test]
    fn test_variant_before_flying_flag() {
        let mut fixture = ItemFixture::new("Lamp_Post");
        fixture.flags = [7, 1];
        let payload = section_payload(&[], b"ITMs", 1, |w| fixture.write(w));
        let section = items_section(&payload);
        let entries = parse_item_entries(&payload, &section, &DecoderConfig::default());

        let e = &entries[0];
        assert_eq!(e.variant_index.as_ref().unwrap(), &Located::new(82, 7));
        assert_eq!(e.is_flying.as_ref().unwrap(), &Located::new(86, true));
    }

    #[test]
    fn test_free_scan_item() {
        let mut fixture = ItemFixture::new("Lamp_Post");
        fixture.coord = GridCoord::new(40, 50, 60);
        fixture.flags = [1, 12];
        let payload = section_payload(&[], b"ITMs", 1, |w| fixture.write_u32_direction(w));
        let section = items_section(&payload);
        let config = DecoderConfig::default().with_profile(TrailerProfile::FreeScan);
        let entries = parse_item_entries(&payload, &section, &config);

        let e = &entries[0];
        let body = 28;
        assert!(!e.is_error());
        assert_eq!(e.coord.as_ref().unwrap(), &Located::new(body, GridCoord::new(40, 50, 60)));
        assert_eq!(e.direction.as_ref().unwrap(), &Located::new(body + 12, 3));
        assert_eq!(e.position.as_ref().unwrap().offset, body + 16);
        assert_eq!(e.rotation.as_ref().unwrap().offset, body + 28);
        assert_eq!(e.scale.as_ref().unwrap().offset, body + 40);
        assert_eq!(e.pivot.as_ref().unwrap().offset, body + 44);
        assert_eq!(e.is_flying.as_ref().unwrap(), &Located::new(body + 56, true));
        assert_eq!(e.variant_index.as_ref().unwrap(), &Located::new(body + 60, 12));
    }
}

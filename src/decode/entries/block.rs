//! Block entries (`BLKs`)
//!
//! Fixed-offset layout after the leading fields:
//!
//! ```text
//! u32 x, u32 y, u32 z        grid coordinate, each < max_grid_component
//! u16 direction              0..=max_direction
//! f32 px, f32 py, f32 pz     world position
//! f32 rx, f32 ry, f32 rz     rotation, radians
//! [..]                       unclaimed bytes up to the next entry
//! ```

use std::f32::consts::FRAC_PI_2;

use serde::Serialize;
use tracing::trace;

use super::{
    entry_boundary, note_hidden_string, read_field, recover, scan_direction, scan_grid_coord, scan_position,
    walk_entries, Blob, EntryRegion, Leading,
};
use crate::codec::types::{f32_at, GridCoord, Located, Rotation, Vec3};
use crate::codec::BinaryReader;
use crate::config::{DecoderConfig, TrailerProfile};
use crate::decode::sections::Section;
use crate::error::{Error, Result};

/// Block positions are world-space and never this far out.
const FREE_SCAN_POSITION_BOUND: f32 = 50_000.0;
const HALF_PI_EPSILON: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BlockEntry {
    pub offset: usize,
    /// Exclusive end of the bytes attributed to this entry.
    pub end: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<Located<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_index: Option<Located<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Located<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coord: Option<Located<GridCoord>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direction: Option<Located<u16>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Located<Vec3>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Located<Rotation>>,
    /// A lone f32 near +-pi/2 (free-scan only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation_hint: Option<Located<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tail: Option<Blob>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BlockEntry {
    fn set_leading(&mut self, leading: Leading) {
        self.name = leading.name;
        self.collection_index = leading.secondary;
        self.author = leading.label;
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode every declared entry of a `BLKs` section.
pub fn parse_block_entries(payload: &[u8], section: &Section, config: &DecoderConfig) -> Vec<BlockEntry> {
    walk_entries(section, |region| {
        let entry = match config.profile {
            TrailerProfile::FixedOffset => decode_fixed(payload, region, config),
            TrailerProfile::FreeScan => decode_free_scan(payload, region, config),
        };
        let next = entry.end;
        (entry, next)
    })
}

fn decode_fixed(payload: &[u8], region: EntryRegion, config: &DecoderConfig) -> BlockEntry {
    let mut entry = BlockEntry {
        offset: region.start,
        ..Default::default()
    };
    let mut reader = BinaryReader::bounded(payload, region.start, region.section_end);
    let mut leading = Leading::default();

    let result = leading
        .read(&mut reader, ["collection index", "author"])
        .and_then(|()| read_trailer(&mut reader, &mut entry, config));
    entry.set_leading(leading);

    match result {
        Ok(()) => {
            let body_end = reader.position();
            check_trailer(&mut entry, config);
            let end = entry_boundary(payload, region, body_end, config, &mut entry.notes);
            note_hidden_string(payload, body_end, end, config, &mut entry.notes);
            entry.tail = Blob::capture(payload, body_end, end);
            entry.end = end;
        }
        Err(e) => {
            trace!(offset = region.start, error = %e, "Block entry failed");
            entry.error = Some(e.to_string());
            entry.end = recover(payload, region, reader.position(), config);
        }
    }
    entry
}

/// Fixed fields after the leading strings. A coordinate outside the grid
/// means the layout does not apply to this entry, so it fails the entry.
fn read_trailer(reader: &mut BinaryReader, entry: &mut BlockEntry, config: &DecoderConfig) -> Result<()> {
    let coord = read_field(reader, "coordinate", |r| r.read_grid_coord())?;
    let fits = coord.value.fits_grid(config.max_grid_component);
    let offset = coord.offset;
    let worst = coord.value.x.max(coord.value.y).max(coord.value.z);
    entry.coord = Some(coord);
    if !fits {
        return Err(Error::Field {
            field: "coordinate",
            source: Box::new(Error::OutOfRange {
                offset,
                value: worst as u64,
                limit: config.max_grid_component as u64,
            }),
        });
    }
    entry.direction = Some(read_field(reader, "direction", |r| r.read_u16_le())?);
    entry.position = Some(read_field(reader, "position", |r| r.read_vec3())?);
    entry.rotation = Some(read_field(reader, "rotation", |r| r.read_vec3().map(Rotation::from))?);
    Ok(())
}

fn check_trailer(entry: &mut BlockEntry, config: &DecoderConfig) {
    if let Some(d) = &entry.direction {
        if d.value > config.max_direction {
            entry.notes.push(format!("direction {} above {}", d.value, config.max_direction));
        }
    }
    if let Some(p) = &entry.position {
        if !p.value.within(config.position_bound) {
            entry.notes.push("position outside bound".into());
        }
    }
    if let Some(r) = &entry.rotation {
        if !r.value.radians.within(config.rotation_bound) {
            entry.notes.push("rotation outside bound".into());
        }
    }
}

fn decode_free_scan(payload: &[u8], region: EntryRegion, config: &DecoderConfig) -> BlockEntry {
    let mut entry = BlockEntry {
        offset: region.start,
        ..Default::default()
    };
    let mut reader = BinaryReader::bounded(payload, region.start, region.section_end);
    let mut leading = Leading::default();
    let result = leading.read(&mut reader, ["collection index", "author"]);
    entry.set_leading(leading);
    if let Err(e) = result {
        entry.error = Some(e.to_string());
        entry.end = recover(payload, region, reader.position(), config);
        return entry;
    }

    let body = reader.position();
    let end = entry_boundary(payload, region, body, config, &mut entry.notes);
    entry.coord = scan_grid_coord(payload, body, end, config.max_grid_component);
    entry.direction = scan_direction(payload, body, end, config.max_direction);
    entry.rotation_hint = scan_half_pi(payload, body, end);
    entry.position = scan_position(payload, body, end, FREE_SCAN_POSITION_BOUND);
    if entry.coord.is_none() && entry.direction.is_none() && entry.position.is_none() {
        entry.notes.push("no body fields located".into());
    }
    entry.tail = Blob::capture(payload, body, end);
    entry.end = end;
    entry
}

/// First byte offset holding an f32 within epsilon of +-pi/2.
fn scan_half_pi(payload: &[u8], from: usize, end: usize) -> Option<Located<f32>> {
    let last = end.min(payload.len()).checked_sub(4)?;
    (from..=last).find_map(|i| {
        let v = f32_at(payload, i)?;
        ((v.abs() - FRAC_PI_2).abs() < HALF_PI_EPSILON).then(|| Located::new(i, v))
    })
}

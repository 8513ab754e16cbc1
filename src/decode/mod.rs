//! Payload decoding
//!
//! [`PayloadDecoder`] maps a record's type id to one of a handful of
//! decoders through an explicit table. Chat and admin payloads have exact
//! layouts; map-edit payloads go through section discovery, the entry
//! parsers and the auxiliary scanners. Everything else reports its length.
//!
//! Decoding never fails: problems inside a payload end up as warnings,
//! notes or per-entry errors in the result.

pub mod admin;
pub mod cache;
pub mod chat;
pub mod entries;
pub mod scan;
pub mod sections;

use std::collections::HashMap;
use std::io::{Read, Seek};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use crate::codec::types::u32_at;
use crate::config::DecoderConfig;
use crate::error::Result;
use crate::log::{EventType, Record, RecordStream};

pub use admin::{decode_admin_action_limit, ActionLimit};
pub use cache::DecodeCache;
pub use chat::{decode_chat, ChatMessage};
pub use entries::block::parse_block_entries;
pub use entries::item::parse_item_entries;
pub use entries::{next_entry_start, BlockEntry, ItemEntry};
pub use scan::{GuidRef, LpString, PositionCandidate, TransformCandidate};
pub use sections::{find_sections, Section, SectionTag};

/// Decoder selected for a type id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecoderKind {
    Chat,
    ActionLimit,
    MapEdit,
    Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DecodedPayload {
    Chat(ChatMessage),
    ActionLimit(ActionLimit),
    MapEdit(Box<MapEdit>),
    Raw { raw_len: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub offset: usize,
    pub count: u16,
    pub end: usize,
}

impl From<&Section> for SectionInfo {
    fn from(s: &Section) -> Self {
        Self {
            offset: s.offset,
            count: s.count,
            end: s.end,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryList<E> {
    /// Declared count from the section header.
    pub count: u16,
    pub entries: Vec<E>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
}

impl<E> EntryList<E> {
    /// Notes a shortfall when fewer entries than declared were decoded.
    pub fn new(count: u16, entries: Vec<E>) -> Self {
        let mut notes = Vec::new();
        if entries.len() < count as usize {
            notes.push(format!("decoded {} of {} declared entries", entries.len(), count));
        }
        Self { count, entries, notes }
    }
}

impl<E> Default for EntryList<E> {
    fn default() -> Self {
        Self::new(0, Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SkinSummary {
    pub count: u16,
}

/// Decoded `Place` / `Delete` / `SetSkin` payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maybe_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maybe_size_field: Option<u32>,
    /// Every known tag in `BLKs`, `SKNs`, `ITMs` order, `null` when absent.
    pub sections: IndexMap<&'static str, Option<SectionInfo>>,
    pub blocks: EntryList<BlockEntry>,
    pub skins: SkinSummary,
    pub items: EntryList<ItemEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub lp_strings: Vec<LpString>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub guid_refs: Vec<GuidRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transform_candidates: Vec<TransformCandidate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub position_candidates: Vec<PositionCandidate>,
}

pub fn decode_map_edit(payload: &[u8], config: &DecoderConfig) -> MapEdit {
    let found = find_sections(payload);
    let sections = SectionTag::ALL
        .iter()
        .map(|&tag| (tag.as_str(), sections::section(&found, tag).map(SectionInfo::from)))
        .collect();

    let blocks = sections::section(&found, SectionTag::Blocks)
        .map(|s| EntryList::new(s.count, parse_block_entries(payload, s, config)))
        .unwrap_or_default();
    let items = sections::section(&found, SectionTag::Items)
        .map(|s| EntryList::new(s.count, parse_item_entries(payload, s, config)))
        .unwrap_or_default();
    let skins = SkinSummary {
        count: sections::section(&found, SectionTag::Skins).map_or(0, |s| s.count),
    };

    let failed = blocks.entries.iter().filter(|e| e.is_error()).count()
        + items.entries.iter().filter(|e| e.is_error()).count();
    debug!(
        payload_len = payload.len(),
        sections = found.len(),
        blocks = blocks.entries.len(),
        items = items.entries.len(),
        failed,
        "Decoded map edit"
    );

    let (maybe_version, maybe_size_field) = match (u32_at(payload, 0), u32_at(payload, 4)) {
        (Some(v), Some(s)) => (Some(v), Some(s)),
        _ => (None, None),
    };

    MapEdit {
        maybe_version,
        maybe_size_field,
        sections,
        blocks,
        skins,
        items,
        lp_strings: scan::extract_lp_strings(payload, config.lp_string_limit),
        guid_refs: scan::find_guid_refs(payload, config.ref_limit),
        transform_candidates: scan::transform_candidates(
            payload,
            0,
            payload.len(),
            config.transform_candidate_limit,
        ),
        position_candidates: scan::position_candidates(payload, 0, payload.len(), config.position_candidate_limit),
    }
}

/// Type-id dispatch table plus the heuristics configuration
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    table: HashMap<u32, DecoderKind>,
    config: DecoderConfig,
}

impl Default for PayloadDecoder {
    fn default() -> Self {
        Self::new(DecoderConfig::default())
    }
}

impl PayloadDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        let table = [
            (EventType::ChatMsg, DecoderKind::Chat),
            (EventType::AdminSetActionLimit, DecoderKind::ActionLimit),
            (EventType::Place, DecoderKind::MapEdit),
            (EventType::Delete, DecoderKind::MapEdit),
            (EventType::SetSkin, DecoderKind::MapEdit),
        ]
        .into_iter()
        .map(|(ty, kind)| (ty as u32, kind))
        .collect();
        Self { table, config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Route `type_id` to `kind`, returning the previous route.
    pub fn register(&mut self, type_id: u32, kind: DecoderKind) -> Option<DecoderKind> {
        self.table.insert(type_id, kind)
    }

    pub fn kind(&self, type_id: u32) -> DecoderKind {
        self.table.get(&type_id).copied().unwrap_or(DecoderKind::Raw)
    }

    pub fn decode(&self, type_id: u32, payload: &[u8]) -> DecodedPayload {
        match self.kind(type_id) {
            DecoderKind::Chat => DecodedPayload::Chat(decode_chat(payload)),
            DecoderKind::ActionLimit => DecodedPayload::ActionLimit(decode_admin_action_limit(payload)),
            DecoderKind::MapEdit => DecodedPayload::MapEdit(Box::new(decode_map_edit(payload, &self.config))),
            DecoderKind::Raw => DecodedPayload::Raw {
                raw_len: payload.len(),
            },
        }
    }

    /// Read the record's payload from `stream` and decode it.
    pub fn decode_record<R: Read + Seek>(
        &self,
        stream: &mut RecordStream<R>,
        record: &Record,
    ) -> Result<DecodedPayload> {
        let payload = stream.read_payload(record)?;
        Ok(self.decode(record.type_id, &payload))
    }
}

//! Section tags inside map-edit payloads
//!
//! A map-edit payload carries up to three tagged sections, each a 4-byte
//! ASCII tag followed by a u16 entry count:
//!
//! ```text
//! ... "BLKs" u16 count [block entries] ... "SKNs" u16 count [...] ... "ITMs" u16 count [item entries]
//! ```
//!
//! Only the first occurrence of each tag is recognized. A section ends
//! where the next later section begins, or at the payload end.

use serde::Serialize;

/// Tag + count
pub const SECTION_HEADER_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SectionTag {
    #[serde(rename = "BLKs")]
    Blocks,
    #[serde(rename = "SKNs")]
    Skins,
    #[serde(rename = "ITMs")]
    Items,
}

impl SectionTag {
    pub const ALL: [SectionTag; 3] = [Self::Blocks, Self::Skins, Self::Items];

    pub fn bytes(self) -> &'static [u8; 4] {
        match self {
            Self::Blocks => b"BLKs",
            Self::Skins => b"SKNs",
            Self::Items => b"ITMs",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "BLKs",
            Self::Skins => "SKNs",
            Self::Items => "ITMs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Section {
    pub tag: SectionTag,
    /// Offset of the tag bytes within the payload.
    pub offset: usize,
    pub count: u16,
    /// Exclusive end boundary of the section's entries.
    pub end: usize,
}

impl Section {
    /// Offset of the first entry.
    pub fn entries_start(&self) -> usize {
        self.offset + SECTION_HEADER_LEN
    }
}

/// Locate the known sections, ordered by offset, with end boundaries set.
pub fn find_sections(payload: &[u8]) -> Vec<Section> {
    let mut sections: Vec<Section> = SectionTag::ALL
        .iter()
        .filter_map(|&tag| {
            let offset = find_tag(payload, tag.bytes())?;
            let count = payload.get(offset + 4..offset + SECTION_HEADER_LEN)?;
            Some(Section {
                tag,
                offset,
                count: u16::from_le_bytes([count[0], count[1]]),
                end: payload.len(),
            })
        })
        .collect();

    sections.sort_by_key(|s| s.offset);
    for i in 1..sections.len() {
        sections[i - 1].end = sections[i].offset;
    }
    sections
}

pub fn section(sections: &[Section], tag: SectionTag) -> Option<&Section> {
    sections.iter().find(|s| s.tag == tag)
}

fn find_tag(payload: &[u8], tag: &[u8; 4]) -> Option<usize> {
    payload.windows(tag.len()).position(|w| w == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocks_then_items() {
        let mut payload = vec![0u8; 8];
        payload.extend_from_slice(b"BLKs");
        payload.extend_from_slice(&2u16.to_le_bytes());
        payload.extend_from_slice(&[0x11; 20]);
        let items_at = payload.len();
        payload.extend_from_slice(b"ITMs");
        payload.extend_from_slice(&1u16.to_le_bytes());
        payload.extend_from_slice(&[0x22; 10]);

        let sections = find_sections(&payload);
        assert_eq!(sections.len(), 2);

        let blks = section(&sections, SectionTag::Blocks).unwrap();
        assert_eq!(blks.offset, 8);
        assert_eq!(blks.count, 2);
        assert_eq!(blks.entries_start(), 14);
        assert_eq!(blks.end, items_at);

        let itms = section(&sections, SectionTag::Items).unwrap();
        assert_eq!(itms.offset, items_at);
        assert_eq!(itms.count, 1);
        assert_eq!(itms.end, payload.len());
        assert!(section(&sections, SectionTag::Skins).is_none());
    }

    #[test]
    fn test_ordering_follows_offsets_not_tag_order() {
        let mut payload = Vec::new();
        payload.extend_from_slice(b"ITMs\x01\x00");
        payload.extend_from_slice(b"SKNs\x03\x00");
        payload.extend_from_slice(b"BLKs\x00\x00");

        let sections = find_sections(&payload);
        let tags: Vec<_> = sections.iter().map(|s| s.tag).collect();
        assert_eq!(tags, vec![SectionTag::Items, SectionTag::Skins, SectionTag::Blocks]);
        assert_eq!(sections[0].end, 6);
        assert_eq!(sections[1].end, 12);
        assert_eq!(sections[2].end, 18);
    }

    #[test]
    fn test_only_first_occurrence_counts() {
        let payload = b"BLKs\x01\x00xxBLKs\x09\x00";
        let sections = find_sections(payload);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].offset, 0);
        assert_eq!(sections[0].count, 1);
    }

    #[test]
    fn test_tag_without_count_is_ignored() {
        assert!(find_sections(b"....BLKs\x01").is_empty());
        assert!(find_sections(b"").is_empty());
    }
}

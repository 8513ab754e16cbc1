//! Frame layout
//!
//! ```text
//! u32 type_id
//! u32 payload_len
//! [payload_len] payload
//! u32 meta_len_flag    low 31 bits = meta_len, bit 31 reserved
//! [meta_len] meta
//!     u16 player_id_len
//!     [player_id_len] player_id (UTF-8)
//!     u64 timestamp_ms
//! ```
//!
//! All integers little-endian.

use bitflags::bitflags;

use crate::codec::BinaryWriter;

/// `type_id` + `payload_len`
pub const FRAME_HEADER_LEN: u64 = 8;

/// The `meta_len_flag` word
pub const META_FLAG_LEN: u64 = 4;

/// Smallest usable metadata block: empty player id + timestamp.
pub const MIN_META_LEN: u32 = 10;

bitflags! {
    /// Flag bits carried in the high bits of `meta_len_flag`
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MetaFlags: u32 {
        const RESERVED = 0x8000_0000;
    }
}

/// Split a raw `meta_len_flag` word into its length and flag bits.
pub fn split_meta_len_flag(raw: u32) -> (u32, MetaFlags) {
    let flags = MetaFlags::from_bits_truncate(raw);
    (raw & !MetaFlags::all().bits(), flags)
}

/// Encode one complete frame.
pub fn encode_frame(type_id: u32, payload: &[u8], player_id: &str, timestamp_ms: u64) -> Vec<u8> {
    encode_frame_with_flags(type_id, payload, player_id, timestamp_ms, MetaFlags::empty())
}

pub fn encode_frame_with_flags(
    type_id: u32,
    payload: &[u8],
    player_id: &str,
    timestamp_ms: u64,
    flags: MetaFlags,
) -> Vec<u8> {
    let mut meta = BinaryWriter::with_capacity(player_id.len() + 10);
    meta.write_lp_string(player_id);
    meta.write_u64_le(timestamp_ms);

    let mut w = BinaryWriter::with_capacity(payload.len() + meta.len() + 12);
    w.write_u32_le(type_id);
    w.write_u32_le(payload.len() as u32);
    w.write_bytes(payload);
    w.write_u32_le(meta.len() as u32 | flags.bits());
    w.write_bytes(meta.as_slice());
    w.into_vec()
}

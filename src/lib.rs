//! Map Together session log decoder
//!
//! Reads the append-only `*.map_together_log` files written by the Map
//! Together editor: an exact framer for the outer records plus best-effort
//! decoders for the payloads inside them.

pub mod codec;
pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod log;

pub use config::{DecoderConfig, TrailerProfile};
pub use decode::{
    BlockEntry, DecodeCache, DecodedPayload, DecoderKind, ItemEntry, MapEdit, PayloadDecoder,
};
pub use error::{Error, Result};
pub use export::RecordDocument;
pub use log::{type_name, EventType, Record, RecordStream, StreamStop};

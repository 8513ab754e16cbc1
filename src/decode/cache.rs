use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Read, Seek};

use tracing::trace;

use super::{DecodedPayload, PayloadDecoder};
use crate::error::Result;
use crate::log::{Record, RecordStream};

/// Decoded payloads keyed by record index.
///
/// Records themselves stay immutable headers; whoever wants to avoid
/// decoding the same payload twice owns one of these.
#[derive(Debug, Default)]
pub struct DecodeCache {
    entries: HashMap<u64, DecodedPayload>,
}

impl DecodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: u64) -> Option<&DecodedPayload> {
        self.entries.get(&index)
    }

    pub fn insert(&mut self, index: u64, decoded: DecodedPayload) -> Option<DecodedPayload> {
        self.entries.insert(index, decoded)
    }

    pub fn invalidate(&mut self, index: u64) -> Option<DecodedPayload> {
        self.entries.remove(&index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Cached result for `record`, decoding its payload on first use.
    pub fn get_or_decode<R: Read + Seek>(
        &mut self,
        stream: &mut RecordStream<R>,
        decoder: &PayloadDecoder,
        record: &Record,
    ) -> Result<&DecodedPayload> {
        match self.entries.entry(record.index) {
            Entry::Occupied(e) => Ok(e.into_mut()),
            Entry::Vacant(e) => {
                trace!(index = record.index, type_id = record.type_id, "Decoding payload");
                let decoded = decoder.decode_record(stream, record)?;
                Ok(e.insert(decoded))
            }
        }
    }
}

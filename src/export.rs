//! JSON export shape for one record

use serde::{Serialize, Serializer};

use crate::decode::DecodedPayload;
use crate::log::Record;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordDocument<'a> {
    pub index: u64,
    pub file_offset: u64,
    pub type_id: u32,
    pub type_name: String,
    pub payload_len: u32,
    pub meta_len: u32,
    pub player_id: &'a str,
    pub timestamp_ms: u64,
    pub time: String,
    /// `{}` when the payload was not decoded.
    #[serde(serialize_with = "serialize_decoded")]
    pub decoded: Option<&'a DecodedPayload>,
}

impl<'a> RecordDocument<'a> {
    pub fn new(record: &'a Record, decoded: Option<&'a DecodedPayload>) -> Self {
        Self {
            index: record.index,
            file_offset: record.file_offset,
            type_id: record.type_id,
            type_name: record.type_name().into_owned(),
            payload_len: record.payload_len,
            meta_len: record.meta_len,
            player_id: &record.player_id,
            timestamp_ms: record.timestamp_ms,
            time: record.time_string(),
            decoded,
        }
    }
}

fn serialize_decoded<S: Serializer>(decoded: &Option<&DecodedPayload>, s: S) -> Result<S::Ok, S::Error> {
    match decoded {
        Some(d) => d.serialize(s),
        None => serde_json::Map::new().serialize(s),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_chat;
    use serde_json::json;

    fn record() -> Record {
        Record {
            index: 4,
            file_offset: 120,
            type_id: 20,
            payload_offset: 128,
            payload_len: 8,
            meta_offset: 140,
            meta_len: 15,
            player_id: "alice".into(),
            timestamp_ms: 1_700_000_000_123,
        }
    }

    #[test]
    fn test_document_shape() {
        let rec = record();
        let decoded = DecodedPayload::Chat(decode_chat(&[0x01, 0x02, 0x00, b'h', b'i']));
        let doc = RecordDocument::new(&rec, Some(&decoded));
        assert_eq!(
            serde_json::to_value(&doc).unwrap(),
            json!({
                "index": 4,
                "file_offset": 120,
                "type_id": 20,
                "type_name": "ChatMsg",
                "payload_len": 8,
                "meta_len": 15,
                "player_id": "alice",
                "timestamp_ms": 1_700_000_000_123u64,
                "time": "2023-11-14 22:13:20.123",
                "decoded": {"msg_type": 1, "message": "hi"},
            })
        );
    }

    #[test]
    fn test_undecoded_is_empty_object() {
        let mut rec = record();
        rec.type_id = 77;
        let value = serde_json::to_value(RecordDocument::new(&rec, None)).unwrap();
        assert_eq!(value["decoded"], json!({}));
        assert_eq!(value["type_name"], "Unknown(77)");
    }
}

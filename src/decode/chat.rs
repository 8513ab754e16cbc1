//! `ChatMsg` payloads: u8 message kind, u16 length-prefixed UTF-8 text.

use serde::Serialize;

use crate::codec::BinaryReader;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ChatMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn decode_chat(payload: &[u8]) -> ChatMessage {
    let mut reader = BinaryReader::new(payload);
    let (Ok(msg_type), Ok(len)) = (reader.read_u8(), reader.read_u16_le()) else {
        return ChatMessage {
            warning: Some("payload too short for chat".into()),
            ..Default::default()
        };
    };

    let mut warning = None;
    let text = match reader.read_bytes(len as usize) {
        Ok(text) => text,
        Err(_) => {
            warning = Some("truncated chat payload".into());
            reader.read_remaining()
        }
    };
    ChatMessage {
        msg_type: Some(msg_type),
        message: Some(String::from_utf8_lossy(text).into_owned()),
        warning,
    }
}

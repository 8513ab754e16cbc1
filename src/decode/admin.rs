//! `Admin_SetActionLimit` payloads: a single u32 millisecond interval.

use serde::Serialize;

use crate::codec::BinaryReader;

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ActionLimit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_per_action_ms: Option<u32>,
    /// Actions per second; absent when the interval is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_hz: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub fn decode_admin_action_limit(payload: &[u8]) -> ActionLimit {
    let Ok(ms) = BinaryReader::new(payload).read_u32_le() else {
        return ActionLimit {
            warning: Some("payload too short".into()),
            ..Default::default()
        };
    };
    ActionLimit {
        limit_per_action_ms: Some(ms),
        limit_hz: (ms != 0).then(|| 1000.0 / ms as f64),
        warning: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forty_ms_is_25_hz() {
        let limit = decode_admin_action_limit(&40u32.to_le_bytes());
        assert_eq!(limit.limit_per_action_ms, Some(40));
        assert_eq!(limit.limit_hz, Some(25.0));
    }

    #[test]
    fn test_zero_has_no_frequency() {
        let limit = decode_admin_action_limit(&0u32.to_le_bytes());
        assert_eq!(limit.limit_per_action_ms, Some(0));
        assert!(limit.limit_hz.is_none());
        let json = serde_json::to_value(&limit).unwrap();
        assert!(json.get("limit_hz").is_none());
    }

    #[test]
    fn test_short_payload_warns() {
        let limit = decode_admin_action_limit(&[1, 2, 3]);
        assert!(limit.limit_per_action_ms.is_none());
        assert_eq!(limit.warning.as_deref(), Some("payload too short"));
    }
}

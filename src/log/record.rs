use std::borrow::Cow;

use chrono::DateTime;

use super::frame::{FRAME_HEADER_LEN, META_FLAG_LEN};

/// Event types written by the map editor (the `type_id` header field)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum EventType {
    Unknown = 0,
    Place = 1,
    Delete = 2,
    Resync = 3,
    SetSkin = 4,
    SetWaypoint = 5,
    SetMapName = 6,
    PlayerJoin = 7,
    PlayerLeave = 8,
    AdminPromoteMod = 9,
    AdminDemoteMod = 10,
    AdminKickPlayer = 11,
    AdminBanPlayer = 12,
    AdminChangeAdmin = 13,
    PlayerCamCursor = 14,
    VehiclePos = 15,
    AdminSetActionLimit = 16,
    AdminSetVariable = 17,
    AdminSetRoomPlayerLimit = 18,
    AdminAlertStatusToAll = 19,
    ChatMsg = 20,
    Ping = 21,
    ServerStats = 22,
}

impl EventType {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Unknown),
            1 => Some(Self::Place),
            2 => Some(Self::Delete),
            3 => Some(Self::Resync),
            4 => Some(Self::SetSkin),
            5 => Some(Self::SetWaypoint),
            6 => Some(Self::SetMapName),
            7 => Some(Self::PlayerJoin),
            8 => Some(Self::PlayerLeave),
            9 => Some(Self::AdminPromoteMod),
            10 => Some(Self::AdminDemoteMod),
            11 => Some(Self::AdminKickPlayer),
            12 => Some(Self::AdminBanPlayer),
            13 => Some(Self::AdminChangeAdmin),
            14 => Some(Self::PlayerCamCursor),
            15 => Some(Self::VehiclePos),
            16 => Some(Self::AdminSetActionLimit),
            17 => Some(Self::AdminSetVariable),
            18 => Some(Self::AdminSetRoomPlayerLimit),
            19 => Some(Self::AdminAlertStatusToAll),
            20 => Some(Self::ChatMsg),
            21 => Some(Self::Ping),
            22 => Some(Self::ServerStats),
            _ => None,
        }
    }

    /// Name as written by the editor's own tooling.
    pub fn name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Place => "Place",
            Self::Delete => "Delete",
            Self::Resync => "Resync",
            Self::SetSkin => "SetSkin",
            Self::SetWaypoint => "SetWaypoint",
            Self::SetMapName => "SetMapName",
            Self::PlayerJoin => "PlayerJoin",
            Self::PlayerLeave => "PlayerLeave",
            Self::AdminPromoteMod => "Admin_PromoteMod",
            Self::AdminDemoteMod => "Admin_DemoteMod",
            Self::AdminKickPlayer => "Admin_KickPlayer",
            Self::AdminBanPlayer => "Admin_BanPlayer",
            Self::AdminChangeAdmin => "Admin_ChangeAdmin",
            Self::PlayerCamCursor => "PlayerCamCursor",
            Self::VehiclePos => "VehiclePos",
            Self::AdminSetActionLimit => "Admin_SetActionLimit",
            Self::AdminSetVariable => "Admin_SetVariable",
            Self::AdminSetRoomPlayerLimit => "Admin_SetRoomPlayerLimit",
            Self::AdminAlertStatusToAll => "Admin_AlertStatusToAll",
            Self::ChatMsg => "ChatMsg",
            Self::Ping => "Ping",
            Self::ServerStats => "ServerStats",
        }
    }
}

/// Symbolic name for any type id; unregistered ids render as `Unknown(<id>)`.
pub fn type_name(type_id: u32) -> Cow<'static, str> {
    match EventType::from_u32(type_id) {
        Some(t) => Cow::Borrowed(t.name()),
        None => Cow::Owned(format!("Unknown({type_id})")),
    }
}

/// Header of one logged event. Payload and metadata bytes stay in the
/// file and are fetched through [`RecordStream`](super::RecordStream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub index: u64,
    pub file_offset: u64,
    pub type_id: u32,
    pub payload_offset: u64,
    pub payload_len: u32,
    pub meta_offset: u64,
    pub meta_len: u32,
    pub player_id: String,
    pub timestamp_ms: u64,
}

impl Record {
    pub fn event_type(&self) -> Option<EventType> {
        EventType::from_u32(self.type_id)
    }

    pub fn type_name(&self) -> Cow<'static, str> {
        type_name(self.type_id)
    }

    /// `8 + payload_len + 4 + meta_len`
    pub fn frame_len(&self) -> u64 {
        FRAME_HEADER_LEN + self.payload_len as u64 + META_FLAG_LEN + self.meta_len as u64
    }

    /// Offset of the first byte after this frame.
    pub fn end_offset(&self) -> u64 {
        self.file_offset + self.frame_len()
    }

    /// UTC `YYYY-MM-DD HH:MM:SS.mmm`, or the raw milliseconds when out of range.
    pub fn time_string(&self) -> String {
        i64::try_from(self.timestamp_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
            .unwrap_or_else(|| self.timestamp_ms.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(type_id: u32, timestamp_ms: u64) -> Record {
        Record {
            index: 0,
            file_offset: 0,
            type_id,
            payload_offset: 8,
            payload_len: 5,
            meta_offset: 17,
            meta_len: 14,
            player_id: "abcd".into(),
            timestamp_ms,
        }
    }

    #[test]
    fn test_type_names() {
        assert_eq!(type_name(0), "Unknown");
        assert_eq!(type_name(1), "Place");
        assert_eq!(type_name(2), "Delete");
        assert_eq!(type_name(16), "Admin_SetActionLimit");
        assert_eq!(type_name(20), "ChatMsg");
        assert_eq!(type_name(22), "ServerStats");
        assert_eq!(type_name(23), "Unknown(23)");
        assert_eq!(type_name(u32::MAX), format!("Unknown({})", u32::MAX));
    }

    #[test]
    fn test_registry_covers_all_ids() {
        for id in 0..=22u32 {
            let t = EventType::from_u32(id).unwrap();
            assert_eq!(t as u32, id);
        }
        assert!(EventType::from_u32(23).is_none());
    }

    #[test]
    fn test_frame_len() {
        let r = record(20, 0);
        assert_eq!(r.frame_len(), 8 + 5 + 4 + 14);
        assert_eq!(r.end_offset(), 31);
    }

    #[test]
    fn test_time_string_truncates_to_millis() {
        let r = record(20, 1_700_000_000_123);
        assert_eq!(r.time_string(), "2023-11-14 22:13:20.123");
    }

    #[test]
    fn test_time_string_out_of_range() {
        let r = record(20, u64::MAX);
        assert_eq!(r.time_string(), u64::MAX.to_string());
    }
}

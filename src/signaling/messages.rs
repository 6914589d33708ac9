//! Signaling message types
//!
//! Every message is a JSON object tagged by `type`. Legacy clients still send
//! `create_room`/`join_room`; both collapse into `join` against the single
//! session.

use serde::{Deserialize, Serialize};

use crate::room::PlayerInfo;

fn default_player_name() -> String {
    "Player".to_string()
}

fn default_bitrate() -> u32 {
    10_000
}

fn default_framerate() -> u32 {
    60
}

fn default_width() -> u32 {
    1920
}

fn default_height() -> u32 {
    1080
}

/// Browser to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(alias = "create_room", alias = "join_room")]
    Join {
        #[serde(default = "default_player_name")]
        player_name: String,
    },

    #[serde(alias = "leave_room")]
    Leave,

    JoinAsPlayer,

    ClaimGamepad {
        #[serde(default)]
        gamepad_id: u8,
    },

    ReleaseGamepad {
        #[serde(default)]
        server_slot: u8,
    },

    Sdp {
        sdp: String,
        sdp_type: String,
    },

    Ice {
        candidate: String,
        #[serde(default)]
        mid: String,
    },

    SetGuestKeyboard {
        peer_id: String,
        enabled: bool,
    },

    SetGuestMouse {
        peer_id: String,
        enabled: bool,
    },

    SetQuality {
        #[serde(default = "default_bitrate")]
        bitrate: u32,
        #[serde(default = "default_framerate")]
        framerate: u32,
        #[serde(default = "default_width")]
        width: u32,
        #[serde(default = "default_height")]
        height: u32,
    },
}

/// One room member as shown to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSummary {
    pub peer_id: String,
    pub name: String,
    pub slot: u8,
    pub is_host: bool,
    pub is_spectator: bool,
    pub can_use_keyboard: bool,
    pub can_use_mouse: bool,
    pub gamepad_count: usize,
}

impl From<&PlayerInfo> for PlayerSummary {
    fn from(player: &PlayerInfo) -> Self {
        Self {
            peer_id: player.peer_id.clone(),
            name: player.name.clone(),
            slot: player.slot,
            is_host: player.is_host,
            is_spectator: player.is_spectator,
            can_use_keyboard: player.can_use_keyboard,
            can_use_mouse: player.can_use_mouse,
            gamepad_count: player.gamepad_slots.len(),
        }
    }
}

/// Reply payload shared by `room_created` and `room_joined`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRoom {
    pub room_code: String,
    pub peer_id: String,
    pub player_slot: u8,
    pub is_host: bool,
    pub is_spectator: bool,
    pub keyboard_enabled: bool,
    pub mouse_enabled: bool,
    pub players: Vec<PlayerSummary>,
}

/// Server to browser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    RoomCreated(JoinedRoom),
    RoomJoined(JoinedRoom),

    PromotedToPlayer {
        player_slot: u8,
        keyboard_enabled: bool,
        mouse_enabled: bool,
    },

    RoomUpdated {
        players: Vec<PlayerSummary>,
    },

    PlayerJoined {
        player: PlayerSummary,
    },

    PlayerLeft {
        peer_id: String,
        slot: u8,
    },

    LeftRoom,

    RoomClosed {
        reason: String,
    },

    GamepadClaimed {
        gamepad_id: u8,
        server_slot: u8,
    },

    GamepadReleased {
        server_slot: u8,
    },

    Sdp {
        sdp: String,
        sdp_type: String,
    },

    Ice {
        candidate: String,
        mid: String,
    },

    PermissionChanged {
        #[serde(skip_serializing_if = "Option::is_none")]
        keyboard_enabled: Option<bool>,
        #[serde(skip_serializing_if = "Option::is_none")]
        mouse_enabled: Option<bool>,
    },

    StreamReady,

    QualityUpdated {
        success: bool,
        bitrate: u32,
        framerate: u32,
        width: u32,
        height: u32,
        note: String,
    },

    Error {
        code: String,
        message: String,
    },
}

impl ServerMessage {
    /// Serialize for the wire.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_parses() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"join","player_name":"Alice"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                player_name: "Alice".to_string()
            }
        );
    }

    #[test]
    fn test_legacy_aliases_parse_as_join() {
        for raw in [
            r#"{"type":"create_room","player_name":"Alice"}"#,
            r#"{"type":"join_room","room_code":"ABCDEF","player_name":"Alice"}"#,
        ] {
            let msg: ClientMessage = serde_json::from_str(raw).unwrap();
            assert!(matches!(msg, ClientMessage::Join { .. }), "failed: {raw}");
        }

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"leave_room"}"#).unwrap();
        assert_eq!(msg, ClientMessage::Leave);
    }

    #[test]
    fn test_join_defaults_player_name() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Join {
                player_name: "Player".to_string()
            }
        );
    }

    #[test]
    fn test_set_quality_defaults() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"set_quality","bitrate":20000}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SetQuality {
                bitrate: 20_000,
                framerate: 60,
                width: 1920,
                height: 1080
            }
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"dance"}"#).is_err());
    }

    #[test]
    fn test_server_message_wire_shape() {
        let json = ServerMessage::RoomClosed {
            reason: "host_left".to_string(),
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "room_closed");
        assert_eq!(value["reason"], "host_left");

        let json = ServerMessage::Error {
            code: "room_full".to_string(),
            message: "No player slots available".to_string(),
        }
        .to_json()
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "error");
        assert_eq!(value["code"], "room_full");
    }

    #[test]
    fn test_joined_room_flattens_into_tagged_object() {
        let msg = ServerMessage::RoomCreated(JoinedRoom {
            room_code: "STREAM".to_string(),
            peer_id: "peer_1".to_string(),
            player_slot: 1,
            is_host: true,
            is_spectator: false,
            keyboard_enabled: true,
            mouse_enabled: true,
            players: vec![],
        });
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "room_created");
        assert_eq!(value["room_code"], "STREAM");
        assert_eq!(value["player_slot"], 1);
        assert_eq!(value["is_host"], true);
    }

    #[test]
    fn test_permission_changed_omits_absent_side() {
        let msg = ServerMessage::PermissionChanged {
            keyboard_enabled: Some(false),
            mouse_enabled: None,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["keyboard_enabled"], false);
        assert!(value.get("mouse_enabled").is_none());
    }
}

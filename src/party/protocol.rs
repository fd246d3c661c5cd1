use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::room::User;

/// Events a browser client sends over its WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        username: Option<String>,
    },

    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_code: String,
        #[serde(default)]
        username: Option<String>,
    },

    RequestPeerList,

    #[serde(rename_all = "camelCase")]
    WebrtcOffer {
        target_id: String,
        #[serde(default)]
        offer: Value,
    },

    #[serde(rename_all = "camelCase")]
    WebrtcAnswer {
        target_id: String,
        #[serde(default)]
        answer: Value,
    },

    #[serde(rename_all = "camelCase")]
    IceCandidate {
        target_id: String,
        #[serde(default)]
        candidate: Value,
    },

    #[serde(rename_all = "camelCase")]
    ShareSubtitle {
        #[serde(default)]
        subtitle_data: Value,
        #[serde(default)]
        subtitle_name: Option<String>,
    },

    SubtitleText {
        #[serde(default)]
        text: String,
    },

    ClientReady,

    #[serde(rename_all = "camelCase")]
    Play { current_time: f64 },

    #[serde(rename_all = "camelCase")]
    Pause { current_time: f64 },

    #[serde(rename_all = "camelCase")]
    Seek { current_time: f64 },

    #[serde(rename_all = "camelCase")]
    HostTimeUpdate { current_time: f64 },

    Skip {
        #[serde(default)]
        offset: Value,
    },
}

/// Events the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    Connected { connection_id: String },

    #[serde(rename_all = "camelCase")]
    RoomCreated { room_code: String, users: Vec<User> },

    #[serde(rename_all = "camelCase")]
    RoomJoined {
        room_code: String,
        subtitle_data: Option<Value>,
        subtitle_name: Option<String>,
        users: Vec<User>,
        is_playing: bool,
        current_time: f64,
    },

    UserListUpdate { users: Vec<User> },

    #[serde(rename_all = "camelCase")]
    PeerJoined { peer_id: String, username: String },

    #[serde(rename_all = "camelCase")]
    WebrtcOffer { sender_id: String, offer: Value },

    #[serde(rename_all = "camelCase")]
    WebrtcAnswer { sender_id: String, answer: Value },

    #[serde(rename_all = "camelCase")]
    IceCandidate { sender_id: String, candidate: Value },

    #[serde(rename_all = "camelCase")]
    SubtitleReceived {
        subtitle_data: Value,
        subtitle_name: Option<String>,
    },

    SubtitleText { text: String },

    #[serde(rename_all = "camelCase")]
    ReadyStatus { all_ready: bool },

    #[serde(rename_all = "camelCase")]
    SyncPlay { current_time: f64, server_timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    SyncPause { current_time: f64, server_timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    SyncSeek { current_time: f64, server_timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    TimeCheck { current_time: f64, server_timestamp: u64 },

    SkipRequest { offset: Value, from: String },

    #[serde(rename_all = "camelCase")]
    PeerDisconnected { peer_id: String },

    RoomClosed { message: String },

    Error { message: String },
}

impl ServerMessage {
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_join_room() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "join_room",
            "roomCode": "ab12cd",
            "username": "Bob"
        }))
        .unwrap();

        match msg {
            ClientMessage::JoinRoom { room_code, username } => {
                assert_eq!(room_code, "ab12cd");
                assert_eq!(username.as_deref(), Some("Bob"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_decode_unit_variants_without_payload() {
        let ready: ClientMessage = serde_json::from_str(r#"{"type":"client_ready"}"#).unwrap();
        assert!(matches!(ready, ClientMessage::ClientReady));

        let peers: ClientMessage =
            serde_json::from_str(r#"{"type":"request_peer_list"}"#).unwrap();
        assert!(matches!(peers, ClientMessage::RequestPeerList));
    }

    #[test]
    fn test_decode_create_room_without_username() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"create_room"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::CreateRoom { username: None }));
    }

    #[test]
    fn test_decode_host_time_update() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"host_time_update","currentTime":12.5}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::HostTimeUpdate { current_time } if current_time == 12.5
        ));
    }

    #[test]
    fn test_decode_skip_keeps_offset_as_sent() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"skip","offset":"-10"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Skip { offset } if offset == json!("-10")));

        let bare: ClientMessage = serde_json::from_str(r#"{"type":"skip"}"#).unwrap();
        assert!(matches!(bare, ClientMessage::Skip { offset } if offset.is_null()));
    }

    #[test]
    fn test_unknown_event_is_rejected() {
        let result = serde_json::from_str::<ClientMessage>(r#"{"type":"kick","id":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_sync_seek_field_names() {
        let value = serde_json::to_value(ServerMessage::SyncSeek {
            current_time: 42.0,
            server_timestamp: 1_700_000_000_000,
        })
        .unwrap();

        assert_eq!(
            value,
            json!({
                "type": "sync_seek",
                "currentTime": 42.0,
                "serverTimestamp": 1_700_000_000_000u64
            })
        );
    }

    #[test]
    fn test_encode_room_joined_without_subtitle() {
        let value = serde_json::to_value(ServerMessage::RoomJoined {
            room_code: "ABC123".into(),
            subtitle_data: None,
            subtitle_name: None,
            users: vec![User::host("c1", "Alice")],
            is_playing: false,
            current_time: 0.0,
        })
        .unwrap();

        assert_eq!(value["type"], "room_joined");
        assert_eq!(value["roomCode"], "ABC123");
        assert!(value["subtitleData"].is_null());
        assert_eq!(value["isPlaying"], false);
        assert_eq!(value["users"][0]["isHost"], true);
        assert_eq!(value["users"][0]["isReady"], false);
    }

    #[test]
    fn test_encode_relayed_offer_keeps_payload() {
        let offer = json!({"type": "offer", "sdp": "v=0\r\n"});
        let value = serde_json::to_value(ServerMessage::WebrtcOffer {
            sender_id: "host".into(),
            offer: offer.clone(),
        })
        .unwrap();

        assert_eq!(value["type"], "webrtc_offer");
        assert_eq!(value["senderId"], "host");
        assert_eq!(value["offer"], offer);
    }
}

//! JSON frames exchanged over the game socket.
//!
//! Every frame is an object with an `event` field. Client frames may carry an
//! `ack` id; the server answers those with an `ack` frame echoing the id.

use crate::registry::{Color, RoomId};
use gambit_engine::rules::GameStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// An inbound frame: the event plus the optional acknowledgement id.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientFrame {
    pub ack: Option<u64>,
    pub event: ClientEvent,
}

impl ClientFrame {
    pub fn new(event: ClientEvent) -> Self {
        Self { ack: None, event }
    }

    pub fn with_ack(ack: u64, event: ClientEvent) -> Self {
        Self {
            ack: Some(ack),
            event,
        }
    }

    pub fn parse(text: &str) -> Result<Self, MalformedFrame> {
        let value: Value = serde_json::from_str(text).map_err(|source| MalformedFrame {
            ack: None,
            event: None,
            source,
        })?;
        let ack = value.get("ack").and_then(Value::as_u64);
        let event = ClientEvent::deserialize(&value).map_err(|source| MalformedFrame {
            ack,
            event: value.get("event").and_then(Value::as_str).map(str::to_string),
            source,
        })?;
        Ok(Self { ack, event })
    }
}

/// A frame that could not be decoded. Whatever could be read of it is kept
/// so the client's acknowledgement callback can still be answered.
#[derive(Debug, Error)]
#[error("malformed frame: {source}")]
pub struct MalformedFrame {
    pub ack: Option<u64>,
    pub event: Option<String>,
    #[source]
    pub source: serde_json::Error,
}

impl MalformedFrame {
    /// The failed ack owed to the client, if the frame carried an id.
    pub fn rejection(&self) -> Option<ServerEvent> {
        let ack = self.ack?;
        Some(match self.event.as_deref() {
            Some("joinRoom") => ServerEvent::join_ack(ack, None),
            _ => ServerEvent::ack(ack, false),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom {
        #[serde(rename = "roomId", default)]
        room_id: Option<RoomId>,
    },
    PlayerMakeMove {
        from: String,
        to: String,
    },
    PlayerUndo,
    SetDifficulty {
        level: i64,
    },
    #[serde(rename = "setAIModel")]
    SetAiModel {
        name: String,
    },
    SetNewGame,
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom { .. } => "joinRoom",
            ClientEvent::PlayerMakeMove { .. } => "playerMakeMove",
            ClientEvent::PlayerUndo => "playerUndo",
            ClientEvent::SetDifficulty { .. } => "setDifficulty",
            ClientEvent::SetAiModel { .. } => "setAIModel",
            ClientEvent::SetNewGame => "setNewGame",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum ServerEvent {
    Ack {
        ack: u64,
        success: bool,
        #[serde(flatten)]
        join: Option<JoinOutcome>,
    },
    OpponentMakeMove {
        from: String,
        to: String,
    },
    SetNewGame,
    OpponentDisconnected,
    GameOver {
        status: GameStatus,
    },
    MoveRejected {
        from: String,
        to: String,
        reason: RejectReason,
    },
}

/// Room and seat reported in a `joinRoom` acknowledgement. Both are `null`
/// when the join failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JoinOutcome {
    #[serde(rename = "roomId")]
    pub room_id: Option<RoomId>,
    pub color: Option<Color>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    EngineNotReady,
    EngineBusy,
    IllegalMove,
}

impl ServerEvent {
    pub fn ack(ack: u64, success: bool) -> Self {
        ServerEvent::Ack {
            ack,
            success,
            join: None,
        }
    }

    pub fn join_ack(ack: u64, seat: Option<(RoomId, Color)>) -> Self {
        let success = seat.is_some();
        let (room_id, color) = match seat {
            Some((room, color)) => (Some(room), Some(color)),
            None => (None, None),
        };
        ServerEvent::Ack {
            ack,
            success,
            join: Some(JoinOutcome { room_id, color }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Ack { .. } => "ack",
            ServerEvent::OpponentMakeMove { .. } => "opponentMakeMove",
            ServerEvent::SetNewGame => "setNewGame",
            ServerEvent::OpponentDisconnected => "opponentDisconnected",
            ServerEvent::GameOver { .. } => "gameOver",
            ServerEvent::MoveRejected { .. } => "moveRejected",
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_join_with_and_without_room() {
        let frame = ClientFrame::parse(r#"{"event":"joinRoom","ack":1}"#).expect("parse");
        assert_eq!(frame.ack, Some(1));
        assert_eq!(frame.event, ClientEvent::JoinRoom { room_id: None });

        let frame = ClientFrame::parse(r#"{"event":"joinRoom","roomId":"abc"}"#).expect("parse");
        assert_eq!(frame.ack, None);
        assert_eq!(
            frame.event,
            ClientEvent::JoinRoom {
                room_id: Some("abc".into())
            }
        );

        let frame = ClientFrame::parse(r#"{"event":"joinRoom","roomId":null}"#).expect("parse");
        assert_eq!(frame.event, ClientEvent::JoinRoom { room_id: None });
    }

    #[test]
    fn parses_gameplay_events() {
        let frame =
            ClientFrame::parse(r#"{"event":"playerMakeMove","from":"e2","to":"e4"}"#).expect("move");
        assert_eq!(
            frame.event,
            ClientEvent::PlayerMakeMove {
                from: "e2".into(),
                to: "e4".into()
            }
        );

        let frame = ClientFrame::parse(r#"{"event":"setAIModel","ack":7,"name":"minimax"}"#)
            .expect("model");
        assert_eq!(frame.event.name(), "setAIModel");

        let frame = ClientFrame::parse(r#"{"event":"setDifficulty","level":3,"ack":2}"#)
            .expect("difficulty");
        assert_eq!(frame.event, ClientEvent::SetDifficulty { level: 3 });

        let frame = ClientFrame::parse(r#"{"event":"playerUndo","ack":4}"#).expect("undo");
        assert_eq!(frame, ClientFrame::with_ack(4, ClientEvent::PlayerUndo));
    }

    #[test]
    fn rejects_unknown_or_incomplete_frames() {
        assert!(ClientFrame::parse(r#"{"event":"castleQueenside"}"#).is_err());
        assert!(ClientFrame::parse(r#"{"event":"playerMakeMove","from":"e2"}"#).is_err());
        assert!(ClientFrame::parse("not json").is_err());
    }

    #[test]
    fn bad_payload_with_ack_id_is_answered() {
        let err = ClientFrame::parse(r#"{"event":"setDifficulty","level":"x","ack":6}"#)
            .expect_err("level must be a number");
        assert_eq!(err.ack, Some(6));
        assert_eq!(err.rejection(), Some(ServerEvent::ack(6, false)));

        let err = ClientFrame::parse(r#"{"event":"joinRoom","roomId":5,"ack":2}"#)
            .expect_err("room id must be a string");
        assert_eq!(err.rejection(), Some(ServerEvent::join_ack(2, None)));

        let err = ClientFrame::parse(r#"{"event":"playerMakeMove","from":"e2"}"#)
            .expect_err("missing square");
        assert!(err.rejection().is_none());
        assert!(ClientFrame::parse("{").expect_err("not json").rejection().is_none());
    }

    #[test]
    fn join_ack_carries_nulls_on_failure() {
        let value = serde_json::to_value(ServerEvent::join_ack(3, None)).expect("serialize");
        assert_eq!(
            value,
            json!({"event": "ack", "ack": 3, "success": false, "roomId": null, "color": null})
        );

        let value = serde_json::to_value(ServerEvent::join_ack(
            4,
            Some(("room-1".to_string(), Color::Black)),
        ))
        .expect("serialize");
        assert_eq!(
            value,
            json!({"event": "ack", "ack": 4, "success": true, "roomId": "room-1", "color": "black"})
        );
    }

    #[test]
    fn plain_ack_has_no_join_fields() {
        let value = serde_json::to_value(ServerEvent::ack(9, true)).expect("serialize");
        assert_eq!(value, json!({"event": "ack", "ack": 9, "success": true}));
    }

    #[test]
    fn server_events_use_wire_names() {
        let value = serde_json::to_value(ServerEvent::GameOver {
            status: GameStatus::BlackWin,
        })
        .expect("serialize");
        assert_eq!(value, json!({"event": "gameOver", "status": "blackWin"}));

        let value = serde_json::to_value(ServerEvent::MoveRejected {
            from: "e2".into(),
            to: "e4".into(),
            reason: RejectReason::EngineNotReady,
        })
        .expect("serialize");
        assert_eq!(value["reason"], "engineNotReady");

        assert_eq!(
            ServerEvent::SetNewGame.to_json().expect("json"),
            r#"{"event":"setNewGame"}"#
        );
    }
}

//! Wire frames exchanged over an authenticated connection.
//!
//! Every frame after the handshake is a JSON object `{"message_type": ..., "data": {...}}`.
//! The handshake itself is the bare session id as a text frame.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client → server frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientFrame {
    SendChatMessage(SendChatMessage),
    /// Reserved for read receipts; accepted and ignored
    MarkAsRead,
    LogOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendChatMessage {
    pub message_content: String,
    pub target_account_id: Uuid,
}

/// Why an inbound frame could not be decoded.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame is not a {{message_type, data}} object")]
    Malformed,

    #[error("unknown message_type '{0}'")]
    UnknownType(String),

    #[error("invalid {message_type} payload: {detail}")]
    InvalidPayload {
        message_type: &'static str,
        detail: String,
    },
}

#[derive(Deserialize)]
struct Envelope {
    message_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

impl ClientFrame {
    /// Decode a text frame in one step: envelope first, then the payload for its tag.
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let envelope: Envelope = serde_json::from_str(text).map_err(|_| FrameError::Malformed)?;

        match envelope.message_type.as_str() {
            "SEND_CHAT_MESSAGE" => serde_json::from_value(envelope.data)
                .map(ClientFrame::SendChatMessage)
                .map_err(|e| FrameError::InvalidPayload {
                    message_type: "SEND_CHAT_MESSAGE",
                    detail: e.to_string(),
                }),
            "MARK_AS_READ" => Ok(ClientFrame::MarkAsRead),
            "LOG_OUT" => Ok(ClientFrame::LogOut),
            _ => Err(FrameError::UnknownType(envelope.message_type)),
        }
    }
}

/// Server → client frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "message_type",
    content = "data",
    rename_all = "SCREAMING_SNAKE_CASE"
)]
pub enum ServerFrame {
    /// Handshake succeeded
    Accepted {},

    SendChatMessage {
        message_content: String,
        sender_account_id: Uuid,
    },

    /// The target of a chat message had no live connection; nothing was delivered
    RecipientOffline { target_account_id: Uuid },

    /// An inbound frame was dropped; the connection stays open
    Rejected { reason: String },
}

impl ServerFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parse the handshake frame: the session id, surrounding whitespace ignored.
pub fn parse_handshake(text: &str) -> Option<Uuid> {
    text.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_send_chat_message() {
        let target = Uuid::now_v7();
        let text = json!({
            "message_type": "SEND_CHAT_MESSAGE",
            "data": { "message_content": "hi", "target_account_id": target },
        })
        .to_string();

        assert_eq!(
            ClientFrame::decode(&text),
            Ok(ClientFrame::SendChatMessage(SendChatMessage {
                message_content: "hi".into(),
                target_account_id: target,
            }))
        );
    }

    #[test]
    fn test_decode_payloadless_frames() {
        assert_eq!(
            ClientFrame::decode(r#"{"message_type":"LOG_OUT","data":{}}"#),
            Ok(ClientFrame::LogOut)
        );
        assert_eq!(
            ClientFrame::decode(r#"{"message_type":"MARK_AS_READ"}"#),
            Ok(ClientFrame::MarkAsRead)
        );
    }

    #[test]
    fn test_decode_rejects_bad_frames() {
        assert_eq!(ClientFrame::decode("hello"), Err(FrameError::Malformed));
        assert_eq!(ClientFrame::decode(r#"{"data":{}}"#), Err(FrameError::Malformed));
        assert_eq!(
            ClientFrame::decode(r#"{"message_type":"SHOUT","data":{}}"#),
            Err(FrameError::UnknownType("SHOUT".into()))
        );
        assert!(matches!(
            ClientFrame::decode(r#"{"message_type":"SEND_CHAT_MESSAGE","data":{"message_content":"hi"}}"#),
            Err(FrameError::InvalidPayload { message_type: "SEND_CHAT_MESSAGE", .. })
        ));
    }

    #[test]
    fn test_server_frame_shapes() {
        let accepted: serde_json::Value =
            serde_json::from_str(&ServerFrame::Accepted {}.encode().unwrap()).unwrap();
        assert_eq!(accepted, json!({ "message_type": "ACCEPTED", "data": {} }));

        let sender = Uuid::now_v7();
        let chat: serde_json::Value = serde_json::from_str(
            &ServerFrame::SendChatMessage {
                message_content: "hi".into(),
                sender_account_id: sender,
            }
            .encode()
            .unwrap(),
        )
        .unwrap();
        assert_eq!(
            chat,
            json!({
                "message_type": "SEND_CHAT_MESSAGE",
                "data": { "message_content": "hi", "sender_account_id": sender },
            })
        );
    }

    #[test]
    fn test_handshake_is_a_bare_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_handshake(&format!(" {id}\n")), Some(id));
        assert_eq!(parse_handshake(&format!("{{\"session_id\":\"{id}\"}}")), None);
        assert_eq!(parse_handshake(""), None);
    }
}

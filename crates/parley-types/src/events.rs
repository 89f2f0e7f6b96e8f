use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Message;

/// Frame sent FROM client TO server over the WebSocket.
///
/// Both fields are optional on the wire so a frame with a missing field is
/// reported as a validation failure instead of a parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub receiver_id: Option<i64>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A validated inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    pub receiver_id: i64,
    pub content: String,
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

impl InboundFrame {
    /// Parse and validate a raw text frame.
    pub fn parse(text: &str) -> Result<SendRequest, FrameError> {
        serde_json::from_str::<InboundFrame>(text)?.validate()
    }

    pub fn validate(self) -> Result<SendRequest, FrameError> {
        let receiver_id = self.receiver_id.ok_or(FrameError::MissingField("receiver_id"))?;
        let content = self.content.ok_or(FrameError::MissingField("content"))?;
        Ok(SendRequest {
            receiver_id,
            content,
        })
    }
}

/// The payload delivered to the receiver and echoed to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<&Message> for DeliveryPayload {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content.clone(),
            timestamp: message.timestamp,
        }
    }
}

/// Wire-level classification of a rejected inbound frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorFrame {
    pub kind: ErrorKind,
    pub message: String,
}

/// Frame sent FROM server TO client over the WebSocket.
///
/// A delivery serializes as the bare payload object; a failure is wrapped
/// as `{"error": {...}}` so clients can tell the two apart by shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundFrame {
    Error { error: ErrorFrame },
    Message(DeliveryPayload),
}

impl OutboundFrame {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorFrame {
                kind,
                message: message.into(),
            },
        }
    }
}

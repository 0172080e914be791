/*
[INPUT]:  Outbound control requests and raw inbound JSON text frames
[OUTPUT]: Serialized request frames and parsed inbound envelopes
[POS]:    WebSocket layer - wire format for control and data frames
[UPDATE]: When adding operations or changing envelope fields
*/

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthArgs;
use crate::error::Result;
use crate::types::FrameType;

/// Operation discriminator shared by requests and acknowledgments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Ping,
    Pong,
    Auth,
    Subscribe,
    Unsubscribe,
}

/// Outbound request frame: `{"op": .., "req_id": .., "args": [..]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFrame {
    pub op: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl RequestFrame {
    pub fn ping(req_id: &str) -> Self {
        Self {
            op: Operation::Ping,
            req_id: Some(req_id.to_string()),
            args: Vec::new(),
        }
    }

    pub fn auth(args: &AuthArgs) -> Self {
        Self {
            op: Operation::Auth,
            req_id: None,
            args: vec![
                args.api_key.clone(),
                args.expires.clone(),
                args.signature.clone(),
            ],
        }
    }

    pub fn subscribe(req_id: &str, topics: Vec<String>) -> Self {
        Self {
            op: Operation::Subscribe,
            req_id: Some(req_id.to_string()),
            args: topics,
        }
    }

    pub fn unsubscribe(req_id: &str, topics: Vec<String>) -> Self {
        Self {
            op: Operation::Unsubscribe,
            req_id: Some(req_id.to_string()),
            args: topics,
        }
    }

    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Minimal envelope shared by every inbound frame
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundFrame {
    #[serde(default)]
    pub op: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub ret_msg: Option<String>,
    #[serde(default)]
    pub req_id: Option<String>,
    #[serde(default)]
    pub conn_id: Option<String>,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(rename = "type", default)]
    pub frame_type: Option<String>,
    #[serde(default, alias = "creationTime")]
    pub ts: Option<i64>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Pong,
    AuthAck,
    SubscribeAck,
    UnsubscribeAck,
    Data,
    Unknown,
}

impl InboundFrame {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn kind(&self) -> FrameKind {
        match self.op.as_deref() {
            // public streams echo `op: ping` with `ret_msg: pong`; private ones reply `op: pong`
            Some("pong" | "ping") => FrameKind::Pong,
            Some("auth") => FrameKind::AuthAck,
            Some("subscribe") => FrameKind::SubscribeAck,
            Some("unsubscribe") => FrameKind::UnsubscribeAck,
            _ if self.topic.is_some() => FrameKind::Data,
            _ => FrameKind::Unknown,
        }
    }

    /// Control frames without a `success` field (private pongs) count as successful
    pub fn is_success(&self) -> bool {
        self.success.unwrap_or(true)
    }

    /// `req_id` with empty strings treated as absent
    pub fn request_id(&self) -> Option<&str> {
        self.req_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn payload_type(&self) -> FrameType {
        match self.frame_type.as_deref() {
            Some("delta") => FrameType::Delta,
            _ => FrameType::Snapshot,
        }
    }
}

/// Data frame handed to topic handlers
#[derive(Debug, Clone, PartialEq)]
pub struct TopicMessage {
    pub topic: String,
    pub frame_type: FrameType,
    pub ts: Option<i64>,
    pub data: Value,
}

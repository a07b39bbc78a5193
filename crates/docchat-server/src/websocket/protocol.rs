//! JSON frames exchanged over the chat channel.

use docchat_core::Exchange;
use serde::{Deserialize, Serialize};

/// Inbound frame `type` that triggers the query pipeline.
pub const QUERY_KIND: &str = "query";

/// A decoded client → gateway frame.
///
/// Only `type` is required; the document and user carried in the frame are
/// informational, the session's own identity is authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundFrame {
    /// Message kind, e.g. `"query"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Question text.
    #[serde(default)]
    pub content: String,
    /// Document the client believes it is talking to.
    #[serde(default)]
    pub document_id: Option<String>,
    /// User the client believes it is.
    #[serde(default)]
    pub user_id: Option<String>,
}

impl InboundFrame {
    /// Decode one text frame.
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Whether this frame asks a question.
    pub fn is_query(&self) -> bool {
        self.kind == QUERY_KIND
    }
}

/// Outbound frame discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutboundKind {
    /// A generated answer.
    Response,
    /// A pipeline failure surfaced to the client.
    Error,
}

/// A gateway → client frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// `response` or `error`.
    #[serde(rename = "type")]
    pub kind: OutboundKind,
    /// Answer text or error message.
    pub content: String,
    /// Exchange ID for responses, a fresh ID for errors.
    pub id: String,
    /// RFC 3339 creation time.
    pub timestamp: String,
}

impl OutboundFrame {
    /// A `response` frame carrying a persisted assistant exchange.
    pub fn response(exchange: &Exchange) -> Self {
        Self {
            kind: OutboundKind::Response,
            content: exchange.content.clone(),
            id: exchange.id.to_string(),
            timestamp: exchange.timestamp_rfc3339(),
        }
    }

    /// An `error` frame.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: OutboundKind::Error,
            content: message.into(),
            id: uuid::Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }

    /// Serialize to the wire representation.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

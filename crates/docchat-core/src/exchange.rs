//! Persisted chat exchanges.
//!
//! An [`Exchange`] is one message in the conversation about a document:
//! either the user's question or the assistant's answer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{DocumentId, ExchangeId, UserId};

/// Who authored an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The question asked by the user.
    User,
    /// The generated answer. Older clients call this role `bot`.
    #[serde(alias = "bot")]
    Assistant,
}

impl Role {
    /// Storage/wire representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role string that is neither `user`, `assistant` nor `bot`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown exchange role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" | "bot" => Ok(Self::Assistant),
            other => Err(UnknownRole(other.to_owned())),
        }
    }
}

/// One persisted chat record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Unique exchange ID.
    pub id: ExchangeId,
    /// Document the conversation is about.
    pub document_id: DocumentId,
    /// User taking part in the conversation.
    pub user_id: UserId,
    /// Author of this message.
    pub role: Role,
    /// Message text.
    pub content: String,
    /// When the exchange was created.
    pub timestamp: DateTime<Utc>,
}

impl Exchange {
    /// Create a new exchange stamped with a fresh ID and the current time.
    #[must_use]
    pub fn new(
        document_id: DocumentId,
        user_id: UserId,
        role: Role,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: ExchangeId::new(),
            document_id,
            user_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    /// Timestamp rendered as RFC 3339 with second precision, as sent to clients.
    #[must_use]
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

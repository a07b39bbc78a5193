//! Branded ID newtypes.
//!
//! Documents, users, live connections and persisted exchanges each get their
//! own ID type so a connection ID can never be passed where a document ID is
//! expected. Fresh IDs are UUID v7 (time-ordered).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Identifier of an uploaded document.
    DocumentId
}

branded_id! {
    /// Identifier of a user (document owner).
    UserId
}

branded_id! {
    /// Identifier of one live WebSocket channel.
    ConnectionId
}

branded_id! {
    /// Identifier of a persisted chat exchange.
    ExchangeId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_id_new_is_uuid_v7() {
        let id = ConnectionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn client_supplied_ids_are_kept_verbatim() {
        let doc = DocumentId::from("d1");
        let user = UserId::from("u1".to_owned());
        assert_eq!(doc.as_str(), "d1");
        assert_eq!(&*user, "u1");
    }

    #[test]
    fn display_and_into_string() {
        let id = ExchangeId::from("x-1");
        assert_eq!(format!("{id}"), "x-1");
        let s: String = id.into();
        assert_eq!(s, "x-1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = DocumentId::from("doc-9");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"doc-9\"");
        let back: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}

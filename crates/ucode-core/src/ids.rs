//! Branded ID newtypes for type safety.
//!
//! Every entity the client tracks has a distinct ID type implemented as a
//! newtype wrapper around `String`, so a chat message ID can never be passed
//! where the backend session correlation ID is expected.
//!
//! Client-generated IDs are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`].
//! [`SessionId`] is the exception: it is always assigned by the backend.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
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

macro_rules! generated_id {
    ($name:ident) => {
        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

branded_id! {
    /// Backend-assigned session correlation ID (learned from a `status` frame).
    SessionId
}

branded_id! {
    /// Unique identifier for a chat transcript entry.
    MessageId
}

branded_id! {
    /// Unique identifier for a terminal log entry.
    LogEntryId
}

generated_id!(MessageId);
generated_id!(LogEntryId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = MessageId::new();
        let b = MessageId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_are_uuid_v7() {
        let id = LogEntryId::new();
        let parsed = Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn session_id_round_trips_through_string() {
        let id = SessionId::from("s1");
        assert_eq!(id.as_str(), "s1");
        assert_eq!(String::from(id.clone()), "s1");
        assert_eq!(id.to_string(), "s1");
    }

    #[test]
    fn serde_is_transparent() {
        let id = SessionId::from("abc");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc\"");
        let back: SessionId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn deref_to_str() {
        let id = SessionId::from("deref-me");
        assert!(id.starts_with("deref"));
    }
}

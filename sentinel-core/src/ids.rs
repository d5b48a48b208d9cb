// sentinel-core/src/ids.rs
// ============================================================================
// Module: Identifiers
// Description: Newtype wrappers for the identifiers used across the suite.
// Purpose: Prevent mixing agent labels, session labels, and opaque ids.
// Dependencies: serde::{Deserialize, Serialize}, uuid::Uuid
// ============================================================================

//! ## Overview
//! Plain `String` everywhere invites mixing an agent label with a session
//! label. These newtypes close that hole cheaply; they deref to `&str` for
//! ergonomic use at call sites.

use std::fmt;
use std::ops::Deref;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Generates a `String`-backed, transparent identifier newtype.
macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Creates a new identifier from anything string-like.
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrows the identifier as a plain string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(AgentId, "Canonicalized agent label (see [`crate::event::canonicalize_agent`]).");
string_id!(SessionId, "Session label as reported by the transport layer.");
string_id!(ChannelId, "Channel label used by context/scope conditions.");
string_id!(PolicyId, "Identifier of a named policy rule set.");
string_id!(RuleId, "Identifier of a single rule within a policy.");
string_id!(ChainId, "Deterministic conversation-chain identifier (first 16 hex chars of a SHA-256 digest).");

/// Generates a UUID-backed identifier newtype.
macro_rules! uuid_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            #[must_use]
            pub fn new_v4() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(FindingId, "Identifier of a detector [`crate::finding::Finding`].");
uuid_id!(AuditRecordId, "Identifier of a single [`AuditRecord`] audit-journal entry.");
uuid_id!(FactId, "Identifier of a stored [`Fact`] triple.");

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, reason = "unit tests favor unwrap/expect for clarity")]
    use super::*;

    #[test]
    fn string_id_derefs_to_str() {
        let agent = AgentId::from("atlas");
        assert_eq!(agent.as_str(), "atlas");
        assert_eq!(&*agent, "atlas");
    }

    #[test]
    fn uuid_id_generates_unique_values() {
        assert_ne!(FindingId::new_v4(), FindingId::new_v4());
    }
}

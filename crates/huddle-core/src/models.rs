//! Domain models shared between the store and the chat server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{GroupId, MessageId, UserId};

/// A registered user as seen by the chat core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable integer identity.
    pub id: UserId,
    /// Display name shown as the author of chat messages.
    pub username: String,
}

/// Outcome of resolving a connection's credentials.
///
/// Every failure mode (missing token, bad signature, expired token,
/// deleted user) collapses into [`Identity::Anonymous`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Identity {
    /// The token resolved to an existing user.
    Authenticated(User),
    /// No usable credentials.
    Anonymous,
}

impl Identity {
    /// The resolved user, if any.
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated(user) => Some(user),
            Self::Anonymous => None,
        }
    }

    /// Whether this identity is [`Identity::Anonymous`].
    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

/// A study group (chat room).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    /// Group identity.
    pub id: GroupId,
    /// Display name.
    pub name: String,
    /// Free-text description (may be empty).
    pub description: String,
    /// User who created the group. Always a member.
    pub creator_id: UserId,
    /// Current member identities, ascending.
    pub member_ids: Vec<UserId>,
    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// A persisted chat message. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Message identity; breaks timestamp ties in insertion order.
    pub id: MessageId,
    /// Group the message belongs to.
    pub group_id: GroupId,
    /// Author.
    pub user_id: UserId,
    /// Trimmed, non-empty body.
    pub body: String,
    /// Server clock at persist time.
    pub created_at: DateTime<Utc>,
}

/// One row of group history, shaped like a live frame plus the message id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Message identity.
    pub id: MessageId,
    /// Message body.
    pub message: String,
    /// Author display name.
    pub username: String,
    /// ISO-8601 persistence timestamp.
    pub timestamp: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_accessors() {
        let user = User {
            id: UserId(1),
            username: "A".into(),
        };
        let authed = Identity::Authenticated(user.clone());
        assert_eq!(authed.user(), Some(&user));
        assert!(!authed.is_anonymous());
        assert!(Identity::Anonymous.is_anonymous());
        assert!(Identity::Anonymous.user().is_none());
    }

    #[test]
    fn chat_message_serializes_camel_case() {
        let msg = ChatMessage {
            id: MessageId(3),
            group_id: GroupId(42),
            user_id: UserId(1),
            body: "hi".into(),
            created_at: DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["groupId"], 42);
        assert_eq!(value["userId"], 1);
        assert_eq!(value["body"], "hi");
    }
}

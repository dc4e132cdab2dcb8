//! Collaborator interfaces consumed by the chat core.
//!
//! The chat server never touches SQL directly. It sees users through
//! [`UserDirectory`] and groups/messages through [`MembershipStore`]; the
//! `huddle-store` crate provides the `SQLite` implementation.

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::ids::{GroupId, UserId};
use crate::models::{ChatMessage, HistoryEntry, User};

/// Read-only view of registered users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Look up a user by id. `Ok(None)` when the user does not exist.
    async fn find_user(&self, user_id: UserId) -> Result<Option<User>, StoreError>;
}

/// Group lookup and the single message write path.
#[async_trait]
pub trait MembershipStore: Send + Sync {
    /// Whether the group currently exists.
    async fn group_exists(&self, group_id: GroupId) -> Result<bool, StoreError>;

    /// Atomically persist a message, stamping it with the server clock.
    ///
    /// Fails with [`StoreError::GroupNotFound`] if the group does not exist.
    async fn create_message(
        &self,
        group_id: GroupId,
        user_id: UserId,
        body: &str,
    ) -> Result<ChatMessage, StoreError>;

    /// The most recent `limit` messages of a group, oldest first.
    ///
    /// Ordered by creation timestamp with ties broken by insertion order.
    async fn message_history(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError>;
}

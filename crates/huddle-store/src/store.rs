//! `SqliteStore`: the pooled, async facade the server talks to.
//!
//! Each call checks a connection out of the pool on a blocking worker and
//! runs one repository operation. Single writes are atomic at the SQL level;
//! nothing here spans more than one logical operation.

use std::path::Path;

use async_trait::async_trait;
use huddle_core::{
    ChatMessage, Group, GroupId, HistoryEntry, MembershipStore, StoreError, User, UserDirectory,
    UserId,
};
use huddle_settings::DatabaseSettings;
use metrics::counter;
use rusqlite::Connection;

use crate::connection::{ConnectionPool, open_file_pool, open_memory_pool};
use crate::errors::{DbError, Result};
use crate::migrations::run_migrations;
use crate::repositories::group::CreateGroupOptions;
use crate::repositories::{GroupRepo, MessageRepo, UserRepo};

/// `SQLite` implementation of [`UserDirectory`] and [`MembershipStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: ConnectionPool,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("max_size", &self.pool.max_size())
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database described by `settings` and migrate it.
    pub fn open(settings: &DatabaseSettings) -> Result<Self> {
        Self::open_path(&settings.resolved_path(), settings)
    }

    /// Open (or create) a database at an explicit path and migrate it.
    pub fn open_path(path: &Path, settings: &DatabaseSettings) -> Result<Self> {
        Self::from_pool(open_file_pool(path, settings)?)
    }

    /// Open a fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::from_pool(open_memory_pool()?)
    }

    fn from_pool(pool: ConnectionPool) -> Result<Self> {
        {
            let conn = pool.get()?;
            run_migrations(&conn)?;
        }
        Ok(Self { pool })
    }

    /// Run `f` against a pooled connection on the blocking thread pool.
    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }

    /// Register a user.
    pub async fn create_user(&self, username: &str) -> Result<User> {
        let username = username.to_string();
        self.run(move |conn| UserRepo::create(conn, &username)).await
    }

    /// Look up a user by username.
    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>> {
        let username = username.to_string();
        self.run(move |conn| UserRepo::get_by_username(conn, &username))
            .await
    }

    /// Create a group with `creator_id` as its first member.
    pub async fn create_group(
        &self,
        name: &str,
        description: &str,
        creator_id: UserId,
    ) -> Result<Group> {
        let (name, description) = (name.to_string(), description.to_string());
        self.run(move |conn| {
            GroupRepo::create(
                conn,
                &CreateGroupOptions {
                    name: &name,
                    description: &description,
                    creator_id,
                },
            )
        })
        .await
    }

    /// Fetch a group with its members.
    pub async fn group(&self, group_id: GroupId) -> Result<Option<Group>> {
        self.run(move |conn| GroupRepo::get(conn, group_id)).await
    }

    /// All groups, newest first.
    pub async fn list_groups(&self) -> Result<Vec<Group>> {
        self.run(GroupRepo::list).await
    }

    /// Add a member to a group.
    pub async fn join_group(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.run(move |conn| GroupRepo::join(conn, group_id, user_id))
            .await
    }

    /// Remove a member from a group.
    pub async fn leave_group(&self, group_id: GroupId, user_id: UserId) -> Result<()> {
        self.run(move |conn| GroupRepo::leave(conn, group_id, user_id))
            .await
    }

    /// Delete a group with its members and messages.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        self.run(move |conn| GroupRepo::delete(conn, group_id)).await
    }

    /// Number of stored messages in a group.
    pub async fn message_count(&self, group_id: GroupId) -> Result<i64> {
        self.run(move |conn| MessageRepo::count(conn, group_id)).await
    }
}

#[async_trait]
impl UserDirectory for SqliteStore {
    async fn find_user(&self, user_id: UserId) -> std::result::Result<Option<User>, StoreError> {
        Ok(self.run(move |conn| UserRepo::get(conn, user_id)).await?)
    }
}

#[async_trait]
impl MembershipStore for SqliteStore {
    async fn group_exists(&self, group_id: GroupId) -> std::result::Result<bool, StoreError> {
        Ok(self.run(move |conn| GroupRepo::exists(conn, group_id)).await?)
    }

    async fn create_message(
        &self,
        group_id: GroupId,
        user_id: UserId,
        body: &str,
    ) -> std::result::Result<ChatMessage, StoreError> {
        let body = body.to_string();
        let message = self
            .run(move |conn| MessageRepo::create(conn, group_id, user_id, &body))
            .await?;
        counter!("store_messages_created_total").increment(1);
        tracing::debug!(%group_id, %user_id, message_id = %message.id, "message persisted");
        Ok(message)
    }

    async fn message_history(
        &self,
        group_id: GroupId,
        limit: usize,
    ) -> std::result::Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .run(move |conn| MessageRepo::history(conn, group_id, limit))
            .await?)
    }
}

//! Message repository: append-only `chat_messages`.
//!
//! Messages are never updated or deleted individually. Within a group they
//! are totally ordered by `(created_at, id)`.

use huddle_core::{
    ChatMessage, GroupId, HistoryEntry, MessageId, StoreError, UserId, format_timestamp,
};
use rusqlite::{Connection, params};

use crate::errors::{Result, is_constraint};
use crate::repositories::parse_timestamp;

/// Message repository.
pub struct MessageRepo;

impl MessageRepo {
    /// Persist a message in one atomic statement.
    ///
    /// The insert is conditional on the group existing, so a group deleted
    /// concurrently yields [`StoreError::GroupNotFound`] rather than a row.
    pub fn create(
        conn: &Connection,
        group_id: GroupId,
        user_id: UserId,
        body: &str,
    ) -> Result<ChatMessage> {
        let created_at = chrono::Utc::now();
        let stamp = format_timestamp(created_at);
        let inserted = conn.execute(
            "INSERT INTO chat_messages (group_id, user_id, body, created_at)
             SELECT ?1, ?2, ?3, ?4
             WHERE EXISTS(SELECT 1 FROM study_groups WHERE id = ?1)",
            params![group_id.get(), user_id.get(), body, stamp],
        );
        let changed = match inserted {
            Ok(changed) => changed,
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                return Err(StoreError::UserNotFound(user_id).into());
            }
            Err(e) => return Err(e.into()),
        };
        if changed == 0 {
            return Err(StoreError::GroupNotFound(group_id).into());
        }
        Ok(ChatMessage {
            id: MessageId(conn.last_insert_rowid()),
            group_id,
            user_id,
            body: body.to_string(),
            created_at: parse_timestamp(&stamp)?,
        })
    }

    /// The most recent `limit` messages of a group, oldest first, with author names.
    pub fn history(conn: &Connection, group_id: GroupId, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, body, username, created_at FROM (
                 SELECT m.id, m.body, u.username, m.created_at
                 FROM chat_messages m JOIN users u ON u.id = m.user_id
                 WHERE m.group_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC
                 LIMIT ?2
             ) ORDER BY created_at ASC, id ASC",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![group_id.get(), limit], |row| {
                Ok(HistoryEntry {
                    id: MessageId(row.get(0)?),
                    message: row.get(1)?,
                    username: row.get(2)?,
                    timestamp: row.get(3)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of messages in a group.
    pub fn count(conn: &Connection, group_id: GroupId) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM chat_messages WHERE group_id = ?1",
            params![group_id.get()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

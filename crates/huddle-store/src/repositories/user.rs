//! User repository: CRUD for the `users` table.

use huddle_core::{StoreError, User, UserId, format_timestamp};
use rusqlite::{Connection, OptionalExtension, params};

use crate::errors::{Result, is_constraint};

/// User repository.
pub struct UserRepo;

impl UserRepo {
    /// Register a user. Usernames are unique.
    pub fn create(conn: &Connection, username: &str) -> Result<User> {
        let now = format_timestamp(chrono::Utc::now());
        match conn.execute(
            "INSERT INTO users (username, created_at) VALUES (?1, ?2)",
            params![username, now],
        ) {
            Ok(_) => Ok(User {
                id: UserId(conn.last_insert_rowid()),
                username: username.to_string(),
            }),
            Err(e) if is_constraint(&e, rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE) => Err(
                StoreError::Conflict(format!("username {username:?} already exists")).into(),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Get a user by id.
    pub fn get(conn: &Connection, user_id: UserId) -> Result<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1",
                params![user_id.get()],
                |row| {
                    Ok(User {
                        id: UserId(row.get(0)?),
                        username: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Get a user by username.
    pub fn get_by_username(conn: &Connection, username: &str) -> Result<Option<User>> {
        let user = conn
            .query_row(
                "SELECT id, username FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok(User {
                        id: UserId(row.get(0)?),
                        username: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    /// Delete a user. Returns `true` if a row was deleted.
    pub fn delete(conn: &Connection, user_id: UserId) -> Result<bool> {
        let changed = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id.get()])?;
        Ok(changed > 0)
    }
}

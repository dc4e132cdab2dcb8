//! Stateless repositories, one per table family. Every method takes `&Connection`.

pub mod group;
pub mod message;
pub mod user;

pub use group::GroupRepo;
pub use message::MessageRepo;
pub use user::UserRepo;

use chrono::{DateTime, Utc};

use crate::errors::{DbError, Result};

/// Decode a stored RFC 3339 timestamp.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DbError::Corrupt(format!("timestamp {raw:?}: {e}")))
}

#[cfg(test)]
pub(crate) mod testutil {
    use rusqlite::Connection;

    use crate::migrations::run_migrations;

    pub fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
            .unwrap();
        run_migrations(&conn).unwrap();
        conn
    }
}

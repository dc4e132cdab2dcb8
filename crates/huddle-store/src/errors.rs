//! Store-internal errors and their mapping onto [`StoreError`].

use huddle_core::StoreError;
use thiserror::Error;

/// Errors raised inside the `SQLite` layer.
#[derive(Debug, Error)]
pub enum DbError {
    /// `SQLite` reported a failure.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No pooled connection became available.
    #[error("connection pool: {0}")]
    Pool(#[from] r2d2::Error),

    /// The database directory could not be prepared.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking worker panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Task(String),

    /// A stored value could not be decoded.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    /// A domain rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] StoreError),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(e) => e,
            DbError::Pool(e) => StoreError::Unavailable(e.to_string()),
            DbError::Task(e) => StoreError::Unavailable(e),
            DbError::Io(e) => StoreError::Unavailable(e.to_string()),
            DbError::Sqlite(e) => StoreError::Database(e.to_string()),
            DbError::Corrupt(e) => StoreError::Database(e),
        }
    }
}

/// Whether `err` is a `SQLite` constraint violation of the given extended code.
pub(crate) fn is_constraint(err: &rusqlite::Error, extended_code: i32) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation && e.extended_code == extended_code
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::GroupId;

    #[test]
    fn domain_errors_pass_through() {
        let err = DbError::from(StoreError::GroupNotFound(GroupId(3)));
        assert_eq!(StoreError::from(err), StoreError::GroupNotFound(GroupId(3)));
    }

    #[test]
    fn task_failure_is_unavailable() {
        let err = StoreError::from(DbError::Task("cancelled".into()));
        assert_eq!(err, StoreError::Unavailable("cancelled".into()));
    }

    #[test]
    fn sqlite_failure_is_database() {
        let err = StoreError::from(DbError::Sqlite(rusqlite::Error::QueryReturnedNoRows));
        assert!(matches!(err, StoreError::Database(_)));
    }
}

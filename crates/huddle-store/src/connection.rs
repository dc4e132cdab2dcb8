//! Connection pool construction.

use std::path::Path;
use std::time::Duration;

use huddle_settings::DatabaseSettings;
use r2d2_sqlite::SqliteConnectionManager;

use crate::errors::Result;

/// Pool of `SQLite` connections.
pub type ConnectionPool = r2d2::Pool<SqliteConnectionManager>;

fn configure(conn: &rusqlite::Connection, busy_timeout: Duration) -> rusqlite::Result<()> {
    conn.busy_timeout(busy_timeout)?;
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
}

/// Open a file-backed pool, creating parent directories as needed.
pub fn open_file_pool(path: &Path, settings: &DatabaseSettings) -> Result<ConnectionPool> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let busy_timeout = Duration::from_millis(settings.busy_timeout_ms);
    let manager = SqliteConnectionManager::file(path).with_init(move |c| configure(c, busy_timeout));
    let pool = r2d2::Pool::builder()
        .max_size(settings.pool_size)
        .build(manager)?;
    tracing::info!(path = %path.display(), pool_size = settings.pool_size, "sqlite pool opened");
    Ok(pool)
}

/// Open a single-connection in-memory pool.
///
/// One connection only: every `:memory:` connection is a separate database.
pub fn open_memory_pool() -> Result<ConnectionPool> {
    let manager =
        SqliteConnectionManager::memory().with_init(|c| configure(c, Duration::from_secs(5)));
    let pool = r2d2::Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Result;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and ensures the
/// schema exists. Schema creation is idempotent, so concurrent startups are
/// safe.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let conn = pool.get()?;
    if let Err(e) = init_schema(&conn) {
        // Surface but don't crash: an already-initialized database can race
        // table creation with another instance.
        log::warn!("Failed to initialize schema: {}", e);
    }

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is automatically returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Create all tables and indexes if they don't exist yet
///
/// Schema notes:
/// - `videos.id` is AUTOINCREMENT so ids are never reused after a removal.
/// - `purchases` snapshots `title`, `file_id` and `price_paid` at purchase
///   time: catalog updates or removals must never change history.
/// - the unique index on `purchases(user_id, video_id)` is what makes
///   `INSERT OR IGNORE` an atomic check-and-append (at most one purchase per
///   user/video pair).
/// - `pending_invoices` persists outstanding invoices so a payment
///   confirmation arriving after a restart can still be verified.
pub fn init_schema(conn: &DbConnection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS videos (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            title       TEXT NOT NULL,
            description TEXT NOT NULL,
            price       INTEGER NOT NULL,
            duration    TEXT NOT NULL DEFAULT '',
            file_id     TEXT NOT NULL,
            category    TEXT,
            tags        TEXT NOT NULL DEFAULT '[]',
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS users (
            telegram_id INTEGER PRIMARY KEY,
            username    TEXT,
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS purchases (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       INTEGER NOT NULL,
            video_id      INTEGER NOT NULL,
            title         TEXT NOT NULL,
            file_id       TEXT NOT NULL,
            price_paid    INTEGER NOT NULL,
            charge_id     TEXT,
            purchase_date TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_purchases_user_video
            ON purchases(user_id, video_id);

        CREATE TABLE IF NOT EXISTS pending_invoices (
            correlation_id TEXT PRIMARY KEY,
            user_id        INTEGER NOT NULL,
            video_id       INTEGER NOT NULL,
            title          TEXT NOT NULL,
            file_id        TEXT NOT NULL,
            price          INTEGER NOT NULL,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_pending_invoices_created_at
            ON pending_invoices(created_at);",
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let conn = get_connection(&pool).unwrap();

        // Running again must not fail
        init_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'
                 AND name IN ('videos', 'users', 'purchases', 'pending_invoices')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }
}
